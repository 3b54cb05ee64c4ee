//! Tunables for private key operations and key generation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Minimum number of Miller-Rabin rounds applied to every prime candidate.
pub const MIN_PRIMALITY_ROUNDS: usize = 8;

/// Safety switches applied by [`RsaKey`](crate::RsaKey) to private key
/// operations.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Multiply the input by `r^e` before exponentiating and by `r^-1` after.
    pub blinding: bool,
    /// Reject ciphertexts outside `1 < c < n - 1` before decrypting.
    pub range_check: bool,
    /// Re-encrypt the result of a private operation and compare it to the
    /// input, catching faults in the CRT computation.
    pub verify_crt: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            blinding: true,
            range_check: true,
            verify_crt: true,
        }
    }
}

impl EngineConfig {
    /// Returns the default configuration with every check enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables blinding.
    pub fn with_blinding(mut self, enabled: bool) -> Self {
        self.blinding = enabled;
        self
    }

    /// Enables or disables the ciphertext range check.
    pub fn with_range_check(mut self, enabled: bool) -> Self {
        self.range_check = enabled;
        self
    }

    /// Enables or disables the CRT consistency check.
    pub fn with_crt_check(mut self, enabled: bool) -> Self {
        self.verify_crt = enabled;
        self
    }
}

/// Parameters of the prime search.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KeyGenConfig {
    /// Miller-Rabin rounds per candidate, never below [`MIN_PRIMALITY_ROUNDS`].
    pub primality_rounds: usize,
    /// Each prime gets `trials_per_bit_factor * (bits / 2)` candidates.
    pub trials_per_bit_factor: usize,
}

impl Default for KeyGenConfig {
    fn default() -> Self {
        Self {
            primality_rounds: MIN_PRIMALITY_ROUNDS,
            trials_per_bit_factor: 5,
        }
    }
}

impl KeyGenConfig {
    /// Returns the default search parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Values below [`MIN_PRIMALITY_ROUNDS`] are raised to it.
    pub fn with_primality_rounds(mut self, rounds: usize) -> Self {
        self.primality_rounds = rounds.max(MIN_PRIMALITY_ROUNDS);
        self
    }

    /// Sets the trial budget multiplier.
    pub fn with_trials_per_bit_factor(mut self, factor: usize) -> Self {
        self.trials_per_bit_factor = factor;
        self
    }

    /// Number of candidates drawn for each prime of a `bits`-sized modulus.
    pub fn trial_budget(&self, bits: usize) -> usize {
        self.trials_per_bit_factor.saturating_mul(bits / 2)
    }

    pub(crate) fn rounds(&self) -> usize {
        self.primality_rounds.max(MIN_PRIMALITY_ROUNDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.blinding && config.range_check && config.verify_crt);

        let keygen = KeyGenConfig::new();
        assert_eq!(keygen.primality_rounds, 8);
        assert_eq!(keygen.trial_budget(2048), 5 * 1024);
    }

    #[test]
    fn test_rounds_floor() {
        let keygen = KeyGenConfig::new().with_primality_rounds(2);
        assert_eq!(keygen.primality_rounds, MIN_PRIMALITY_ROUNDS);

        let keygen = KeyGenConfig::new().with_primality_rounds(20);
        assert_eq!(keygen.rounds(), 20);

        // a hand-built config is still clamped when used
        let keygen = KeyGenConfig {
            primality_rounds: 1,
            ..KeyGenConfig::default()
        };
        assert_eq!(keygen.rounds(), MIN_PRIMALITY_ROUNDS);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_blinding(false)
            .with_range_check(false)
            .with_crt_check(false);
        assert_eq!(
            config,
            EngineConfig {
                blinding: false,
                range_check: false,
                verify_crt: false,
            }
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde() {
        let config = KeyGenConfig::new().with_trials_per_bit_factor(7);
        let json = serde_json::to_string(&config).unwrap();
        let back: KeyGenConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
