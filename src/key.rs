use alloc::vec::Vec;
use core::fmt;
use core::hash::{Hash, Hasher};

use num_bigint::{BigUint, IntoBigUint, ModInverse};
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};
use rand_core::CryptoRngCore;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::algorithms::generate::{check_key_size, generate_key_with_exp, MAX_KEY_BITS};
use crate::config::{EngineConfig, KeyGenConfig};
use crate::dummy_rng::DummyRng;
use crate::engine::{drive, KeyRef, OperationKind, OperationRequest, OperationSlot};
use crate::errors::{Error, Result};
use crate::padding::Padding;
use crate::traits::{PrivateKeyParts, PublicKeyParts};

/// Represents the public part of an RSA key.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RsaPublicKey {
    /// Modulus: product of prime numbers `p` and `q`
    n: BigUint,
    /// Public exponent: power to which a plaintext message is raised in
    /// order to encrypt it.
    ///
    /// Typically 0x10001 (65537)
    e: BigUint,
}

/// Represents a whole RSA key, public and private parts.
#[derive(Clone)]
pub struct RsaPrivateKey {
    /// Public components of the private key.
    pubkey_components: RsaPublicKey,
    /// Private exponent
    pub(crate) d: BigUint,
    /// Prime factors of N, contains 2 elements.
    pub(crate) primes: Vec<BigUint>,
    /// precomputed values to speed up private operations
    pub(crate) precomputed: Option<PrecomputedValues>,
}

impl fmt::Debug for RsaPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPrivateKey")
            .field("pubkey_components", &self.pubkey_components)
            .finish_non_exhaustive()
    }
}

impl Eq for RsaPrivateKey {}
impl PartialEq for RsaPrivateKey {
    #[inline]
    fn eq(&self, other: &RsaPrivateKey) -> bool {
        self.pubkey_components == other.pubkey_components
            && self.d == other.d
            && self.primes == other.primes
    }
}

impl AsRef<RsaPublicKey> for RsaPrivateKey {
    fn as_ref(&self) -> &RsaPublicKey {
        &self.pubkey_components
    }
}

impl Hash for RsaPrivateKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Domain separator for RSA private keys
        state.write(b"RsaPrivateKey");
        Hash::hash(&self.pubkey_components, state);
    }
}

impl Drop for RsaPrivateKey {
    fn drop(&mut self) {
        self.d.zeroize();
        self.primes.zeroize();
        self.precomputed.zeroize();
    }
}

impl ZeroizeOnDrop for RsaPrivateKey {}

#[derive(Debug, Clone)]
pub(crate) struct PrecomputedValues {
    /// D mod (P-1)
    pub(crate) dp: BigUint,
    /// D mod (Q-1)
    pub(crate) dq: BigUint,
    /// Q^-1 mod P
    pub(crate) qinv: BigUint,
}

impl Zeroize for PrecomputedValues {
    fn zeroize(&mut self) {
        self.dp.zeroize();
        self.dq.zeroize();
        self.qinv.zeroize();
    }
}

impl Drop for PrecomputedValues {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl From<RsaPrivateKey> for RsaPublicKey {
    fn from(private_key: RsaPrivateKey) -> Self {
        (&private_key).into()
    }
}

impl From<&RsaPrivateKey> for RsaPublicKey {
    fn from(private_key: &RsaPrivateKey) -> Self {
        private_key.to_public_key()
    }
}

impl PublicKeyParts for RsaPublicKey {
    fn n(&self) -> &BigUint {
        &self.n
    }

    fn e(&self) -> &BigUint {
        &self.e
    }
}

impl RsaPublicKey {
    /// Minimum value of the public exponent `e`.
    pub const MIN_PUB_EXPONENT: u64 = 3;

    /// Maximum value of the public exponent `e`.
    pub const MAX_PUB_EXPONENT: u64 = (1 << 33) - 1;

    /// Maximum size of the modulus `n` in bits.
    pub const MAX_SIZE: usize = MAX_KEY_BITS;

    /// Create a new public key from its components.
    ///
    /// This function accepts public keys with a modulus size up to 4096-bits,
    /// i.e. [`RsaPublicKey::MAX_SIZE`].
    pub fn new(n: BigUint, e: BigUint) -> Result<Self> {
        Self::new_with_max_size(n, e, Self::MAX_SIZE)
    }

    /// Create a new public key from its components.
    pub fn new_with_max_size(n: BigUint, e: BigUint, max_size: usize) -> Result<Self> {
        let k = Self { n, e };
        check_public_with_max_size(&k, max_size)?;
        Ok(k)
    }

    /// Create a new public key, bypassing checks around the modulus and public
    /// exponent size.
    ///
    /// This method is not recommended, and only intended for unusual use cases.
    /// Most applications should use [`RsaPublicKey::new`] or
    /// [`RsaPublicKey::new_with_max_size`] instead.
    pub fn new_unchecked(n: BigUint, e: BigUint) -> Self {
        Self { n, e }
    }

    /// Encrypt the given message.
    pub fn encrypt<R: CryptoRngCore + ?Sized>(
        &self,
        rng: &mut R,
        padding: &Padding,
        msg: &[u8],
    ) -> Result<Vec<u8>> {
        let request = OperationRequest::new(OperationKind::PublicEncrypt, msg, padding);
        drive(
            KeyRef::Public(self),
            &mut OperationSlot::new(),
            None,
            &EngineConfig::default(),
            rng,
            &request,
        )?
        .into_output()
    }

    /// Verify a signed message.
    ///
    /// `hashed` must be the result of hashing the input using the hashing function
    /// named by the padding.
    ///
    /// If the message is valid `Ok(())` is returned, otherwise an `Err` indicating failure.
    pub fn verify(&self, padding: &Padding, hashed: &[u8], sig: &[u8]) -> Result<()> {
        let request =
            OperationRequest::new(OperationKind::PublicDecrypt, sig, padding).with_hashed(hashed);
        drive(
            KeyRef::Public(self),
            &mut OperationSlot::new(),
            None,
            &EngineConfig::default(),
            &mut DummyRng,
            &request,
        )?
        .into_output()
        .map(|_| ())
    }
}

impl PublicKeyParts for RsaPrivateKey {
    fn n(&self) -> &BigUint {
        &self.pubkey_components.n
    }

    fn e(&self) -> &BigUint {
        &self.pubkey_components.e
    }
}

impl RsaPrivateKey {
    /// Default exponent for RSA keys.
    const EXP: u64 = 65537;

    /// Generate a new Rsa key pair of the given bit size using the passed in `rng`.
    pub fn new<R: CryptoRngCore + ?Sized>(rng: &mut R, bit_size: usize) -> Result<RsaPrivateKey> {
        Self::new_with_exp(rng, bit_size, &BigUint::from(Self::EXP))
    }

    /// Generate a new RSA key pair of the given bit size and the public exponent
    /// using the passed in `rng`.
    ///
    /// Unless you have specific needs, you should use `RsaPrivateKey::new` instead.
    pub fn new_with_exp<R: CryptoRngCore + ?Sized>(
        rng: &mut R,
        bit_size: usize,
        exp: &BigUint,
    ) -> Result<RsaPrivateKey> {
        Self::new_with_config(rng, bit_size, exp, &KeyGenConfig::default())
    }

    /// Generate a new RSA key pair with explicit prime search parameters.
    pub fn new_with_config<R: CryptoRngCore + ?Sized>(
        rng: &mut R,
        bit_size: usize,
        exp: &BigUint,
        config: &KeyGenConfig,
    ) -> Result<RsaPrivateKey> {
        check_key_size(bit_size)?;
        Self::generate_unchecked(rng, bit_size, exp, config)
    }

    /// Generate a key pair without applying the key size policy.
    ///
    /// The size must still be a multiple of 16 bits. Small keys are only
    /// useful for tests.
    pub fn generate_unchecked<R: CryptoRngCore + ?Sized>(
        rng: &mut R,
        bit_size: usize,
        exp: &BigUint,
        config: &KeyGenConfig,
    ) -> Result<RsaPrivateKey> {
        check_public_exponent(exp)?;
        let components = generate_key_with_exp(rng, bit_size, exp, config)?;
        RsaPrivateKey::from_components(
            components.n,
            components.e,
            components.d,
            components.primes,
        )
    }

    /// Constructs an RSA key pair from individual components:
    ///
    /// - `n`: RSA modulus
    /// - `e`: public exponent (i.e. encrypting exponent)
    /// - `d`: private exponent (i.e. decrypting exponent)
    /// - `primes`: the two prime factors of `n`
    ///
    /// The key is validated and the CRT values are precomputed.
    pub fn from_components(
        n: BigUint,
        e: BigUint,
        d: BigUint,
        primes: Vec<BigUint>,
    ) -> Result<RsaPrivateKey> {
        let mut k = Self::from_components_unchecked(n, e, d, primes)?;

        // Always validate the key, to ensure precompute can't fail
        k.validate()?;

        // Precompute when possible, ignore error otherwise.
        k.precompute().ok();

        Ok(k)
    }

    /// Constructs an RSA key pair from individual components, without
    /// validating them beyond the number of primes.
    pub fn from_components_unchecked(
        n: BigUint,
        e: BigUint,
        d: BigUint,
        primes: Vec<BigUint>,
    ) -> Result<RsaPrivateKey> {
        if primes.len() != 2 {
            return Err(Error::InvalidPrime);
        }

        let mut k = RsaPrivateKey {
            pubkey_components: RsaPublicKey::new_unchecked(n, e),
            d,
            primes,
            precomputed: None,
        };
        k.precompute().ok();

        Ok(k)
    }

    /// Get the public key from the private key, cloning `n` and `e`.
    ///
    /// Generally this is not needed since `RsaPrivateKey` implements the `PublicKey` trait,
    /// but it can occasionally be useful to discard the private information entirely.
    pub fn to_public_key(&self) -> RsaPublicKey {
        self.pubkey_components.clone()
    }

    /// Performs some calculations to speed up private key operations.
    pub fn precompute(&mut self) -> Result<()> {
        if self.precomputed.is_some() {
            return Ok(());
        }

        let p = &self.primes[0];
        let q = &self.primes[1];
        if *p <= BigUint::one() || *q <= BigUint::one() {
            return Err(Error::InvalidPrime);
        }

        let dp = &self.d % (p - BigUint::one());
        let dq = &self.d % (q - BigUint::one());
        let qinv = q
            .clone()
            .mod_inverse(p)
            .and_then(|qinv| qinv.into_biguint())
            .ok_or(Error::InvalidPrime)?;

        self.precomputed = Some(PrecomputedValues { dp, dq, qinv });

        Ok(())
    }

    /// Clears precomputed values by setting to None
    pub fn clear_precomputed(&mut self) {
        self.precomputed = None;
    }

    /// Performs basic sanity checks on the key.
    /// Returns `Ok(())` if everything is good, otherwise an appropriate error.
    pub fn validate(&self) -> Result<()> {
        check_public(self)?;

        // Check that Πprimes == n.
        let mut m = BigUint::one();
        for prime in &self.primes {
            // Any primes ≤ 1 will cause divide-by-zero panics later.
            if *prime <= BigUint::one() {
                return Err(Error::InvalidPrime);
            }
            m *= prime;
        }
        if m != self.pubkey_components.n {
            return Err(Error::InvalidModulus);
        }

        // Check that de ≡ 1 mod p-1, for each prime.
        // This implies that e is coprime to each p-1 as e has a multiplicative
        // inverse. Therefore e is coprime to lcm(p-1,q-1) = λ(N).
        // It also implies that a^de ≡ a mod p as a^(p-1) ≡ 1 mod p. Thus a^de
        // ≡ a mod n for all a coprime to n, as required.
        let mut de = self.e().clone();
        de *= self.d.clone();
        for prime in &self.primes {
            let congruence: BigUint = &de % (prime - BigUint::one());
            if !congruence.is_one() {
                de.zeroize();
                return Err(Error::InvalidExponent);
            }
        }
        de.zeroize();

        Ok(())
    }

    /// Decrypt the given message.
    ///
    /// `rng` supplies the blinding factor.
    pub fn decrypt<R: CryptoRngCore + ?Sized>(
        &self,
        rng: &mut R,
        padding: &Padding,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        let request = OperationRequest::new(OperationKind::PrivateDecrypt, ciphertext, padding);
        drive(
            KeyRef::Private(self),
            &mut OperationSlot::new(),
            None,
            &EngineConfig::default(),
            rng,
            &request,
        )?
        .into_output()
    }

    /// Sign the given digest.
    ///
    /// `rng` supplies the blinding factor and, for PSS, the salt.
    pub fn sign<R: CryptoRngCore + ?Sized>(
        &self,
        rng: &mut R,
        padding: &Padding,
        digest_in: &[u8],
    ) -> Result<Vec<u8>> {
        let request = OperationRequest::new(OperationKind::PrivateEncrypt, digest_in, padding);
        drive(
            KeyRef::Private(self),
            &mut OperationSlot::new(),
            None,
            &EngineConfig::default(),
            rng,
            &request,
        )?
        .into_output()
    }
}

impl PrivateKeyParts for RsaPrivateKey {
    fn d(&self) -> &BigUint {
        &self.d
    }

    fn primes(&self) -> &[BigUint] {
        &self.primes
    }

    fn dp(&self) -> Option<&BigUint> {
        self.precomputed.as_ref().map(|p| &p.dp)
    }

    fn dq(&self) -> Option<&BigUint> {
        self.precomputed.as_ref().map(|p| &p.dq)
    }

    fn qinv(&self) -> Option<&BigUint> {
        self.precomputed.as_ref().map(|p| &p.qinv)
    }
}

/// Check that the public key is well formed and has an exponent within acceptable bounds.
#[inline]
pub fn check_public(public_key: &impl PublicKeyParts) -> Result<()> {
    check_public_with_max_size(public_key, RsaPublicKey::MAX_SIZE)
}

/// Check that the public key is well formed and has an exponent within acceptable bounds.
#[inline]
fn check_public_with_max_size(public_key: &impl PublicKeyParts, max_size: usize) -> Result<()> {
    if public_key.n().bits() > max_size {
        return Err(Error::ModulusTooLarge);
    }
    if public_key.n().is_zero() || public_key.n().is_even() {
        return Err(Error::InvalidModulus);
    }

    check_public_exponent(public_key.e())?;

    if public_key.e() >= public_key.n() {
        return Err(Error::InvalidExponent);
    }

    Ok(())
}

/// The exponent must be odd and lie in `[MIN_PUB_EXPONENT, MAX_PUB_EXPONENT]`.
fn check_public_exponent(e: &BigUint) -> Result<()> {
    let e = e.to_u64().ok_or(Error::PublicExponentTooLarge)?;

    if e < RsaPublicKey::MIN_PUB_EXPONENT {
        return Err(Error::PublicExponentTooSmall);
    }

    if e > RsaPublicKey::MAX_PUB_EXPONENT {
        return Err(Error::PublicExponentTooLarge);
    }

    if e % 2 == 0 {
        return Err(Error::InvalidExponent);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashAlgorithm;
    use hex_literal::hex;
    use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};

    // p = 61, q = 53, e = 17, d = 2753
    fn toy_components() -> (BigUint, BigUint, BigUint, Vec<BigUint>) {
        (
            BigUint::from(3233u32),
            BigUint::from(17u32),
            BigUint::from(2753u32),
            vec![BigUint::from(61u32), BigUint::from(53u32)],
        )
    }

    #[test]
    fn test_from_into() {
        let (n, e, d, primes) = toy_components();
        let private_key = RsaPrivateKey::from_components(n, e, d, primes).unwrap();
        let public_key: RsaPublicKey = private_key.into();

        assert_eq!(public_key.n(), &BigUint::from(3233u32));
        assert_eq!(public_key.e(), &BigUint::from(17u32));
        assert_eq!(public_key.size(), 2);
    }

    #[test]
    fn test_precompute() {
        let (n, e, d, primes) = toy_components();
        let key = RsaPrivateKey::from_components(n, e, d, primes).unwrap();

        // 2753 mod 60, 2753 mod 52, 53^-1 mod 61
        assert_eq!(key.dp(), Some(&BigUint::from(53u32)));
        assert_eq!(key.dq(), Some(&BigUint::from(49u32)));
        assert_eq!(key.qinv(), Some(&BigUint::from(38u32)));
    }

    #[test]
    fn test_validate_rejects_bad_components() {
        let (n, e, d, primes) = toy_components();

        assert_eq!(
            RsaPrivateKey::from_components(n.clone(), e.clone(), d.clone() + 1u32, primes.clone()),
            Err(Error::InvalidExponent)
        );
        assert_eq!(
            RsaPrivateKey::from_components(
                n.clone(),
                e.clone(),
                d.clone(),
                vec![BigUint::from(61u32), BigUint::from(59u32)]
            ),
            Err(Error::InvalidModulus)
        );
        assert_eq!(
            RsaPrivateKey::from_components(n.clone(), e.clone(), d.clone(), primes[..1].to_vec()),
            Err(Error::InvalidPrime)
        );
        assert_eq!(
            RsaPrivateKey::from_components(n, e, d, vec![BigUint::one(), BigUint::from(3233u32)]),
            Err(Error::InvalidPrime)
        );
    }

    #[test]
    fn test_public_key_checks() {
        let n = BigUint::from(3233u32);
        assert_eq!(
            RsaPublicKey::new(n.clone(), BigUint::from(1u32)),
            Err(Error::PublicExponentTooSmall)
        );
        assert_eq!(
            RsaPublicKey::new(n.clone(), BigUint::from(16u32)),
            Err(Error::InvalidExponent)
        );
        assert_eq!(
            RsaPublicKey::new(BigUint::from(3232u32), BigUint::from(17u32)),
            Err(Error::InvalidModulus)
        );

        let huge = (BigUint::one() << 4200) + BigUint::one();
        assert_eq!(
            RsaPublicKey::new(huge.clone(), BigUint::from(65537u32)),
            Err(Error::ModulusTooLarge)
        );
        assert!(RsaPublicKey::new_with_max_size(huge.clone(), BigUint::from(65537u32), 8192).is_ok());
        assert_eq!(
            RsaPublicKey::new(huge, BigUint::from(1u64 << 34) + 1u32),
            Err(Error::ModulusTooLarge)
        );
        assert_eq!(
            RsaPublicKey::new_with_max_size(
                (BigUint::one() << 100) + 1u32,
                BigUint::from(1u64 << 34) + 1u32,
                4096
            ),
            Err(Error::PublicExponentTooLarge)
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let (n, e, d, primes) = toy_components();
        let key = RsaPrivateKey::from_components(n, e, d, primes).unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("RsaPrivateKey"));
        assert!(!rendered.contains(" d:"));
        assert!(!rendered.contains("primes"));
    }

    #[test]
    fn test_generate_size_policy() {
        let mut rng = ChaCha8Rng::from_seed([42; 32]);
        assert!(matches!(
            RsaPrivateKey::new(&mut rng, 512),
            Err(Error::KeyTooSmall) | Err(Error::KeySizeNotAllowed)
        ));
        assert!(matches!(
            RsaPrivateKey::generate_unchecked(
                &mut rng,
                512,
                &BigUint::from(4u32),
                &KeyGenConfig::default()
            ),
            Err(Error::InvalidExponent)
        ));

        let key = RsaPrivateKey::generate_unchecked(
            &mut rng,
            512,
            &BigUint::from(3u32),
            &KeyGenConfig::default(),
        )
        .unwrap();
        assert_eq!(key.n().bits(), 512);
        key.validate().unwrap();
    }

    #[test]
    fn test_one_shot_methods() {
        let mut rng = ChaCha8Rng::from_seed([42; 32]);
        let key = RsaPrivateKey::generate_unchecked(
            &mut rng,
            768,
            &BigUint::from(65537u32),
            &KeyGenConfig::default(),
        )
        .unwrap();
        let public = key.to_public_key();

        let padding = Padding::oaep(HashAlgorithm::Sha256);
        let ct = public.encrypt(&mut rng, &padding, b"one shot").unwrap();
        assert_eq!(ct.len(), 96);
        assert_eq!(key.decrypt(&mut rng, &padding, &ct).unwrap(), b"one shot");

        let digest = hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        let padding = Padding::pss(HashAlgorithm::Sha256);
        let sig = key.sign(&mut rng, &padding, &digest).unwrap();
        public.verify(&padding, &digest, &sig).unwrap();

        let mut bad = sig.clone();
        bad[10] ^= 1;
        assert!(public.verify(&padding, &digest, &bad).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_public_key() {
        let key = RsaPublicKey::new(BigUint::from(3233u32), BigUint::from(17u32)).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        let back: RsaPublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }
}
