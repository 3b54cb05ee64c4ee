//! Generate prime components for the RSA Private Key

use alloc::vec::Vec;
use num_bigint::{prime::probably_prime, BigUint, IntoBigUint, ModInverse};
use num_integer::Integer;
use num_traits::One;
use rand_core::CryptoRngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::config::KeyGenConfig;
use crate::errors::{Error, Result};

/// Smallest modulus accepted by [`RsaPrivateKey::new`](crate::RsaPrivateKey::new).
pub const MIN_KEY_BITS: usize = 1024;

/// Largest modulus generated or accepted by default.
pub const MAX_KEY_BITS: usize = 4096;

/// Modulus sizes permitted when the `fips` feature is enabled.
#[cfg(feature = "fips")]
static FIPS_KEY_BITS: &[usize] = &[2048, 3072, 4096];

/// Primes of this many bits or fewer are never requested.
const MIN_GENERATED_BITS: usize = 64;

/// The two primes are kept at least `2^(bits / 2 - DISTANCE_SLACK)` apart.
const DISTANCE_SLACK: usize = 100;

pub(crate) struct RsaPrivateKeyComponents {
    pub n: BigUint,
    pub e: BigUint,
    pub d: BigUint,
    pub primes: Vec<BigUint>,
}

/// Checks `bits` against the key size policy used by key generation.
pub fn check_key_size(bits: usize) -> Result<()> {
    if bits % 16 != 0 {
        return Err(Error::KeySizeNotAllowed);
    }

    #[cfg(feature = "fips")]
    if !FIPS_KEY_BITS.contains(&bits) {
        return Err(Error::KeySizeNotAllowed);
    }

    if bits < MIN_KEY_BITS {
        return Err(Error::KeyTooSmall);
    }
    if bits > MAX_KEY_BITS {
        return Err(Error::KeySizeNotAllowed);
    }

    Ok(())
}

/// Returns `floor(sqrt(2) * 2^(prime_bits - 1))`, the smallest value a prime
/// may take so that the product of two such primes has exactly
/// `2 * prime_bits` bits.
pub fn prime_lower_bound(prime_bits: usize) -> BigUint {
    (BigUint::one() << (2 * prime_bits - 1)).sqrt()
}

/// Generates a two-prime RSA key of `bit_size` bits with public exponent
/// `exp`, following FIPS 186-4 B.3.3: each prime is searched for among
/// `config.trial_budget(bit_size)` random odd candidates with the top bit set.
///
/// No size policy is applied beyond `bit_size` being a multiple of 16 and at
/// least 128.
pub(crate) fn generate_key_with_exp<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    bit_size: usize,
    exp: &BigUint,
    config: &KeyGenConfig,
) -> Result<RsaPrivateKeyComponents> {
    if bit_size % 16 != 0 {
        return Err(Error::KeySizeNotAllowed);
    }
    if bit_size < 2 * MIN_GENERATED_BITS {
        return Err(Error::KeyTooSmall);
    }
    if exp.is_even() || *exp < BigUint::from(3u8) {
        return Err(Error::InvalidExponent);
    }

    let prime_bits = bit_size / 2;
    let min_distance = BigUint::one() << prime_bits.saturating_sub(DISTANCE_SLACK);
    generate_with_distance(rng, prime_bits, exp, config, &min_distance)
}

/// Finds `p`, then a `q` more than `min_distance` away from it, and derives
/// the private exponent. The primes are wiped if anything after the search
/// for `p` fails.
fn generate_with_distance<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    prime_bits: usize,
    exp: &BigUint,
    config: &KeyGenConfig,
    min_distance: &BigUint,
) -> Result<RsaPrivateKeyComponents> {
    let lower_bound = prime_lower_bound(prime_bits);

    let mut p = Zeroizing::new(find_prime(rng, prime_bits, exp, &lower_bound, config, |_| {
        true
    })?);
    let mut q = Zeroizing::new(find_prime(rng, prime_bits, exp, &lower_bound, config, |q| {
        let mut diff = if q > &*p { q - &*p } else { &*p - q };
        let far_enough = diff > *min_distance;
        diff.zeroize();
        far_enough
    })?);

    let n = &*p * &*q;

    let mut p1 = &*p - BigUint::one();
    let mut q1 = &*q - BigUint::one();
    let mut lambda = p1.lcm(&q1);
    p1.zeroize();
    q1.zeroize();

    let d = exp.clone().mod_inverse(&lambda).and_then(|d| d.into_biguint());
    lambda.zeroize();
    let d = d.ok_or(Error::Internal)?;

    tracing::trace!(bits = n.bits(), "generated key pair");

    Ok(RsaPrivateKeyComponents {
        n,
        e: exp.clone(),
        d,
        primes: vec![core::mem::take(&mut *p), core::mem::take(&mut *q)],
    })
}

/// Draws candidates of `prime_bits` bits until one is a probable prime
/// satisfying `accept`, or the trial budget runs out.
fn find_prime<R, F>(
    rng: &mut R,
    prime_bits: usize,
    exp: &BigUint,
    lower_bound: &BigUint,
    config: &KeyGenConfig,
    accept: F,
) -> Result<BigUint>
where
    R: CryptoRngCore + ?Sized,
    F: Fn(&BigUint) -> bool,
{
    let trials = config.trial_budget(2 * prime_bits);
    let mut bytes = Zeroizing::new(vec![0u8; prime_bits / 8]);
    let last = bytes.len() - 1;

    for _ in 0..trials {
        rng.fill_bytes(&mut bytes);
        bytes[0] |= 0x80;
        bytes[last] |= 0x01;

        let mut candidate = BigUint::from_bytes_be(&bytes);
        if is_acceptable(&candidate, exp, lower_bound, config) && accept(&candidate) {
            return Ok(candidate);
        }
        candidate.zeroize();
    }

    tracing::warn!(
        bits = prime_bits,
        trials,
        "prime search exhausted its trial budget"
    );
    Err(Error::PrimeGenerationFailed)
}

/// The cheap checks run first; the primality test is the last gate.
fn is_acceptable(
    candidate: &BigUint,
    exp: &BigUint,
    lower_bound: &BigUint,
    config: &KeyGenConfig,
) -> bool {
    if candidate < lower_bound {
        return false;
    }

    let mut c1 = candidate - BigUint::one();
    let coprime = c1.gcd(exp).is_one();
    c1.zeroize();

    coprime && probably_prime(candidate, config.rounds())
}
