//! Generic RSA implementation

use alloc::borrow::Cow;
use num_bigint::{BigInt, BigUint, IntoBigUint, ModInverse, RandBigInt};
use num_traits::{One, Zero};
use rand_core::CryptoRngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{Error, Result};
use crate::traits::{PrivateKeyParts, PublicKeyParts};

/// ⚠️ Raw RSA encryption of m with the public key. No padding is performed.
///
/// # ☢️️ WARNING: HAZARDOUS API ☢️
///
/// Use this function with great care! Raw RSA should never be used without an appropriate padding
/// or signature scheme. See the [module-level documentation][crate::hazmat] for more information.
#[inline]
pub fn rsa_encrypt<K: PublicKeyParts>(key: &K, m: &BigUint) -> Result<BigUint> {
    if m >= key.n() {
        return Err(Error::OutOfRange);
    }

    Ok(m.modpow(key.e(), key.n()))
}

/// Checks `1 < c < n - 1`, rejecting the trivial ciphertexts `0`, `1` and `n - 1`.
///
/// A zero modulus is [`Error::InvalidModulus`].
#[inline]
pub fn check_ciphertext_range<K: PublicKeyParts>(key: &K, c: &BigUint) -> Result<()> {
    if key.n().is_zero() {
        return Err(Error::InvalidModulus);
    }
    let n_minus_one = key.n() - BigUint::one();
    if c <= &BigUint::one() || c >= &n_minus_one {
        return Err(Error::OutOfRange);
    }
    Ok(())
}

/// ⚠️ Performs raw RSA decryption with no padding or error checking.
///
/// Returns a plaintext `BigUint`. Performs RSA blinding if an `Rng` is passed.
/// Uses the Chinese remainder theorem when the key carries `dP`, `dQ` and
/// `qInv`, and `c^d mod n` otherwise.
///
/// # ☢️️ WARNING: HAZARDOUS API ☢️
///
/// Use this function with great care! Raw RSA should never be used without an appropriate padding
/// or signature scheme. See the [module-level documentation][crate::hazmat] for more information.
#[inline]
pub fn rsa_decrypt<R: CryptoRngCore + ?Sized>(
    mut rng: Option<&mut R>,
    priv_key: &impl PrivateKeyParts,
    c: &BigUint,
) -> Result<BigUint> {
    if priv_key.n().is_zero() {
        return Err(Error::InvalidModulus);
    }

    if c >= priv_key.n() {
        return Err(Error::OutOfRange);
    }

    let mut ir = None;

    let c = if let Some(ref mut rng) = rng {
        let (blinded, unblinder) = blind(rng, priv_key, c);
        ir = Some(Zeroizing::new(unblinder));
        Cow::Owned(blinded)
    } else {
        Cow::Borrowed(c)
    };

    let m = match (priv_key.dp(), priv_key.dq(), priv_key.qinv()) {
        (Some(dp), Some(dq), Some(qinv)) if priv_key.primes().len() == 2 => {
            // We have the precalculated values needed for the CRT.
            let p = &priv_key.primes()[0];
            let q = &priv_key.primes()[1];

            let mut m1 = c.modpow(dp, p);
            let mut m2 = c.modpow(dq, q);

            // h = (m1 - m2) * qInv mod p, kept non-negative by adding p
            let mut h = m1.clone() + p;
            let mut m2_mod_p = &m2 % p;
            h -= &m2_mod_p;
            h *= qinv;
            h %= p;

            let m = &m2 + q * &h;

            // clear tmp values
            m1.zeroize();
            m2.zeroize();
            m2_mod_p.zeroize();
            h.zeroize();

            m
        }
        _ => c.modpow(priv_key.d(), priv_key.n()),
    };

    if let Cow::Owned(mut blinded) = c {
        blinded.zeroize();
    }

    match ir {
        Some(ref ir) => {
            // unblind
            let mut m = m;
            let res = unblind(priv_key, &m, ir);
            m.zeroize();
            Ok(res)
        }
        None => Ok(m),
    }
}

/// ⚠️ Performs raw RSA decryption with no padding.
///
/// Returns a plaintext `BigUint`. Performs RSA blinding if an `Rng` is passed.  This will also
/// check for errors in the CRT computation.
///
/// # ☢️️ WARNING: HAZARDOUS API ☢️
///
/// Use this function with great care! Raw RSA should never be used without an appropriate padding
/// or signature scheme. See the [module-level documentation][crate::hazmat] for more information.
#[inline]
pub fn rsa_decrypt_and_check<R: CryptoRngCore + ?Sized>(
    priv_key: &impl PrivateKeyParts,
    rng: Option<&mut R>,
    c: &BigUint,
) -> Result<BigUint> {
    let m = rsa_decrypt(rng, priv_key, c)?;

    // In order to defend against errors in the CRT computation, m^e is
    // calculated, which should match the original ciphertext.
    let check = m.modpow(priv_key.e(), priv_key.n());

    if c != &check {
        tracing::warn!("private key operation failed its consistency check");
        let mut m = m;
        m.zeroize();
        return Err(Error::Internal);
    }

    Ok(m)
}

/// Returns the blinded c, along with the unblinding factor.
fn blind<R: CryptoRngCore, K: PublicKeyParts>(
    rng: &mut R,
    key: &K,
    c: &BigUint,
) -> (BigUint, BigUint) {
    // Blinding involves multiplying c by r^e.
    // Then the decryption operation performs (m^e * r^e)^d mod n
    // which equals mr mod n. The factor of r can then be removed
    // by multiplying by the multiplicative inverse of r.

    let mut r: BigUint;
    let mut ir: Option<BigInt>;
    let unblinder;
    loop {
        r = rng.gen_biguint_below(key.n());
        if r.is_zero() {
            r = BigUint::one();
        }
        ir = r.clone().mod_inverse(key.n());
        if let Some(ir) = ir {
            if let Some(ub) = ir.into_biguint() {
                unblinder = ub;
                break;
            }
        }
    }

    let c = {
        let mut rpowe = r.modpow(key.e(), key.n()); // N != 0
        let mut c = c * &rpowe;
        c %= key.n();

        rpowe.zeroize();

        c
    };

    r.zeroize();

    (c, unblinder)
}

/// Given an m and and unblinding factor, unblind the m.
fn unblind(key: &impl PublicKeyParts, m: &BigUint, unblinder: &BigUint) -> BigUint {
    (m * unblinder) % key.n()
}
