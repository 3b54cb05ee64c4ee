//! Encryption and Decryption using [OAEP padding](https://datatracker.ietf.org/doc/html/rfc8017#section-7.1).
//!
use alloc::vec::Vec;

use digest::DynDigest;
use rand_core::CryptoRngCore;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, CtOption};
use zeroize::Zeroizing;

use super::mgf::mgf1_xor;
use crate::errors::{Error, Result};

// 2**61 -1 (pow is not const yet)
// TODO: This is the maximum for SHA-1, unclear from the RFC what the values are for other hashing functions.
const MAX_LABEL_LEN: u64 = 2_305_843_009_213_693_951;

/// Largest message that fits an OAEP block of `k` bytes, or `None` when
/// the block cannot even hold the two hashes and separators.
#[inline]
pub(crate) fn oaep_max_message_len(h_size: usize, k: usize) -> Option<usize> {
    k.checked_sub(2 * h_size + 2)
}

/// Builds the OAEP encoded block `0x00 || maskedSeed || maskedDB`.
///
/// The message must be no longer than the length of the public modulus minus
/// `2 + (2 * hash.size())`.
#[inline]
pub(crate) fn oaep_encrypt_pad<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    msg: &[u8],
    digest: &mut dyn DynDigest,
    mgf_digest: &mut dyn DynDigest,
    label: &[u8],
    k: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let h_size = digest.output_size();
    if h_size == 0 {
        return Err(Error::UnsupportedHash);
    }

    if msg.len() + 2 * h_size + 2 > k {
        return Err(Error::MessageTooLong);
    }

    if label.len() as u64 > MAX_LABEL_LEN {
        return Err(Error::LabelTooLong);
    }

    digest.update(label);
    let p_hash = digest.finalize_reset();

    let mut em = Zeroizing::new(vec![0u8; k]);

    let (_, payload) = em.split_at_mut(1);
    let (seed, db) = payload.split_at_mut(h_size);
    rng.fill_bytes(seed);

    // Data block DB =  pHash || PS || 01 || M
    let db_len = k - h_size - 1;

    db[0..h_size].copy_from_slice(&p_hash);
    db[db_len - msg.len() - 1] = 1;
    db[db_len - msg.len()..].copy_from_slice(msg);

    mgf1_xor(db, mgf_digest, seed)?;
    mgf1_xor(seed, mgf_digest, db)?;

    Ok(em)
}

/// Removes OAEP padding from `em`, unmasking it in place.
///
/// The leading zero byte, the label hash and the `0x01` separator are
/// folded into a single [`Choice`] before anything is branched on, so a
/// failure does not reveal which of them was wrong.
#[inline]
pub(crate) fn oaep_decrypt_unpad(
    em: &mut [u8],
    digest: &mut dyn DynDigest,
    mgf_digest: &mut dyn DynDigest,
    label: &[u8],
    k: usize,
) -> Result<Vec<u8>> {
    let h_size = digest.output_size();
    if h_size == 0 {
        return Err(Error::UnsupportedHash);
    }

    if label.len() as u64 > MAX_LABEL_LEN {
        return Err(Error::LabelTooLong);
    }

    digest.update(label);
    let expected_p_hash = digest.finalize_reset();

    let res = decrypt_inner(em, h_size, &expected_p_hash, k, mgf_digest)?;
    if res.is_none().into() {
        return Err(Error::PaddingInvalid);
    }

    let index = res.unwrap();

    Ok(em[index as usize..].to_vec())
}

/// Unmasks OAEP padding. The returned option is some iff the plaintext was
/// correctly structured, and then holds the index of the message in `em`.
#[inline]
fn decrypt_inner(
    em: &mut [u8],
    h_size: usize,
    expected_p_hash: &[u8],
    k: usize,
    mgf_digest: &mut dyn DynDigest,
) -> Result<CtOption<u32>> {
    if k < h_size * 2 + 2 || em.len() != k {
        return Err(Error::PaddingInvalid);
    }

    let first_byte_is_zero = em[0].ct_eq(&0u8);

    let (_, payload) = em.split_at_mut(1);
    let (seed, db) = payload.split_at_mut(h_size);

    mgf1_xor(seed, mgf_digest, db)?;
    mgf1_xor(db, mgf_digest, seed)?;

    let hash_are_equal = db[0..h_size].ct_eq(expected_p_hash);

    // The remainder of the plaintext must be zero or more 0x00, followed
    // by 0x01, followed by the message.
    //   looking_for_index: 1 if we are still looking for the 0x01
    //   index: the offset of the first 0x01 byte
    //   nonzero_before_one: 1 if we saw a non-zero byte before the 1
    let mut looking_for_index = Choice::from(1u8);
    let mut index = 0u32;
    let mut nonzero_before_one = Choice::from(0u8);

    for (i, el) in db.iter().skip(h_size).enumerate() {
        let equals0 = el.ct_eq(&0u8);
        let equals1 = el.ct_eq(&1u8);
        index.conditional_assign(&(i as u32), looking_for_index & equals1);
        looking_for_index &= !equals1;
        nonzero_before_one |= looking_for_index & !equals0;
    }

    let valid = first_byte_is_zero & hash_are_equal & !nonzero_before_one & !looking_for_index;

    Ok(CtOption::new(index + 2 + (h_size * 2) as u32, valid))
}
