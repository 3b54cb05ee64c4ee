//! PKCS#1 v1.5 support as described in [RFC8017 § 7.2 and § 8.2].
//!
//! Block type 1 (`0x00 || 0x01 || 0xFF.. || 0x00 || M`) is used for
//! signatures, block type 2 (`0x00 || 0x02 || PS || 0x00 || M`) with non-zero
//! random padding for encryption.
//!
//! [RFC8017 § 7.2 and § 8.2]: https://datatracker.ietf.org/doc/html/rfc8017#section-7.2

use alloc::vec::Vec;
use rand_core::CryptoRngCore;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeGreater};
use zeroize::Zeroizing;

use crate::errors::{Error, Result};

/// Bytes of fixed overhead: leading zero, block type, separator and the
/// minimum eight bytes of padding.
pub(crate) const PKCS1V15_OVERHEAD: usize = 11;

/// Fills the provided slice with random values, which are guaranteed
/// to not be zero. Zero bytes drawn from the RNG are replaced by `0x01`.
#[inline]
fn non_zero_random_bytes<R: CryptoRngCore + ?Sized>(rng: &mut R, data: &mut [u8]) {
    rng.fill_bytes(data);

    for el in data {
        let is_zero = el.ct_eq(&0u8);
        el.conditional_assign(&1u8, is_zero);
    }
}

/// Applies the padding scheme from PKCS#1 v1.5 for encryption. The message
/// must be no longer than the length of the public modulus minus 11 bytes.
pub(crate) fn pkcs1v15_encrypt_pad<R>(
    rng: &mut R,
    msg: &[u8],
    k: usize,
) -> Result<Zeroizing<Vec<u8>>>
where
    R: CryptoRngCore + ?Sized,
{
    if msg.len() + PKCS1V15_OVERHEAD > k {
        return Err(Error::BufferTooSmall);
    }

    // EM = 0x00 || 0x02 || PS || 0x00 || M
    let mut em = Zeroizing::new(vec![0u8; k]);
    em[1] = 2;
    non_zero_random_bytes(rng, &mut em[2..k - msg.len() - 1]);
    em[k - msg.len() - 1] = 0;
    em[k - msg.len()..].copy_from_slice(msg);
    Ok(em)
}

/// Removes the encryption padding scheme from PKCS#1 v1.5.
///
/// The block is scanned in full regardless of where it is malformed; only
/// the final combined result is branched on.
#[inline]
pub(crate) fn pkcs1v15_encrypt_unpad(em: &[u8], k: usize) -> Result<Vec<u8>> {
    let (valid, index) = decrypt_inner(em, k)?;
    if valid.unwrap_u8() == 0 {
        return Err(Error::PaddingInvalid);
    }

    Ok(em[index as usize..].to_vec())
}

/// Checks a type 2 block. It returns a choice that indicates whether the
/// plaintext was correctly structured, and the index of the message within
/// `em` (zero when invalid).
#[inline]
fn decrypt_inner(em: &[u8], k: usize) -> Result<(Choice, u32)> {
    if k < PKCS1V15_OVERHEAD || em.len() != k {
        return Err(Error::PaddingInvalid);
    }

    let first_byte_is_zero = em[0].ct_eq(&0u8);
    let second_byte_is_two = em[1].ct_eq(&2u8);

    // The remainder of the plaintext must be a string of non-zero random
    // octets, followed by a 0, followed by the message.
    //   looking_for_index: 1 iff we are still looking for the zero.
    //   index: the offset of the first zero byte.
    let mut looking_for_index = Choice::from(1u8);
    let mut index = 0u32;

    for (i, el) in em.iter().enumerate().skip(2) {
        let equals0 = el.ct_eq(&0u8);
        index.conditional_assign(&(i as u32), looking_for_index & equals0);
        looking_for_index &= !equals0;
    }

    // The PS padding must be at least 8 bytes long, and it starts two
    // bytes into em.
    let valid_ps = index.ct_gt(&9u32);
    let valid = first_byte_is_zero & second_byte_is_two & !looking_for_index & valid_ps;
    index = u32::conditional_select(&0, &(index + 1), valid);

    Ok((valid, index))
}

/// Applies block type 1 padding to `t`, which is either a raw digest or a
/// `DigestInfo` encoding.
#[inline]
pub(crate) fn pkcs1v15_sign_pad(t: &[u8], k: usize) -> Result<Vec<u8>> {
    let t_len = t.len();
    if k < t_len + PKCS1V15_OVERHEAD {
        return Err(Error::BufferTooSmall);
    }

    // EM = 0x00 || 0x01 || PS || 0x00 || T
    let mut em = vec![0xff; k];
    em[0] = 0;
    em[1] = 1;
    em[k - t_len - 1] = 0;
    em[k - t_len..].copy_from_slice(t);

    Ok(em)
}

/// Removes block type 1 padding and returns `T`.
#[inline]
pub(crate) fn pkcs1v15_sign_unpad(em: &[u8], k: usize) -> Result<Vec<u8>> {
    if k < PKCS1V15_OVERHEAD || em.len() != k {
        return Err(Error::PaddingInvalid);
    }

    // EM = 0x00 || 0x01 || PS || 0x00 || T
    let mut ok = em[0].ct_eq(&0u8) & em[1].ct_eq(&1u8);
    let mut looking_for_index = Choice::from(1u8);
    let mut index = 0u32;

    for (i, el) in em.iter().enumerate().skip(2) {
        let equals0 = el.ct_eq(&0u8);
        // every byte before the separator must be 0xff
        ok &= !looking_for_index | equals0 | el.ct_eq(&0xffu8);
        index.conditional_assign(&(i as u32), looking_for_index & equals0);
        looking_for_index &= !equals0;
    }

    ok &= !looking_for_index & index.ct_gt(&9u32);

    if ok.unwrap_u8() != 1 {
        return Err(Error::PaddingInvalid);
    }

    Ok(em[index as usize + 1..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};

    #[test]
    fn test_non_zero_bytes() {
        for _ in 0..10 {
            let mut rng = ChaCha8Rng::from_seed([42; 32]);
            let mut b = vec![0u8; 512];
            non_zero_random_bytes(&mut rng, &mut b);
            for el in &b {
                assert_ne!(*el, 0u8);
            }
        }
    }

    #[test]
    fn test_encrypt_tiny_no_crash() {
        let mut rng = ChaCha8Rng::from_seed([42; 32]);
        let k = 8;
        let message = vec![1u8; 4];
        let res = pkcs1v15_encrypt_pad(&mut rng, &message, k);
        assert_eq!(res, Err(Error::BufferTooSmall));
    }

    #[test]
    fn test_encrypt_pad_layout() {
        let mut rng = ChaCha8Rng::from_seed([42; 32]);
        let k = 64;
        let em = pkcs1v15_encrypt_pad(&mut rng, b"hello", k).unwrap();

        assert_eq!(em.len(), k);
        assert_eq!(&em[..2], &[0, 2]);
        assert!(em[2..k - 6].iter().all(|b| *b != 0));
        assert_eq!(em[k - 6], 0);
        assert_eq!(&em[k - 5..], b"hello");
        assert_eq!(pkcs1v15_encrypt_unpad(&em, k).unwrap(), b"hello");
    }

    #[test]
    fn test_encrypt_pad_boundary() {
        let mut rng = ChaCha8Rng::from_seed([42; 32]);
        let k = 32;
        let max = vec![7u8; k - 11];
        let em = pkcs1v15_encrypt_pad(&mut rng, &max, k).unwrap();
        assert_eq!(pkcs1v15_encrypt_unpad(&em, k).unwrap(), max);

        let too_long = vec![7u8; k - 10];
        assert_eq!(
            pkcs1v15_encrypt_pad(&mut rng, &too_long, k),
            Err(Error::BufferTooSmall)
        );

        let empty = pkcs1v15_encrypt_pad(&mut rng, &[], k).unwrap();
        assert!(pkcs1v15_encrypt_unpad(&empty, k).unwrap().is_empty());
    }

    #[test]
    fn test_encrypt_unpad_rejects_corruption() {
        let mut rng = ChaCha8Rng::from_seed([42; 32]);
        let k = 64;
        let em = pkcs1v15_encrypt_pad(&mut rng, b"hello", k).unwrap();

        let mut bad = em.clone();
        bad[0] = 1;
        assert_eq!(pkcs1v15_encrypt_unpad(&bad, k), Err(Error::PaddingInvalid));

        let mut bad = em.clone();
        bad[1] = 1;
        assert_eq!(pkcs1v15_encrypt_unpad(&bad, k), Err(Error::PaddingInvalid));

        // separator within the first eight padding bytes
        let mut bad = em.clone();
        bad[5] = 0;
        assert_eq!(pkcs1v15_encrypt_unpad(&bad, k), Err(Error::PaddingInvalid));

        // no separator at all
        let mut bad = em.clone();
        for b in bad[2..].iter_mut() {
            *b = 0x55;
        }
        assert_eq!(pkcs1v15_encrypt_unpad(&bad, k), Err(Error::PaddingInvalid));
    }

    #[test]
    fn test_sign_pad_roundtrip() {
        let k = 64;
        let em = pkcs1v15_sign_pad(b"digest", k).unwrap();
        assert_eq!(&em[..2], &[0, 1]);
        assert!(em[2..k - 7].iter().all(|b| *b == 0xff));
        assert_eq!(pkcs1v15_sign_unpad(&em, k).unwrap(), b"digest");
    }

    #[test]
    fn test_sign_unpad_rejects_corruption() {
        let k = 64;
        let em = pkcs1v15_sign_pad(b"digest", k).unwrap();

        for pos in [0, 1, 2, 20, k - 8, k - 7] {
            let mut bad = em.clone();
            bad[pos] ^= 0x10;
            assert_eq!(
                pkcs1v15_sign_unpad(&bad, k),
                Err(Error::PaddingInvalid),
                "position {pos}"
            );
        }
    }

    #[test]
    fn test_sign_pad_too_long() {
        assert_eq!(pkcs1v15_sign_pad(&[0u8; 6], 16), Err(Error::BufferTooSmall));
    }
}
