//! Support for the [Probabilistic Signature Scheme] (PSS) a.k.a. RSASSA-PSS.
//!
//! Designed by Mihir Bellare and Phillip Rogaway. Specified in [RFC8017 § 8.1].
//!
//! [Probabilistic Signature Scheme]: https://en.wikipedia.org/wiki/Probabilistic_signature_scheme
//! [RFC8017 § 8.1]: https://datatracker.ietf.org/doc/html/rfc8017#section-8.1

use alloc::vec::Vec;
use digest::DynDigest;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

use super::mgf::mgf1_xor;
use crate::errors::{Error, Result};

/// Terminator byte of every PSS encoded message.
const TRAILER: u8 = 0xBC;

/// Checks a salt length against the hash output and encoded message sizes.
pub(crate) fn check_salt_len(s_len: usize, h_len: usize, em_len: usize) -> Result<()> {
    if s_len > h_len || em_len < h_len + s_len + 2 {
        return Err(Error::InvalidSaltLength);
    }
    Ok(())
}

pub(crate) fn emsa_pss_encode(
    m_hash: &[u8],
    em_bits: usize,
    salt: &[u8],
    hash: &mut dyn DynDigest,
    mgf_hash: &mut dyn DynDigest,
) -> Result<Vec<u8>> {
    // See [1], section 9.1.1
    let h_len = hash.output_size();
    let s_len = salt.len();
    let em_len = em_bits.div_ceil(8);

    // 1. If the length of M is greater than the input limitation for the
    //     hash function (2^61 - 1 octets for SHA-1), output "message too
    //     long" and stop.
    //
    // 2.  Let mHash = Hash(M), an octet string of length hLen.
    if m_hash.len() != h_len {
        return Err(Error::InputNotHashed);
    }

    // 3. If em_len < h_len + s_len + 2, output "encoding error" and stop.
    check_salt_len(s_len, h_len, em_len)?;

    let mut em = vec![0; em_len];

    let (db, h) = em.split_at_mut(em_len - h_len - 1);
    let h = &mut h[..(em_len - 1) - db.len()];

    // 4. Generate a random octet string salt of length s_len; if s_len = 0,
    //     then salt is the empty string.
    //
    // 5.  Let
    //       M' = (0x)00 00 00 00 00 00 00 00 || m_hash || salt;
    //
    //     M' is an octet string of length 8 + h_len + s_len with eight
    //     initial zero octets.
    //
    // 6.  Let H = Hash(M'), an octet string of length h_len.
    let prefix = [0u8; 8];

    hash.update(&prefix);
    hash.update(m_hash);
    hash.update(salt);

    let hashed = hash.finalize_reset();
    h.copy_from_slice(&hashed);

    // 7.  Generate an octet string PS consisting of em_len - s_len - h_len - 2
    //     zero octets. The length of PS may be 0.
    //
    // 8.  Let DB = PS || 0x01 || salt; DB is an octet string of length
    //     emLen - hLen - 1.
    db[em_len - s_len - h_len - 2] = 0x01;
    db[em_len - s_len - h_len - 1..].copy_from_slice(salt);

    // 9.  Let dbMask = MGF(H, emLen - hLen - 1).
    //
    // 10. Let maskedDB = DB \xor dbMask.
    mgf1_xor(db, mgf_hash, h)?;

    // 11. Set the leftmost 8 * em_len - em_bits bits of the leftmost octet in
    //     maskedDB to zero.
    db[0] &= 0xFF >> (8 * em_len - em_bits);

    // 12. Let EM = maskedDB || H || 0xbc.
    em[em_len - 1] = TRAILER;

    Ok(em)
}

fn emsa_pss_verify_pre<'a>(
    m_hash: &[u8],
    em: &'a mut [u8],
    em_bits: usize,
    s_len: Option<usize>,
    h_len: usize,
) -> Result<(&'a mut [u8], &'a mut [u8])> {
    // 1. If the length of M is greater than the input limitation for the
    //    hash function (2^61 - 1 octets for SHA-1), output "inconsistent"
    //    and stop.
    //
    // 2. Let mHash = Hash(M), an octet string of length hLen
    if m_hash.len() != h_len {
        return Err(Error::InputNotHashed);
    }

    let em_len = em.len();
    if em_len < h_len + 2 {
        return Err(Error::PaddingInvalid);
    }
    if let Some(s_len) = s_len {
        // 3. If emLen < hLen + sLen + 2, output "inconsistent" and stop.
        check_salt_len(s_len, h_len, em_len)?;
    }

    // 4. If the rightmost octet of EM does not have hexadecimal value
    //    0xbc, output "inconsistent" and stop.
    if em[em_len - 1] != TRAILER {
        return Err(Error::PaddingInvalid);
    }

    // 5. Let maskedDB be the leftmost emLen - hLen - 1 octets of EM, and
    //    let H be the next hLen octets.
    let (db, h) = em.split_at_mut(em_len - h_len - 1);
    let h = &mut h[..h_len];

    // 6. If the leftmost 8 * em_len - em_bits bits of the leftmost octet in
    //    maskedDB are not all equal to zero, output "inconsistent" and
    //    stop.
    if db[0]
        & (0xFF_u8
            .checked_shl(8 - (8 * em_len - em_bits) as u32)
            .unwrap_or(0))
        != 0
    {
        return Err(Error::PaddingInvalid);
    }

    Ok((db, h))
}

fn emsa_pss_verify_salt(db: &[u8], em_len: usize, s_len: usize, h_len: usize) -> Choice {
    // 10. If the emLen - hLen - sLen - 2 leftmost octets of DB are not zero
    //     or if the octet at position emLen - hLen - sLen - 1 (the leftmost
    //     position is "position 1") does not have hexadecimal value 0x01,
    //     output "inconsistent" and stop.
    let (zeroes, rest) = db.split_at(em_len - h_len - s_len - 2);
    let valid: Choice = zeroes
        .iter()
        .fold(Choice::from(1u8), |a, e| a & e.ct_eq(&0x00));

    valid & rest[0].ct_eq(&0x01)
}

/// Detect salt length by scanning DB for the 0x01 separator byte.
/// Returns (s_len, valid) where s_len is 0 on failure.
fn emsa_pss_get_salt_len(db: &[u8], em_len: usize, h_len: usize) -> (usize, Choice) {
    let em_len = em_len as u32;
    let h_len = h_len as u32;
    let max_scan_len = em_len - h_len - 2;

    let mut separator_pos = 0u32;
    let mut found_separator = Choice::from(0u8);
    let mut padding_valid = Choice::from(1u8);

    // Single forward scan to find separator and validate padding
    for i in 0..=max_scan_len {
        let byte_val = db[i as usize];
        let is_zero = byte_val.ct_eq(&0x00);
        let is_separator = byte_val.ct_eq(&0x01);
        let is_invalid = !(is_zero | is_separator);

        // Update separator position if we found one and haven't found one before
        let should_update_pos = is_separator & !found_separator;
        separator_pos = u32::conditional_select(&separator_pos, &i, should_update_pos);
        found_separator =
            Choice::conditional_select(&found_separator, &Choice::from(1u8), should_update_pos);

        // Padding is invalid if we see a non-zero, non-separator byte before finding separator
        let corrupts_padding = is_invalid & !found_separator;
        padding_valid &= !corrupts_padding;
    }

    let salt_len = max_scan_len.wrapping_sub(separator_pos);
    let final_valid = found_separator & padding_valid;

    // Return 0 length on failure
    let result_len = u32::conditional_select(&0u32, &salt_len, final_valid);

    (result_len as usize, final_valid)
}

/// Verifies the encoded message `em` (of the modulus length) against
/// `m_hash`. `s_len` of `None` detects the salt length from the block.
pub(crate) fn emsa_pss_verify(
    m_hash: &[u8],
    em: &mut [u8],
    s_len: Option<usize>,
    hash: &mut dyn DynDigest,
    mgf_hash: &mut dyn DynDigest,
    key_bits: usize,
) -> Result<()> {
    let em_bits = key_bits - 1;
    let em_len = em_bits.div_ceil(8);
    let key_len = key_bits.div_ceil(8);
    let h_len = hash.output_size();

    if em.len() != key_len {
        return Err(Error::PaddingInvalid);
    }

    // When the modulus is one bit past a byte boundary the encoded message is
    // one octet shorter than the block, and that octet must be zero.
    let (head, em) = em.split_at_mut(key_len - em_len);
    if head.iter().any(|b| *b != 0) {
        return Err(Error::PaddingInvalid);
    }

    let (db, h) = emsa_pss_verify_pre(m_hash, em, em_bits, s_len, h_len)?;

    // 7. Let dbMask = MGF(H, em_len - h_len - 1)
    //
    // 8. Let DB = maskedDB \xor dbMask
    mgf1_xor(db, mgf_hash, &*h)?;

    // 9.  Set the leftmost 8 * emLen - emBits bits of the leftmost octet in DB
    //     to zero.
    db[0] &= 0xFF >> /*uint*/(8 * em_len - em_bits);

    let (s_len, salt_valid) = match s_len {
        Some(s_len) => (s_len, emsa_pss_verify_salt(db, em_len, s_len, h_len)),
        None => emsa_pss_get_salt_len(db, em_len, h_len),
    };

    // 11. Let salt be the last s_len octets of DB.
    let salt = &db[db.len() - s_len..];

    // 12. Let
    //          M' = (0x)00 00 00 00 00 00 00 00 || mHash || salt ;
    //     M' is an octet string of length 8 + hLen + sLen with eight
    //     initial zero octets.
    //
    // 13. Let H' = Hash(M'), an octet string of length hLen.
    let prefix = [0u8; 8];

    hash.update(&prefix[..]);
    hash.update(m_hash);
    hash.update(salt);
    let h0 = hash.finalize_reset();

    // 14. If H = H', output "consistent." Otherwise, output "inconsistent."
    if (salt_valid & h0.ct_eq(h)).into() {
        Ok(())
    } else {
        Err(Error::PaddingInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashAlgorithm;

    const SHA256: HashAlgorithm = HashAlgorithm::Sha256;

    fn encode(m_hash: &[u8], key_bits: usize, salt: &[u8]) -> Result<Vec<u8>> {
        let em = emsa_pss_encode(
            m_hash,
            key_bits - 1,
            salt,
            &mut *SHA256.new_digest(),
            &mut *SHA256.new_digest(),
        )?;
        // left-align to the modulus length like the engine does
        let key_len = key_bits.div_ceil(8);
        let mut block = vec![0u8; key_len - em.len()];
        block.extend_from_slice(&em);
        Ok(block)
    }

    fn verify(m_hash: &[u8], em: &[u8], s_len: Option<usize>, key_bits: usize) -> Result<()> {
        let mut em = em.to_vec();
        emsa_pss_verify(
            m_hash,
            &mut em,
            s_len,
            &mut *SHA256.new_digest(),
            &mut *SHA256.new_digest(),
            key_bits,
        )
    }

    #[test]
    fn test_encode_verify() {
        let m_hash = SHA256.digest(b"message");
        let salt = [7u8; 32];
        for key_bits in [1024, 1025, 1031] {
            let em = encode(&m_hash, key_bits, &salt).unwrap();
            assert_eq!(em.len(), key_bits.div_ceil(8));
            assert_eq!(*em.last().unwrap(), 0xBC);
            verify(&m_hash, &em, Some(32), key_bits).unwrap();
            verify(&m_hash, &em, None, key_bits).unwrap();
        }
    }

    #[test]
    fn test_auto_salt_len_detects_short_salt() {
        let m_hash = SHA256.digest(b"message");
        let em = encode(&m_hash, 1024, &[1, 2, 3]).unwrap();
        verify(&m_hash, &em, None, 1024).unwrap();
        verify(&m_hash, &em, Some(3), 1024).unwrap();
        assert_eq!(verify(&m_hash, &em, Some(4), 1024), Err(Error::PaddingInvalid));
    }

    #[test]
    fn test_wrong_hash_rejected() {
        let m_hash = SHA256.digest(b"message");
        let other = SHA256.digest(b"massage");
        let em = encode(&m_hash, 1024, &[9u8; 32]).unwrap();
        assert_eq!(verify(&other, &em, Some(32), 1024), Err(Error::PaddingInvalid));
    }

    #[test]
    fn test_salt_len_limits() {
        let m_hash = SHA256.digest(b"message");
        assert_eq!(
            encode(&m_hash, 1024, &[0u8; 33]),
            Err(Error::InvalidSaltLength)
        );
        // em_len = 64 < 32 + 32 + 2
        assert_eq!(
            encode(&m_hash, 512, &[0u8; 32]),
            Err(Error::InvalidSaltLength)
        );
        assert_eq!(encode(&m_hash[1..], 1024, &[]), Err(Error::InputNotHashed));
    }

    #[test]
    fn test_corruption_rejected() {
        let m_hash = SHA256.digest(b"message");
        let em = encode(&m_hash, 1024, &[5u8; 32]).unwrap();

        for pos in [0, 10, 90, 100, 127] {
            let mut bad = em.clone();
            bad[pos] ^= 0x01;
            assert_eq!(
                verify(&m_hash, &bad, Some(32), 1024),
                Err(Error::PaddingInvalid),
                "position {pos}"
            );
        }

        // top bit beyond em_bits
        let mut bad = em.clone();
        bad[0] |= 0x80;
        assert_eq!(verify(&m_hash, &bad, Some(32), 1024), Err(Error::PaddingInvalid));
    }
}
