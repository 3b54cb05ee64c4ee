//! Mask generation function common to both PSS and OAEP padding

use alloc::vec::Vec;
use digest::DynDigest;

use crate::errors::{Error, Result};
use crate::hash::HashAlgorithm;

/// Mask generation function: xors `MGF1(seed, out.len())` into `out`.
///
/// Fails if the digest reports a zero output size or if out is larger than
/// `2**32` blocks. This is in accordance with RFC 8017 - PKCS #1 B.2.1
pub(crate) fn mgf1_xor(out: &mut [u8], digest: &mut dyn DynDigest, seed: &[u8]) -> Result<()> {
    let h_len = digest.output_size();
    if h_len == 0 {
        return Err(Error::UnsupportedHash);
    }

    const MAX_BLOCKS: u64 = u32::MAX as u64 + 1;
    if out.len() as u64 > MAX_BLOCKS * h_len as u64 {
        return Err(Error::InvalidArgument);
    }

    let mut counter = [0u8; 4];
    let mut i = 0;

    while i < out.len() {
        digest.update(seed);
        digest.update(&counter);

        let digest_output = digest.finalize_reset();
        for byte in digest_output.iter() {
            if i >= out.len() {
                break;
            }
            out[i] ^= byte;
            i += 1;
        }
        inc_counter(&mut counter);
    }

    Ok(())
}

/// Derives `out_len` bytes of mask from `seed` by hashing `seed || be32(counter)`
/// for `counter = 0, 1, ...`, truncating the last block.
pub fn mgf1(hash: HashAlgorithm, seed: &[u8], out_len: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; out_len];
    mgf1_xor(&mut out, &mut *hash.new_digest(), seed)?;
    Ok(out)
}

fn inc_counter(counter: &mut [u8; 4]) {
    for i in (0..4).rev() {
        counter[i] = counter[i].wrapping_add(1);
        if counter[i] != 0 {
            // No overflow
            return;
        }
    }
}
