//! Padding schemes and their parameters.
//!
//! [`Padding`] is a closed set: each variant carries exactly the parameters
//! its scheme needs, and [`Padding::pad`] / [`Padding::unpad`] dispatch to the
//! byte-level implementations in [`crate::algorithms`].

use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use rand_core::CryptoRngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::algorithms::oaep::{oaep_decrypt_unpad, oaep_encrypt_pad, oaep_max_message_len};
use crate::algorithms::pkcs1v15::{
    pkcs1v15_encrypt_pad, pkcs1v15_encrypt_unpad, pkcs1v15_sign_pad, pkcs1v15_sign_unpad,
    PKCS1V15_OVERHEAD,
};
use crate::algorithms::pss::{check_salt_len, emsa_pss_encode, emsa_pss_verify};
use crate::errors::{Error, Result};
use crate::hash::HashAlgorithm;

/// Salt length of a PSS signature.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SaltLength {
    /// As many salt bytes as the hash outputs.
    #[default]
    HashLen,
    /// An explicit number of salt bytes.
    Exact(usize),
    /// Signing uses the hash length; verification accepts any salt length
    /// and finds it from the `0x01` separator.
    Auto,
}

/// Padding scheme and parameters used by an RSA operation.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Padding {
    /// No padding. Inputs must be exactly as long as the modulus.
    None,

    /// PKCS#1 v1.5. Encryption uses block type 2, signatures block type 1.
    Pkcs1v15 {
        /// When set, signatures wrap the digest in a DER `DigestInfo` for
        /// this hash and verification strips and checks it.
        digest_info: Option<HashAlgorithm>,
    },

    /// RSAES-OAEP.
    Oaep {
        /// Hash applied to the label.
        hash: HashAlgorithm,
        /// Hash driving MGF1.
        mgf_hash: HashAlgorithm,
        /// Optional label bound to the ciphertext.
        label: Option<Vec<u8>>,
    },

    /// RSASSA-PSS.
    Pss {
        /// Hash of the message, also used to build `H`.
        hash: HashAlgorithm,
        /// Hash driving MGF1.
        mgf_hash: HashAlgorithm,
        /// Salt length.
        salt_len: SaltLength,
    },
}

/// Which block layout an operation produces or consumes.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Direction {
    /// Public encrypt / private decrypt.
    Encrypt,
    /// Private sign / public verify.
    Sign,
}

impl Padding {
    /// PKCS#1 v1.5 over raw input bytes, for encryption or for signing a
    /// caller-encoded `DigestInfo`.
    pub fn pkcs1v15() -> Self {
        Padding::Pkcs1v15 { digest_info: None }
    }

    /// PKCS#1 v1.5 signatures over a digest produced by `hash`.
    pub fn pkcs1v15_sign(hash: HashAlgorithm) -> Self {
        Padding::Pkcs1v15 {
            digest_info: Some(hash),
        }
    }

    /// OAEP with `hash` for both the label and MGF1, and no label.
    pub fn oaep(hash: HashAlgorithm) -> Self {
        Padding::Oaep {
            hash,
            mgf_hash: hash,
            label: None,
        }
    }

    /// OAEP with a label.
    pub fn oaep_with_label(hash: HashAlgorithm, label: impl Into<Vec<u8>>) -> Self {
        Padding::Oaep {
            hash,
            mgf_hash: hash,
            label: Some(label.into()),
        }
    }

    /// OAEP with a distinct hash for MGF1.
    pub fn oaep_with_mgf_hash(hash: HashAlgorithm, mgf_hash: HashAlgorithm) -> Self {
        Padding::Oaep {
            hash,
            mgf_hash,
            label: None,
        }
    }

    /// PSS with a salt as long as the hash output.
    pub fn pss(hash: HashAlgorithm) -> Self {
        Padding::Pss {
            hash,
            mgf_hash: hash,
            salt_len: SaltLength::HashLen,
        }
    }

    /// PSS with an explicit salt length.
    pub fn pss_with_salt(hash: HashAlgorithm, salt_len: SaltLength) -> Self {
        Padding::Pss {
            hash,
            mgf_hash: hash,
            salt_len,
        }
    }

    /// Largest input accepted when encrypting or signing with a `k`-byte
    /// modulus.
    ///
    /// Returns `None` when the modulus is too small for the scheme and its
    /// hash, in which case every input is rejected, the empty one included.
    pub fn max_payload(&self, k: usize) -> Option<usize> {
        match self {
            Padding::None => Some(k),
            Padding::Pkcs1v15 { digest_info: None } => k.checked_sub(PKCS1V15_OVERHEAD),
            Padding::Pkcs1v15 {
                digest_info: Some(hash),
            } => {
                let t_len = hash.digest_info_prefix().len() + hash.output_size();
                (k >= t_len + PKCS1V15_OVERHEAD).then_some(hash.output_size())
            }
            Padding::Pss { hash, salt_len, .. } => {
                let h_len = hash.output_size();
                let s_len = match salt_len {
                    SaltLength::Exact(s_len) => *s_len,
                    SaltLength::HashLen | SaltLength::Auto => h_len,
                };
                check_salt_len(s_len, h_len, k).ok().map(|_| h_len)
            }
            Padding::Oaep { hash, .. } => oaep_max_message_len(hash.output_size(), k),
        }
    }

    /// Builds the `k`-byte block for a modulus of `key_bits` bits.
    pub(crate) fn pad<R: CryptoRngCore + ?Sized>(
        &self,
        rng: &mut R,
        input: &[u8],
        key_bits: usize,
        direction: Direction,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let k = key_bits.div_ceil(8);

        match (self, direction) {
            (Padding::None, _) => {
                if input.len() != k {
                    return Err(Error::SizeMismatch);
                }
                Ok(Zeroizing::new(input.to_vec()))
            }
            (Padding::Pkcs1v15 { digest_info: None }, Direction::Encrypt) => {
                pkcs1v15_encrypt_pad(rng, input, k)
            }
            (Padding::Pkcs1v15 { digest_info }, Direction::Sign) => {
                let t = digest_info_encode(*digest_info, input)?;
                pkcs1v15_sign_pad(&t, k).map(Zeroizing::new)
            }
            (
                Padding::Oaep {
                    hash,
                    mgf_hash,
                    label,
                },
                Direction::Encrypt,
            ) => oaep_encrypt_pad(
                rng,
                input,
                &mut *hash.new_digest(),
                &mut *mgf_hash.new_digest(),
                label.as_deref().unwrap_or_default(),
                k,
            ),
            (
                Padding::Pss {
                    hash,
                    mgf_hash,
                    salt_len,
                },
                Direction::Sign,
            ) => {
                let h_len = hash.output_size();
                if input.len() != h_len {
                    return Err(Error::InputNotHashed);
                }

                let s_len = match salt_len {
                    SaltLength::HashLen | SaltLength::Auto => h_len,
                    SaltLength::Exact(s_len) => *s_len,
                };
                let em_bits = key_bits.saturating_sub(1);
                check_salt_len(s_len, h_len, em_bits.div_ceil(8))?;

                let mut salt = vec![0u8; s_len];
                rng.fill_bytes(&mut salt);

                let em = emsa_pss_encode(
                    input,
                    em_bits,
                    &salt,
                    &mut *hash.new_digest(),
                    &mut *mgf_hash.new_digest(),
                )?;

                let mut block = Zeroizing::new(vec![0u8; k]);
                block[k - em.len()..].copy_from_slice(&em);
                Ok(block)
            }
            _ => Err(Error::InvalidPaddingScheme),
        }
    }

    /// Validates and strips the padding from the `k`-byte `block`, which may
    /// be modified in place.
    ///
    /// In the signing direction `hashed` is the digest the signature must
    /// cover: it is required by PSS and compared against the recovered
    /// digest by the other schemes. Every validation failure is reported as
    /// [`Error::PaddingInvalid`].
    pub(crate) fn unpad(
        &self,
        block: &mut [u8],
        key_bits: usize,
        direction: Direction,
        hashed: Option<&[u8]>,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let k = key_bits.div_ceil(8);
        if block.len() != k {
            return Err(Error::SizeMismatch);
        }

        let recovered = match (self, direction) {
            (Padding::None, _) => block.to_vec(),
            (Padding::Pkcs1v15 { digest_info: None }, Direction::Encrypt) => {
                pkcs1v15_encrypt_unpad(block, k)?
            }
            (Padding::Pkcs1v15 { digest_info }, Direction::Sign) => {
                let t = pkcs1v15_sign_unpad(block, k)?;
                digest_info_decode(*digest_info, t)?
            }
            (
                Padding::Oaep {
                    hash,
                    mgf_hash,
                    label,
                },
                Direction::Encrypt,
            ) => oaep_decrypt_unpad(
                block,
                &mut *hash.new_digest(),
                &mut *mgf_hash.new_digest(),
                label.as_deref().unwrap_or_default(),
                k,
            )?,
            (
                Padding::Pss {
                    hash,
                    mgf_hash,
                    salt_len,
                },
                Direction::Sign,
            ) => {
                let m_hash = hashed.ok_or(Error::InvalidPaddingScheme)?;
                let s_len = match salt_len {
                    SaltLength::HashLen => Some(hash.output_size()),
                    SaltLength::Exact(s_len) => Some(*s_len),
                    SaltLength::Auto => None,
                };
                emsa_pss_verify(
                    m_hash,
                    block,
                    s_len,
                    &mut *hash.new_digest(),
                    &mut *mgf_hash.new_digest(),
                    key_bits,
                )?;
                return Ok(Zeroizing::new(m_hash.to_vec()));
            }
            _ => return Err(Error::InvalidPaddingScheme),
        };
        let recovered = Zeroizing::new(recovered);

        if direction == Direction::Sign {
            if let Some(expected) = hashed {
                if !bool::from(recovered.as_slice().ct_eq(expected)) {
                    return Err(Error::PaddingInvalid);
                }
            }
        }

        Ok(recovered)
    }
}

/// Returns `T` for a type 1 block: the `DigestInfo` encoding of `hashed`, or
/// `hashed` itself when no hash is named.
fn digest_info_encode(hash: Option<HashAlgorithm>, hashed: &[u8]) -> Result<Vec<u8>> {
    let Some(hash) = hash else {
        return Ok(hashed.to_vec());
    };

    if hashed.len() != hash.output_size() {
        return Err(Error::InputNotHashed);
    }

    let prefix = hash.digest_info_prefix();
    let mut t = Vec::with_capacity(prefix.len() + hashed.len());
    t.extend_from_slice(prefix);
    t.extend_from_slice(hashed);
    Ok(t)
}

/// Inverse of [`digest_info_encode`].
fn digest_info_decode(hash: Option<HashAlgorithm>, t: Vec<u8>) -> Result<Vec<u8>> {
    let Some(hash) = hash else {
        return Ok(t);
    };

    let prefix = hash.digest_info_prefix();
    if t.len() != prefix.len() + hash.output_size() {
        return Err(Error::PaddingInvalid);
    }
    if !bool::from(t[..prefix.len()].ct_eq(prefix)) {
        return Err(Error::PaddingInvalid);
    }

    Ok(t[prefix.len()..].to_vec())
}
