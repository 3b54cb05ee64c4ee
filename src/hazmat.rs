//! ⚠️ Low-level "hazmat" RSA functions.
//!
//! # ☢️️ WARNING: HAZARDOUS API ☢️
//!
//! This module holds functions that apply RSA's core encryption and decryption
//! primitives to raw data without adding or removing appropriate padding. A
//! well-reviewed padding scheme is crucial to the security of RSA, so there are
//! very few valid uses cases for this API. It's intended to be used for
//! implementing well-reviewed higher-level constructions, and by
//! [`Accelerator`](crate::accel::Accelerator) implementations that want a
//! software fallback.
//!
//! We do NOT recommend using it to implement any algorithm which has not
//! received extensive peer review by cryptographers.

pub use crate::algorithms::generate::{check_key_size, prime_lower_bound};
pub use crate::algorithms::mgf::mgf1;
pub use crate::algorithms::rsa::{
    check_ciphertext_range, rsa_decrypt, rsa_decrypt_and_check, rsa_encrypt,
};
