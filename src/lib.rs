#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Supported algorithms
//!
//! This crate supports several schemes described in [RFC8017]:
//!
//! - [OAEP encryption scheme](#oaep-encryption)
//! - [PKCS#1 v1.5 encryption scheme](#pkcs1-v15-encryption)
//! - [PKCS#1 v1.5 signature scheme](#pkcs1-v15-signatures)
//! - [PSS signature scheme](#pss-signatures)
//!
//! Schemes are selected with a [`Padding`] value. Operations run on an
//! [`RsaKey`], which owns the key material together with the state of its
//! one in-flight operation, or directly on [`RsaPublicKey`] and
//! [`RsaPrivateKey`].
//!
//! # Usage
//!
//! ## OAEP encryption
//!
//! ```
//! use rsa_engine::{HashAlgorithm, Padding, RsaKey};
//!
//! let mut rng = rand::thread_rng(); // rand@0.8
//!
//! let mut key = RsaKey::generate(&mut rng, 2048, 65537).expect("failed to generate a key");
//!
//! // Encrypt
//! let data = b"hello world";
//! let padding = Padding::oaep(HashAlgorithm::Sha256);
//! let enc_data = key.public_encrypt(&mut rng, &padding, &data[..]).expect("failed to encrypt");
//! assert_ne!(&data[..], &enc_data[..]);
//!
//! // Decrypt
//! let dec_data = key.private_decrypt(&mut rng, &padding, &enc_data).expect("failed to decrypt");
//! assert_eq!(&data[..], &dec_data[..]);
//! ```
//!
//! ## PKCS#1 v1.5 encryption
//! ```
//! use rsa_engine::{Padding, RsaPrivateKey, RsaPublicKey};
//!
//! let mut rng = rand::thread_rng(); // rand@0.8
//!
//! let bits = 2048;
//! let private_key = RsaPrivateKey::new(&mut rng, bits).expect("failed to generate a key");
//! let public_key = RsaPublicKey::from(&private_key);
//!
//! // Encrypt
//! let data = b"hello world";
//! let enc_data = public_key.encrypt(&mut rng, &Padding::pkcs1v15(), &data[..]).expect("failed to encrypt");
//! assert_ne!(&data[..], &enc_data[..]);
//!
//! // Decrypt
//! let dec_data = private_key.decrypt(&mut rng, &Padding::pkcs1v15(), &enc_data).expect("failed to decrypt");
//! assert_eq!(&data[..], &dec_data[..]);
//! ```
//!
//! ## PKCS#1 v1.5 signatures
//! ```
//! use rsa_engine::{HashAlgorithm, Padding, RsaKey};
//!
//! let mut rng = rand::thread_rng(); // rand@0.8
//!
//! let mut key = RsaKey::generate(&mut rng, 2048, 65537).expect("failed to generate a key");
//! let padding = Padding::pkcs1v15_sign(HashAlgorithm::Sha256);
//!
//! // Sign
//! let digest = HashAlgorithm::Sha256.digest(b"hello world");
//! let signature = key.private_sign(&mut rng, &padding, &digest).expect("failed to sign");
//!
//! // Verify
//! let recovered = key.public_verify(&padding, &signature, &digest).expect("failed to verify");
//! assert_eq!(recovered, digest);
//! ```
//!
//! ## PSS signatures
//! ```
//! use rsa_engine::{HashAlgorithm, Padding, RsaPrivateKey, SaltLength};
//!
//! let mut rng = rand::thread_rng(); // rand@0.8
//!
//! let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("failed to generate a key");
//! let public_key = private_key.to_public_key();
//!
//! // Sign
//! let digest = HashAlgorithm::Sha256.digest(b"hello world");
//! let signature = private_key
//!     .sign(&mut rng, &Padding::pss(HashAlgorithm::Sha256), &digest)
//!     .expect("failed to sign");
//!
//! // Verify, without knowing the salt length in advance
//! let padding = Padding::pss_with_salt(HashAlgorithm::Sha256, SaltLength::Auto);
//! public_key.verify(&padding, &digest, &signature).expect("failed to verify");
//! ```
//!
//! ## Deferred exponentiation
//!
//! An [`Accelerator`] may answer [`Offload::Pending`]; the operation then
//! reports [`Progress::Pending`] and is resumed by calling it again.
//!
//! ```
//! use rsa_engine::{
//!     Accelerator, Exponent, ExponentiationJob, Offload, OperationKind, OperationRequest,
//!     Padding, Progress, PublicKeyParts, RsaKey, BigUint,
//! };
//!
//! struct Slow(bool);
//!
//! impl Accelerator for Slow {
//!     fn submit(&mut self, job: &ExponentiationJob<'_>) -> rsa_engine::Result<Offload> {
//!         self.0 = !self.0;
//!         if self.0 {
//!             return Ok(Offload::Pending);
//!         }
//!         assert_eq!(job.exponent, Exponent::Public);
//!         let x = BigUint::from_bytes_be(job.input);
//!         Ok(Offload::Complete(x.modpow(job.key.e(), job.key.n()).to_bytes_be()))
//!     }
//! }
//!
//! let mut rng = rand::thread_rng(); // rand@0.8
//! let private = rsa_engine::RsaPrivateKey::new(&mut rng, 2048).unwrap();
//! let mut key = RsaKey::from(private.to_public_key()).with_accelerator(Slow(false));
//!
//! let padding = Padding::pkcs1v15();
//! let request = OperationRequest::new(OperationKind::PublicEncrypt, b"later", &padding);
//! assert_eq!(key.process(&mut rng, &request).unwrap(), Progress::Pending);
//! let ciphertext = match key.process(&mut rng, &request).unwrap() {
//!     Progress::Ready(ciphertext) => ciphertext,
//!     Progress::Pending => unreachable!(),
//! };
//! assert_eq!(private.decrypt(&mut rng, &padding, &ciphertext).unwrap(), b"later");
//! ```
//!
//! [RFC8017]: https://datatracker.ietf.org/doc/html/rfc8017

#[macro_use]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub use num_bigint::BigUint;
pub use rand_core;

pub mod accel;
mod algorithms;
pub mod config;
pub mod engine;
pub mod errors;
pub mod hash;
pub mod padding;
pub mod traits;

mod dummy_rng;
mod key;

pub use crate::{
    accel::{Accelerator, Exponent, ExponentiationJob, Offload},
    algorithms::generate::{MAX_KEY_BITS, MIN_KEY_BITS},
    algorithms::mgf::mgf1,
    config::{EngineConfig, KeyGenConfig},
    engine::{KeyRef, OperationKind, OperationRequest, OperationState, Progress, RsaKey},
    errors::{Error, Result},
    hash::HashAlgorithm,
    key::{check_public, RsaPrivateKey, RsaPublicKey},
    padding::{Padding, SaltLength},
    traits::{PrivateKeyParts, PublicKeyParts},
};

#[cfg(feature = "hazmat")]
pub mod hazmat;
