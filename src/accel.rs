//! Offloading the modular exponentiation to an external accelerator.
//!
//! An [`Accelerator`] attached to an [`RsaKey`](crate::RsaKey) receives every
//! exponentiation the key performs. It may finish the job immediately or
//! answer [`Offload::Pending`], in which case the key keeps the padded block
//! and the operation's position, and the caller re-invokes the same operation
//! later. The accelerator is then handed the same job again and should report
//! the result once it has one.

use alloc::vec::Vec;

use crate::errors::Result;
use crate::engine::KeyRef;

/// Which exponent a job applies.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Exponent {
    /// `input^e mod n`
    Public,
    /// `input^d mod n`
    Private,
}

/// A single modular exponentiation.
#[derive(Debug, Clone, Copy)]
pub struct ExponentiationJob<'a> {
    /// Exponent to apply.
    pub exponent: Exponent,
    /// Big-endian input, exactly as long as the modulus.
    pub input: &'a [u8],
    /// Key to exponentiate with.
    pub key: KeyRef<'a>,
}

/// Outcome of submitting a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offload {
    /// Not finished; submit the same job again later.
    Pending,
    /// Big-endian result, at most as long as the modulus.
    Complete(Vec<u8>),
}

/// Hardware or asynchronous backend for the RSA primitive.
pub trait Accelerator: Send {
    /// Starts or polls `job`.
    fn submit(&mut self, job: &ExponentiationJob<'_>) -> Result<Offload>;
}
