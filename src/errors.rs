//! Error types.

/// Alias for [`core::result::Result`] with the `rsa-engine` crate's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types
///
/// Every failure while validating a padded block is reported as
/// [`Error::PaddingInvalid`], whatever the internal cause.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Null or empty buffer, bad key state or an unsupported combination of
    /// padding and operation.
    #[error("invalid argument")]
    InvalidArgument,

    /// Padding scheme cannot be used for the requested operation.
    #[error("invalid padding scheme")]
    InvalidPaddingScheme,

    /// Output capacity is smaller than the result.
    #[error("buffer too small")]
    BufferTooSmall,

    /// Message too long for the modulus size and padding overhead.
    #[error("message too long")]
    MessageTooLong,

    /// OAEP label too long.
    #[error("label too long")]
    LabelTooLong,

    /// Input is not the output of the configured hash function.
    #[error("input must be hashed")]
    InputNotHashed,

    /// Padding or signature validation failed.
    #[error("invalid padding")]
    PaddingInvalid,

    /// Ciphertext outside of `1 < c < n - 1`.
    #[error("value out of range")]
    OutOfRange,

    /// Unpadded input length does not equal the modulus length.
    #[error("size mismatch")]
    SizeMismatch,

    /// PSS salt length incompatible with hash or modulus size.
    #[error("invalid salt length")]
    InvalidSaltLength,

    /// Hash implementation reported an unusable digest size.
    #[error("unsupported hash")]
    UnsupportedHash,

    /// The key is too small for the request. Returned when a requested
    /// modulus size is below the generation minimum, and when a value
    /// (a primitive result or an encoded block) does not fit in the
    /// modulus length.
    #[error("key too small")]
    KeyTooSmall,

    /// Prime search exhausted its trial budget.
    #[error("prime generation failed")]
    PrimeGenerationFailed,

    /// Invalid prime value.
    #[error("invalid prime value")]
    InvalidPrime,

    /// Invalid modulus.
    #[error("invalid modulus")]
    InvalidModulus,

    /// Invalid exponent.
    #[error("invalid exponent")]
    InvalidExponent,

    /// Public exponent too small.
    #[error("public exponent too small")]
    PublicExponentTooSmall,

    /// Public exponent too large.
    #[error("public exponent too large")]
    PublicExponentTooLarge,

    /// Modulus too large.
    #[error("modulus too large")]
    ModulusTooLarge,

    /// Key size rejected by the active size policy.
    #[error("key size not allowed")]
    KeySizeNotAllowed,

    /// Exponentiation was handed to an accelerator and has not completed.
    /// Re-invoke the same operation to resume it.
    #[error("operation pending")]
    Pending,

    /// Allocation of a scratch buffer failed.
    #[error("memory exhausted")]
    MemoryExhausted,

    /// Internal error.
    #[error("internal error")]
    Internal,
}

impl Error {
    /// Returns `true` for [`Error::Pending`], which is a status rather than a
    /// failure.
    pub fn is_pending(&self) -> bool {
        matches!(self, Error::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn pending_is_not_a_failure_kind() {
        assert!(Error::Pending.is_pending());
        assert!(!Error::PaddingInvalid.is_pending());
    }

    #[test]
    fn display_does_not_leak_cause() {
        assert_eq!(Error::PaddingInvalid.to_string(), "invalid padding");
    }
}
