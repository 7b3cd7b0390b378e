//! # Error Types
//!
//! Error taxonomy shared by every NEXO crate. All errors use `thiserror`.
//!
//! - `ValidationError`: malformed caller input. Rejected immediately, never
//!   retried, surfaced with the violated constraint.
//! - `CanonicalizationError`: a record could not be canonically encoded.
//! - `CryptoError`: key parsing or signature failures.

use thiserror::Error;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Malformed input. Each variant names the constraint that was violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A public key was not exactly the required length.
    #[error("public key must be exactly {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required length in bytes.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// Registration timestamps must be strictly positive.
    #[error("timestamp must be a positive integer, got {0}")]
    NonPositiveTimestamp(i64),

    /// The identifier was empty.
    #[error("identifier must not be empty")]
    EmptyIdentifier,

    /// A base64 field failed to decode.
    #[error("{field} is not valid base64: {reason}")]
    InvalidBase64 {
        /// Name of the offending field.
        field: String,
        /// Decoder message.
        reason: String,
    },

    /// A digest was not 32 bytes.
    #[error("digest must be exactly 32 bytes, got {0}")]
    InvalidDigestLength(usize),

    /// A threshold policy is unsatisfiable or empty.
    #[error("invalid threshold policy: t={t}, n={n} (need 1 <= t <= n)")]
    InvalidPolicy {
        /// Required signatures.
        t: usize,
        /// Total cosigners.
        n: usize,
    },
}

/// Error in cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key generation, loading or parsing failed.
    #[error("key error: {0}")]
    KeyError(String),
}
