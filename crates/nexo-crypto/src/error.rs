//! Errors from the Merkle engine and the cosign authority.

use thiserror::Error;

use nexo_core::{CryptoError, ValidationError};

/// Errors from Merkle tree operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    /// Proof requested for a leaf that does not exist.
    #[error("leaf index {index} out of range for tree of size {size}")]
    LeafIndexOutOfRange {
        /// Requested leaf index.
        index: u64,
        /// Number of leaves in the tree.
        size: u64,
    },
}

/// Errors constructing or loading the cosign authority.
#[derive(Error, Debug)]
pub enum CosignError {
    /// The key set does not match the policy.
    #[error("expected {expected} cosigner keys, got {actual}")]
    KeyCount {
        /// `n` from the policy.
        expected: usize,
        /// Keys supplied.
        actual: usize,
    },

    /// Two keys share an id.
    #[error("duplicate cosigner id: {0}")]
    DuplicateId(String),

    /// Policy is unsatisfiable.
    #[error(transparent)]
    Policy(#[from] ValidationError),

    /// Key material could not be parsed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Key file could not be read or written.
    #[error("key file {path}: {source}")]
    KeyFile {
        /// Path of the key file.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}
