//! Errors from the log engine and its stores.

use thiserror::Error;

use nexo_core::{CanonicalizationError, ValidationError};
use nexo_crypto::MerkleError;

/// Failure of an append-only store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying file IO failed.
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be parsed.
    #[error("corrupt record at line {line}: {reason}")]
    Corrupt {
        /// 1-based line number.
        line: usize,
        /// Parser message.
        reason: String,
    },

    /// A record could not be serialized.
    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from [`crate::TransparencyLog`] operations.
#[derive(Error, Debug)]
pub enum LogError {
    /// Caller input was malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An STH body could not be canonicalized.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// A proof was requested outside the tree.
    #[error(transparent)]
    Merkle(#[from] MerkleError),

    /// No STH has been published yet.
    #[error("no signed tree head has been published")]
    NoSth,

    /// An STH gathered fewer than `t` signatures and strict mode is on.
    #[error("STH for tree size {tree_size} has {got} of {required} required signatures")]
    InsufficientSignatures {
        /// Size of the rejected tree.
        tree_size: u64,
        /// Signatures gathered.
        got: usize,
        /// Signatures required.
        required: usize,
    },
}
