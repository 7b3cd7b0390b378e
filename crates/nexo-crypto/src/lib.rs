//! # nexo-crypto: Cryptographic Engine
//!
//! - **Ed25519** signing and verification over 32-byte STH hashes.
//! - **Merkle engine**: root computation, inclusion-proof generation and
//!   verification over an ordered leaf-hash sequence.
//! - **Cosign authority**: a fixed set of `n` cosigner keys, threshold
//!   signing, and threshold verification against a public roster.
//! - **Key store**: loading cosigner seeds from the environment or a key
//!   directory, generating dev keys when neither is present.
//!
//! ## Crate Policy
//!
//! - Depends only on `nexo-core` internally.
//! - No mocking of cryptographic operations in tests.

pub mod cosign;
pub mod ed25519;
pub mod error;
pub mod keystore;
pub mod merkle;

pub use cosign::{
    CosignAuthority, CosignerId, CosignerKey, CosignerPublic, CosignerRoster, CosignerSignature,
    RejectReason, SigningMode, ThresholdPolicy, ThresholdTally,
};
pub use ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use error::{CosignError, MerkleError};
pub use merkle::{compute_root, hash_children, verify_inclusion_proof, InclusionProof, MerkleTree};
