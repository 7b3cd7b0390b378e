//! # nexo-core: Foundational Types for the Transparency Log
//!
//! This crate is the leaf of the NEXO workspace DAG. It defines the
//! primitives every other crate builds on:
//!
//! 1. **`CanonicalBytes` newtype.** All body hashes (STH linking) flow through
//!    `CanonicalBytes::new()`. No raw `serde_json::to_vec()` feeds a digest.
//!
//! 2. **`Digest32`.** A fixed 32-byte SHA-256 value that serializes as a
//!    standard base64 string, the wire format for every digest the log
//!    publishes.
//!
//! 3. **`sha256_digest()` accepts only `&CanonicalBytes`.** Structured records
//!    can only be hashed through canonicalization. Fixed binary layouts (leaf
//!    pre-images, Merkle nodes) use [`sha256_concat`] instead.
//!
//! 4. **Injected time.** [`Clock`] abstracts "now" so that STH issuance is
//!    deterministic under test.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `nexo-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{decode_base64, encode_base64, sha256_concat, sha256_digest, Digest32};
pub use error::{CanonicalizationError, CryptoError, ValidationError};
pub use temporal::{Clock, FixedClock, SystemClock};
