//! # nexo-cli: Transparency Log Command-Line Interface
//!
//! ## Subcommands
//!
//! - `keygen`: generate dev cosigner key files
//! - `leaf-hash`: compute the leaf hash of one registration
//! - `audit`: audit a data directory offline
//! - `verify-proof`: check an inclusion proof against a root
//!
//! ## Crate Policy
//!
//! - Argument structs live beside their handlers; `main.rs` only dispatches.
//! - Handlers return an exit code. Domain logic stays in `nexo-log` and
//!   `nexo-crypto`.

pub mod audit;
pub mod keygen;
pub mod leaf;
pub mod proof;

use anyhow::{Context, Result};
use nexo_core::Digest32;

/// Parse a base64 digest, naming the argument on failure.
pub(crate) fn parse_digest(arg: &str, value: &str) -> Result<Digest32> {
    Digest32::from_base64(value.trim()).with_context(|| format!("invalid {arg}"))
}
