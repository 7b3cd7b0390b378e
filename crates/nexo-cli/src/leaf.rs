//! # Leaf-Hash Subcommand
//!
//! Prints the base64 leaf hash of a registration, for checking a server's
//! `leaf_hash` or building proof inputs by hand.

use anyhow::{Context, Result};
use clap::Args;

use nexo_core::{decode_base64, Digest32};
use nexo_log::compute_leaf_hash;

/// Arguments for `nexo leaf-hash`.
#[derive(Args, Debug)]
pub struct LeafHashArgs {
    /// Registered identifier, e.g. a DID.
    #[arg(long)]
    pub id: String,
    /// Base64 32-byte public key.
    #[arg(long)]
    pub public_key: String,
    /// Registration time, Unix seconds.
    #[arg(long)]
    pub timestamp: i64,
}

/// Execute `nexo leaf-hash`.
pub fn run_leaf_hash(args: &LeafHashArgs) -> Result<u8> {
    println!("{}", leaf_hash(args)?.to_base64());
    Ok(0)
}

/// Compute the leaf hash named by `args`.
pub fn leaf_hash(args: &LeafHashArgs) -> Result<Digest32> {
    let public_key = decode_base64("public_key", args.public_key.trim())?;
    compute_leaf_hash(&args.id, &public_key, args.timestamp).context("cannot hash leaf")
}
