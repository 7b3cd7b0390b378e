//! # Verify-Proof Subcommand

use anyhow::Result;
use clap::Args;

use nexo_core::Digest32;
use nexo_crypto::verify_inclusion_proof;

use crate::parse_digest;

/// Arguments for `nexo verify-proof`.
#[derive(Args, Debug)]
pub struct VerifyProofArgs {
    /// Base64 leaf hash.
    #[arg(long)]
    pub leaf_hash: String,
    /// The `path_index` field of the proof response. Differs from the leaf
    /// index whenever an odd node was carried up on the leaf's path.
    #[arg(long)]
    pub path_index: u64,
    /// Base64 Merkle root from the STH.
    #[arg(long)]
    pub root: String,
    /// Comma-separated base64 sibling hashes, leaf level first. Empty for a
    /// single-leaf tree.
    #[arg(long, default_value = "", value_delimiter = ',')]
    pub proof: Vec<String>,
}

/// Execute `nexo verify-proof`. Exit code 1 when the proof does not verify.
pub fn run_verify_proof(args: &VerifyProofArgs) -> Result<u8> {
    if verify(args)? {
        println!("OK: inclusion proof verifies");
        Ok(0)
    } else {
        println!("FAIL: inclusion proof does not verify");
        Ok(1)
    }
}

/// Parse the arguments and check the proof.
pub fn verify(args: &VerifyProofArgs) -> Result<bool> {
    let leaf = parse_digest("--leaf-hash", &args.leaf_hash)?;
    let root = parse_digest("--root", &args.root)?;
    let siblings = args
        .proof
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_digest("--proof", s))
        .collect::<Result<Vec<Digest32>>>()?;
    Ok(verify_inclusion_proof(&leaf, &siblings, args.path_index, &root))
}
