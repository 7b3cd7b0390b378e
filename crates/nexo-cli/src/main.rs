//! # nexo CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nexo_cli::audit::{run_audit, AuditArgs};
use nexo_cli::keygen::{run_keygen, KeygenArgs};
use nexo_cli::leaf::{run_leaf_hash, LeafHashArgs};
use nexo_cli::proof::{run_verify_proof, VerifyProofArgs};

/// NEXO transparency log toolchain.
///
/// Generates cosigner keys, computes leaf hashes, audits a log's data
/// directory offline, and verifies inclusion proofs.
#[derive(Parser, Debug)]
#[command(name = "nexo", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate cosigner key pairs.
    Keygen(KeygenArgs),

    /// Compute the leaf hash of a registration.
    LeafHash(LeafHashArgs),

    /// Audit a data directory: leaf hashes, roots, chain, signatures.
    Audit(AuditArgs),

    /// Verify an inclusion proof against a root.
    VerifyProof(VerifyProofArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Keygen(args) => run_keygen(&args),
        Commands::LeafHash(args) => run_leaf_hash(&args),
        Commands::Audit(args) => run_audit(&args),
        Commands::VerifyProof(args) => run_verify_proof(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keygen() {
        let cli = Cli::try_parse_from(["nexo", "keygen", "--count", "5", "--output", "/tmp/k"])
            .unwrap();
        match cli.command {
            Commands::Keygen(args) => {
                assert_eq!(args.count, 5);
                assert_eq!(args.output, std::path::PathBuf::from("/tmp/k"));
                assert!(!args.force);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_verify_proof_splits_siblings() {
        let cli = Cli::try_parse_from([
            "nexo",
            "-vv",
            "verify-proof",
            "--leaf-hash",
            "AA==",
            "--path-index",
            "3",
            "--root",
            "BB==",
            "--proof",
            "a,b,c",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::VerifyProof(args) => {
                assert_eq!(args.path_index, 3);
                assert_eq!(args.proof, vec!["a", "b", "c"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_audit_defaults() {
        let cli = Cli::try_parse_from(["nexo", "audit", "--data-dir", "d"]).unwrap();
        match cli.command {
            Commands::Audit(args) => {
                assert!(args.cosigners.is_none());
                assert_eq!(args.max_pending, 1);
                assert!(!args.json);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn leaf_hash_requires_timestamp() {
        assert!(Cli::try_parse_from(["nexo", "leaf-hash", "--id", "x", "--public-key", "AA=="])
            .is_err());
    }
}
