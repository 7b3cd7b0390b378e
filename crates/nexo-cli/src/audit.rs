//! # Audit Subcommand
//!
//! Loads `users.jsonl` and `sth.jsonl` from a data directory and runs the
//! full [`Auditor`]: leaf hashes, every STH root, the hash chain, tree-size
//! monotonicity, pending leaves, and (with `--cosigners`) signature
//! thresholds.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use nexo_core::temporal::format_unix;
use nexo_crypto::keystore;
use nexo_log::{
    AuditFinding, AuditReport, Auditor, JsonlLeafStore, JsonlSthStore, LeafStore, SthStore,
};

/// Arguments for `nexo audit`.
#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Directory containing `users.jsonl` and `sth.jsonl`.
    #[arg(long, default_value = "server/_data")]
    pub data_dir: PathBuf,
    /// Directory of `cosigner_{i}.pub` files. Signature checks are skipped
    /// without it.
    #[arg(long)]
    pub cosigners: Option<PathBuf>,
    /// Leaves the store may run ahead of the latest STH.
    #[arg(long, default_value_t = nexo_log::audit::DEFAULT_MAX_PENDING_LEAVES)]
    pub max_pending: u64,
    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute `nexo audit`. Exit code 1 on any finding.
pub fn run_audit(args: &AuditArgs) -> Result<u8> {
    let report = audit_dir(args)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report, args.cosigners.is_some()));
    }
    Ok(if report.is_ok() { 0 } else { 1 })
}

/// Load the stores under `args.data_dir` and audit them.
pub fn audit_dir(args: &AuditArgs) -> Result<AuditReport> {
    if !args.data_dir.is_dir() {
        bail!("data directory not found: {}", args.data_dir.display());
    }
    let leaves = JsonlLeafStore::open(&args.data_dir)?
        .list_all()
        .context("reading leaf store")?;
    let sths = JsonlSthStore::open(&args.data_dir)?
        .list_all()
        .context("reading STH store")?;

    let roster = match &args.cosigners {
        Some(dir) => {
            let roster = keystore::load_public_roster(dir)?;
            if roster.is_empty() {
                bail!("no cosigner_0.pub in {}", dir.display());
            }
            Some(roster)
        }
        None => None,
    };

    tracing::info!(
        leaves = leaves.len(),
        sths = sths.len(),
        "auditing {}",
        args.data_dir.display()
    );
    Ok(Auditor::new(roster)
        .with_max_pending_leaves(args.max_pending)
        .audit(&leaves, &sths))
}

fn describe(f: &AuditFinding) -> String {
    match f {
        AuditFinding::InvalidLeaf { index, reason } => format!("leaf {index}: invalid ({reason})"),
        AuditFinding::LeafHashMismatch { index, stored, recomputed } => format!(
            "leaf {index}: stored hash {stored} != recomputed {recomputed}"
        ),
        AuditFinding::TreeSizeExceedsLeaves { sth_index, tree_size, leaves } => format!(
            "sth {sth_index}: tree_size {tree_size} exceeds {leaves} stored leaves"
        ),
        AuditFinding::RootMismatch { sth_index, claimed, computed } => format!(
            "sth {sth_index}: root {claimed} != recomputed {computed}"
        ),
        AuditFinding::BrokenChainLink { sth_index } => {
            format!("sth {sth_index}: prev_hash does not link to the previous STH")
        }
        AuditFinding::TreeSizeRegressed { sth_index, previous, current } => format!(
            "sth {sth_index}: tree_size went from {previous} to {current}"
        ),
        AuditFinding::InsufficientSignatures { sth_index, valid, required } => format!(
            "sth {sth_index}: {valid} valid signature(s), {required} required"
        ),
        AuditFinding::TooManyPendingLeaves { pending, allowed } => format!(
            "{pending} leaves not covered by an STH ({allowed} allowed)"
        ),
    }
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "FAIL"
    }
}

/// Human-readable report.
pub fn render(report: &AuditReport, signatures_checked: bool) -> String {
    let mut out = format!(
        "leaves: {}  sths: {}  pending: {}\n",
        report.leaf_count, report.sth_count, report.pending_leaves
    );
    for s in &report.sths {
        let sigs = match (s.signatures_ok, s.valid_signatures) {
            (Some(ok), Some(n)) => format!("{} ({n} valid)", mark(ok)),
            _ => "skipped".to_string(),
        };
        out.push_str(&format!(
            "  sth {:>4}  size {:>6}  {}  root {}  chain {}  signatures {}\n",
            s.index,
            s.tree_size,
            format_unix(s.issued_at).unwrap_or_else(|| s.issued_at.to_string()),
            mark(s.root_ok),
            mark(s.chain_ok),
            sigs
        ));
    }
    if !signatures_checked {
        out.push_str("signature checks skipped: pass --cosigners DIR to enable\n");
    }
    if report.is_ok() {
        out.push_str("OK: audit passed\n");
    } else {
        for f in &report.findings {
            out.push_str(&format!("  - {}\n", describe(f)));
        }
        out.push_str(&format!("FAIL: {} finding(s)\n", report.findings.len()));
    }
    out
}
