//! # Auditor
//!
//! An independent, read-only consumer of the leaf and STH sequences. Every
//! leaf hash is re-derived from the raw record, and every STH root is
//! recomputed from those hashes. A record too malformed to hash is reported
//! as [`AuditFinding::InvalidLeaf`]; only then does its stored hash stand in,
//! so the leaves after it keep their positions in every later prefix.
//!
//! [`Auditor::audit`] evaluates every check for every STH and records each
//! failure as an [`AuditFinding`]. One failure never hides another.

use nexo_core::{Digest32, ValidationError};
use nexo_crypto::{compute_root, CosignerRoster};
use serde::Serialize;

use crate::leaf::LeafRecord;
use crate::sth::SignedTreeHead;

/// Default number of leaves the leaf store may run ahead of the latest STH.
pub const DEFAULT_MAX_PENDING_LEAVES: u64 = 1;

/// Re-run the leaf hasher on every record and compute the Merkle root.
pub fn recompute_root_from_leaves(raw_leaves: &[LeafRecord]) -> Result<Digest32, ValidationError> {
    let hashes = raw_leaves
        .iter()
        .map(LeafRecord::recompute_hash)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(compute_root(&hashes))
}

/// Outcome of comparing raw leaves against one STH.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootAudit {
    /// Root and size both agree.
    #[serde(rename = "match")]
    pub matches: bool,
    /// Root recomputed from the raw leaves.
    pub computed_root: Digest32,
    /// Number of raw leaves supplied.
    pub tree_size: u64,
    /// Tree size the STH claims.
    pub sth_tree_size: u64,
}

/// Compare the root of `raw_leaves` with `sth`. A mismatch in either root or
/// size fails.
pub fn audit_root(raw_leaves: &[LeafRecord], sth: &SignedTreeHead) -> Result<RootAudit, ValidationError> {
    let computed_root = recompute_root_from_leaves(raw_leaves)?;
    let tree_size = raw_leaves.len() as u64;
    Ok(RootAudit {
        matches: computed_root == sth.body.root && tree_size == sth.body.tree_size,
        computed_root,
        tree_size,
        sth_tree_size: sth.body.tree_size,
    })
}

/// `current.prev_hash` equals the body hash of `previous`.
pub fn verify_chain_link(current: &SignedTreeHead, previous: &SignedTreeHead) -> bool {
    current.links_to(previous).unwrap_or(false)
}

/// `sth` carries at least `sth.policy.t` valid signatures from distinct
/// members of `roster`.
pub fn verify_signature_threshold(sth: &SignedTreeHead, roster: &CosignerRoster) -> bool {
    sth.verify_signatures(roster).unwrap_or(false)
}

/// A single audit failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditFinding {
    /// A stored record cannot be hashed at all.
    InvalidLeaf {
        /// Position in the leaf store.
        index: u64,
        /// Validation message.
        reason: String,
    },
    /// The stored leaf hash differs from the hash of the raw fields.
    LeafHashMismatch {
        /// Position in the leaf store.
        index: u64,
        /// Hash found in the store.
        stored: Digest32,
        /// Hash derived from the raw fields.
        recomputed: Digest32,
    },
    /// The STH claims more leaves than the store holds.
    TreeSizeExceedsLeaves {
        /// Position in the STH chain.
        sth_index: u64,
        /// Claimed size.
        tree_size: u64,
        /// Leaves available.
        leaves: u64,
    },
    /// The STH root differs from the recomputed root.
    RootMismatch {
        /// Position in the STH chain.
        sth_index: u64,
        /// Root the STH claims.
        claimed: Digest32,
        /// Root recomputed from raw leaves.
        computed: Digest32,
    },
    /// `prev_hash` does not match the previous body, or the first STH has a
    /// non-empty `prev_hash`.
    BrokenChainLink {
        /// Position in the STH chain.
        sth_index: u64,
    },
    /// The tree shrank between consecutive STHs.
    TreeSizeRegressed {
        /// Position in the STH chain.
        sth_index: u64,
        /// Previous size.
        previous: u64,
        /// This size.
        current: u64,
    },
    /// Fewer than `t` valid, distinct cosigner signatures.
    InsufficientSignatures {
        /// Position in the STH chain.
        sth_index: u64,
        /// Valid distinct signatures.
        valid: usize,
        /// Required by the STH's policy.
        required: usize,
    },
    /// The leaf store is further ahead of the latest STH than tolerated.
    TooManyPendingLeaves {
        /// Leaves not yet covered by an STH.
        pending: u64,
        /// Tolerance.
        allowed: u64,
    },
}

/// Per-STH check results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SthAudit {
    /// Position in the STH chain, oldest first.
    pub index: u64,
    /// Claimed tree size.
    pub tree_size: u64,
    /// Issue time, Unix seconds.
    pub issued_at: i64,
    /// Recomputed root matches.
    pub root_ok: bool,
    /// Linked correctly to the previous STH.
    pub chain_ok: bool,
    /// Threshold met. `None` when no roster was supplied.
    pub signatures_ok: Option<bool>,
    /// Valid distinct signatures. `None` when no roster was supplied.
    pub valid_signatures: Option<usize>,
}

/// The result of a full audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Leaves in the store.
    pub leaf_count: u64,
    /// STHs in the chain.
    pub sth_count: u64,
    /// Leaves beyond the latest STH.
    pub pending_leaves: u64,
    /// One entry per STH, oldest first.
    pub sths: Vec<SthAudit>,
    /// Every failure found.
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    /// No findings.
    pub fn is_ok(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Audits a log from its raw data.
#[derive(Debug, Clone)]
pub struct Auditor {
    roster: Option<CosignerRoster>,
    max_pending_leaves: u64,
}

impl Default for Auditor {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Auditor {
    /// An auditor. Without a roster, signature checks are skipped.
    pub fn new(roster: Option<CosignerRoster>) -> Self {
        Self {
            roster,
            max_pending_leaves: DEFAULT_MAX_PENDING_LEAVES,
        }
    }

    /// Override the pending-leaf tolerance.
    pub fn with_max_pending_leaves(mut self, max: u64) -> Self {
        self.max_pending_leaves = max;
        self
    }

    /// Audit `leaves` (append order) against `sths` (oldest first).
    pub fn audit(&self, leaves: &[LeafRecord], sths: &[SignedTreeHead]) -> AuditReport {
        let mut findings = Vec::new();

        let mut hashes = Vec::with_capacity(leaves.len());
        for (i, leaf) in leaves.iter().enumerate() {
            let index = i as u64;
            match leaf.recompute_hash() {
                Ok(recomputed) => {
                    if recomputed != leaf.leaf_hash {
                        findings.push(AuditFinding::LeafHashMismatch {
                            index,
                            stored: leaf.leaf_hash,
                            recomputed,
                        });
                    }
                    hashes.push(recomputed);
                }
                Err(e) => {
                    findings.push(AuditFinding::InvalidLeaf {
                        index,
                        reason: e.to_string(),
                    });
                    // Placeholder so later prefixes stay aligned.
                    hashes.push(leaf.leaf_hash);
                }
            }
        }

        let mut sth_audits = Vec::with_capacity(sths.len());
        for (i, sth) in sths.iter().enumerate() {
            let sth_index = i as u64;
            let tree_size = sth.body.tree_size;

            let root_ok = match usize::try_from(tree_size).ok().and_then(|n| hashes.get(..n)) {
                Some(prefix) => {
                    let computed = compute_root(prefix);
                    if computed != sth.body.root {
                        findings.push(AuditFinding::RootMismatch {
                            sth_index,
                            claimed: sth.body.root,
                            computed,
                        });
                    }
                    computed == sth.body.root
                }
                None => {
                    findings.push(AuditFinding::TreeSizeExceedsLeaves {
                        sth_index,
                        tree_size,
                        leaves: hashes.len() as u64,
                    });
                    false
                }
            };

            let chain_ok = match i.checked_sub(1).map(|p| &sths[p]) {
                Some(previous) => {
                    if previous.body.tree_size > tree_size {
                        findings.push(AuditFinding::TreeSizeRegressed {
                            sth_index,
                            previous: previous.body.tree_size,
                            current: tree_size,
                        });
                    }
                    verify_chain_link(sth, previous)
                }
                None => sth.body.prev_hash.is_none(),
            };
            if !chain_ok {
                findings.push(AuditFinding::BrokenChainLink { sth_index });
            }

            let (signatures_ok, valid_signatures) = match &self.roster {
                Some(roster) => {
                    let valid = sth
                        .body_hash()
                        .map(|h| roster.evaluate(&h, &sth.signatures).valid_count())
                        .unwrap_or(0);
                    let ok = sth.body.policy.is_met_by(valid);
                    if !ok {
                        findings.push(AuditFinding::InsufficientSignatures {
                            sth_index,
                            valid,
                            required: sth.body.policy.t,
                        });
                    }
                    (Some(ok), Some(valid))
                }
                None => (None, None),
            };

            sth_audits.push(SthAudit {
                index: sth_index,
                tree_size,
                issued_at: sth.body.issued_at,
                root_ok,
                chain_ok,
                signatures_ok,
                valid_signatures,
            });
        }

        let covered = sths.last().map_or(0, |s| s.body.tree_size);
        let pending_leaves = (leaves.len() as u64).saturating_sub(covered);
        if pending_leaves > self.max_pending_leaves {
            findings.push(AuditFinding::TooManyPendingLeaves {
                pending: pending_leaves,
                allowed: self.max_pending_leaves,
            });
        }

        AuditReport {
            leaf_count: leaves.len() as u64,
            sth_count: sths.len() as u64,
            pending_leaves,
            sths: sth_audits,
            findings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sth::append_sth;
    use nexo_crypto::{CosignAuthority, CosignerId, CosignerKey, SigningMode, ThresholdPolicy};

    fn authority() -> CosignAuthority {
        let keys = (0..3)
            .map(|i| CosignerKey::from_seed(CosignerId::indexed(i), &[i as u8 + 11; 32]))
            .collect();
        CosignAuthority::new(keys, ThresholdPolicy::default(), SigningMode::Threshold).unwrap()
    }

    fn record(i: u8) -> LeafRecord {
        LeafRecord::new(format!("did:key:z{i}"), vec![i; 32], 1_700_000_000 + i as i64).unwrap()
    }

    /// `n` leaves with one STH per append, the way the log builds them.
    fn build(n: u8, auth: &CosignAuthority) -> (Vec<LeafRecord>, Vec<SignedTreeHead>) {
        let mut leaves = Vec::new();
        let mut sths: Vec<SignedTreeHead> = Vec::new();
        for i in 1..=n {
            leaves.push(record(i));
            let hashes: Vec<_> = leaves.iter().map(|l| l.leaf_hash).collect();
            let sth = append_sth(&hashes, sths.last(), auth, 100 + i as i64).unwrap();
            sths.push(sth);
        }
        (leaves, sths)
    }

    #[test]
    fn clean_log_passes() {
        let auth = authority();
        let (leaves, sths) = build(5, &auth);
        let report = Auditor::new(Some(auth.roster().clone())).audit(&leaves, &sths);
        assert!(report.is_ok(), "{:?}", report.findings);
        assert_eq!(report.sth_count, 5);
        assert_eq!(report.pending_leaves, 0);
        assert!(report.sths.iter().all(|s| s.signatures_ok == Some(true)));
    }

    #[test]
    fn every_consecutive_link_verifies() {
        let auth = authority();
        let (_, sths) = build(6, &auth);
        for pair in sths.windows(2) {
            assert!(verify_chain_link(&pair[1], &pair[0]));
        }
    }

    #[test]
    fn signatures_skipped_without_roster() {
        let auth = authority();
        let (leaves, sths) = build(2, &auth);
        let report = Auditor::default().audit(&leaves, &sths);
        assert!(report.is_ok());
        assert!(report.sths.iter().all(|s| s.signatures_ok.is_none()));
    }

    #[test]
    fn audit_root_matches_and_mismatches() {
        let auth = authority();
        let (leaves, sths) = build(2, &auth);
        let ok = audit_root(&leaves, &sths[1]).unwrap();
        assert!(ok.matches);
        assert_eq!(ok.tree_size, 2);

        let short = audit_root(&leaves[..1], &sths[1]).unwrap();
        assert!(!short.matches);
        assert_eq!(short.sth_tree_size, 2);

        let mut tampered = leaves.clone();
        tampered[0].public_key[5] ^= 1;
        let bad = audit_root(&tampered, &sths[1]).unwrap();
        assert!(!bad.matches);
        assert_ne!(bad.computed_root, sths[1].body.root);
    }

    #[test]
    fn root_audit_wire_shape() {
        let auth = authority();
        let (leaves, sths) = build(1, &auth);
        let v = serde_json::to_value(audit_root(&leaves, &sths[0]).unwrap()).unwrap();
        assert_eq!(v["match"], true);
        assert_eq!(v["computed_root"], sths[0].body.root.to_base64());
    }

    #[test]
    fn tampered_public_key_reports_mismatches_everywhere() {
        let auth = authority();
        let (mut leaves, sths) = build(3, &auth);
        leaves[1].public_key[0] ^= 0xff;
        let report = Auditor::new(Some(auth.roster().clone())).audit(&leaves, &sths);
        assert!(report
            .findings
            .contains(&AuditFinding::LeafHashMismatch {
                index: 1,
                stored: leaves[1].leaf_hash,
                recomputed: leaves[1].recompute_hash().unwrap(),
            }));
        // STHs 1 and 2 cover the tampered leaf; STH 0 does not.
        assert!(report.sths[0].root_ok);
        assert!(!report.sths[1].root_ok);
        assert!(!report.sths[2].root_ok);
        // Chain and signatures are still evaluated.
        assert!(report.sths.iter().all(|s| s.chain_ok));
        assert!(report.sths.iter().all(|s| s.signatures_ok == Some(true)));
    }

    #[test]
    fn broken_link_detected() {
        let auth = authority();
        let (leaves, mut sths) = build(3, &auth);
        sths[1].body.issued_at += 1;
        let report = Auditor::default().audit(&leaves, &sths);
        assert_eq!(
            report.findings,
            vec![AuditFinding::BrokenChainLink { sth_index: 2 }]
        );
    }

    #[test]
    fn first_sth_with_prev_hash_is_broken() {
        let auth = authority();
        let (leaves, mut sths) = build(1, &auth);
        sths[0].body.prev_hash = Some(Digest32::ZERO);
        let report = Auditor::default().audit(&leaves, &sths);
        assert!(report
            .findings
            .contains(&AuditFinding::BrokenChainLink { sth_index: 0 }));
    }

    #[test]
    fn one_pending_leaf_tolerated_two_not() {
        let auth = authority();
        let (mut leaves, sths) = build(2, &auth);
        leaves.push(record(50));
        let report = Auditor::default().audit(&leaves, &sths);
        assert!(report.is_ok());
        assert_eq!(report.pending_leaves, 1);

        leaves.push(record(51));
        let report = Auditor::default().audit(&leaves, &sths);
        assert_eq!(
            report.findings,
            vec![AuditFinding::TooManyPendingLeaves {
                pending: 2,
                allowed: 1
            }]
        );
        assert!(Auditor::default()
            .with_max_pending_leaves(2)
            .audit(&leaves, &sths)
            .is_ok());
    }

    #[test]
    fn sth_beyond_leaves_reported() {
        let auth = authority();
        let (leaves, sths) = build(3, &auth);
        let report = Auditor::default().audit(&leaves[..2], &sths);
        assert!(report.findings.contains(&AuditFinding::TreeSizeExceedsLeaves {
            sth_index: 2,
            tree_size: 3,
            leaves: 2
        }));
    }

    #[test]
    fn undersigned_sth_reported() {
        let auth = authority();
        let (leaves, mut sths) = build(2, &auth);
        sths[1].signatures.truncate(1);
        let report = Auditor::new(Some(auth.roster().clone())).audit(&leaves, &sths);
        assert_eq!(
            report.findings,
            vec![AuditFinding::InsufficientSignatures {
                sth_index: 1,
                valid: 1,
                required: 2
            }]
        );
    }

    #[test]
    fn invalid_leaf_reported() {
        let auth = authority();
        let (mut leaves, sths) = build(1, &auth);
        leaves[0].public_key.pop();
        let report = Auditor::default().audit(&leaves, &sths);
        assert!(matches!(
            report.findings[0],
            AuditFinding::InvalidLeaf { index: 0, .. }
        ));
    }

    #[test]
    fn invalid_leaf_does_not_cascade_into_later_roots() {
        let auth = authority();
        let (mut leaves, sths) = build(3, &auth);
        leaves[0].public_key.pop();
        let report = Auditor::new(Some(auth.roster().clone())).audit(&leaves, &sths);
        assert!(!report.is_ok());
        assert_eq!(report.findings.len(), 1);
        assert!(matches!(
            report.findings[0],
            AuditFinding::InvalidLeaf { index: 0, .. }
        ));
    }

    #[test]
    fn finding_serializes_with_kind_tag() {
        let v = serde_json::to_value(AuditFinding::BrokenChainLink { sth_index: 4 }).unwrap();
        assert_eq!(v["kind"], "broken_chain_link");
        assert_eq!(v["sth_index"], 4);
    }
}
