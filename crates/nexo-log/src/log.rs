//! # Transparency Log
//!
//! [`TransparencyLog`] owns the stores and the cosign authority and runs the
//! append sequence:
//!
//! ```text
//! validate -> append leaf -> read all leaves -> read previous STH
//!          -> build + sign STH -> append STH
//! ```
//!
//! At most one append sequence runs at a time; a `parking_lot::Mutex` is held
//! from the leaf append through the STH append. Reads do not take the append
//! lock. If an append fails after the leaf was stored, the next successful
//! append commits that leaf too.

use std::sync::Arc;

use nexo_core::{Clock, Digest32};
use nexo_crypto::{CosignAuthority, CosignerRoster, InclusionProof, MerkleTree, ThresholdPolicy};
use parking_lot::Mutex;
use serde::Serialize;

use crate::audit::{self, RootAudit};
use crate::error::LogError;
use crate::leaf::LeafRecord;
use crate::sth::{append_sth, SignedTreeHead};
use crate::store::{LeafStore, SthStore};

/// Behavior switches for the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Refuse to publish an STH with fewer than `t` signatures.
    pub reject_undersigned: bool,
}

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationReceipt {
    /// Tree size after the append.
    pub tree_size: u64,
    /// Hash of the new leaf.
    pub leaf_hash: Digest32,
    /// The STH published for this append.
    pub sth: SignedTreeHead,
}

/// An inclusion proof bound to the STH it verifies against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeafProof {
    /// Leaf hash being proven.
    pub leaf_hash: Digest32,
    /// Root of the STH the proof targets.
    pub root: Digest32,
    /// Sibling path and verifier index.
    pub proof: InclusionProof,
}

/// The append-only identity log.
pub struct TransparencyLog {
    leaves: Arc<dyn LeafStore>,
    sths: Arc<dyn SthStore>,
    authority: Arc<CosignAuthority>,
    clock: Arc<dyn Clock>,
    config: LogConfig,
    append_lock: Mutex<()>,
}

impl std::fmt::Debug for TransparencyLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransparencyLog")
            .field("policy", &self.authority.policy())
            .field("mode", &self.authority.mode())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TransparencyLog {
    /// Assemble a log from its collaborators.
    pub fn new(
        leaves: Arc<dyn LeafStore>,
        sths: Arc<dyn SthStore>,
        authority: Arc<CosignAuthority>,
        clock: Arc<dyn Clock>,
        config: LogConfig,
    ) -> Self {
        Self {
            leaves,
            sths,
            authority,
            clock,
            config,
            append_lock: Mutex::new(()),
        }
    }

    /// Register an identity: append its leaf, then publish a new STH.
    ///
    /// Input is validated before anything is written. If strict mode is on
    /// and the STH is under-signed, the leaf stays appended and the STH is
    /// not; the call fails with [`LogError::InsufficientSignatures`].
    pub fn register_leaf(
        &self,
        identifier: &str,
        public_key: Vec<u8>,
        registered_at: i64,
    ) -> Result<RegistrationReceipt, LogError> {
        let record = LeafRecord::new(identifier, public_key, registered_at)?;
        let leaf_hash = record.leaf_hash;

        let _guard = self.append_lock.lock();

        // Read both stores first so an unreadable store refuses the write.
        let mut hashes: Vec<Digest32> = self
            .leaves
            .list_all()?
            .into_iter()
            .map(|l| l.leaf_hash)
            .collect();
        let previous = self.sths.latest()?;

        self.leaves.append(record)?;
        hashes.push(leaf_hash);
        let sth = append_sth(
            &hashes,
            previous.as_ref(),
            &self.authority,
            self.clock.now_unix(),
        )?;

        let policy = self.authority.policy();
        if sth.signatures.len() < policy.t {
            tracing::warn!(
                tree_size = sth.tree_size(),
                signatures = sth.signatures.len(),
                required = policy.t,
                "STH is under-signed"
            );
            if self.config.reject_undersigned {
                return Err(LogError::InsufficientSignatures {
                    tree_size: sth.tree_size(),
                    got: sth.signatures.len(),
                    required: policy.t,
                });
            }
        }

        self.sths.append(sth.clone())?;
        tracing::info!(
            tree_size = sth.tree_size(),
            leaf_hash = %leaf_hash,
            "registered identity"
        );

        Ok(RegistrationReceipt {
            tree_size: sth.tree_size(),
            leaf_hash,
            sth,
        })
    }

    /// The most recent STH, if any.
    pub fn latest_sth(&self) -> Result<Option<SignedTreeHead>, LogError> {
        Ok(self.sths.latest()?)
    }

    /// Up to `limit` STHs, newest first.
    pub fn sth_chain(&self, limit: usize) -> Result<Vec<SignedTreeHead>, LogError> {
        Ok(self.sths.list_recent(limit)?)
    }

    /// Inclusion proof for leaf `leaf_index` against the latest STH.
    pub fn inclusion_proof(&self, leaf_index: u64) -> Result<LeafProof, LogError> {
        let sth = self.sths.latest()?.ok_or(LogError::NoSth)?;
        let covered = usize::try_from(sth.tree_size()).unwrap_or(usize::MAX);
        let hashes: Vec<Digest32> = self
            .leaves
            .list_all()?
            .into_iter()
            .take(covered)
            .map(|l| l.leaf_hash)
            .collect();
        let tree = MerkleTree::new(hashes);
        let proof = tree.inclusion_proof(leaf_index)?;
        let leaf_hash = tree.leaves()[proof.leaf_index as usize];
        Ok(LeafProof {
            leaf_hash,
            root: sth.body.root,
            proof,
        })
    }

    /// Recompute the root of `raw_leaves` and compare it with `sth`, or with
    /// the latest STH when `sth` is `None`.
    pub fn audit_root(
        &self,
        raw_leaves: &[LeafRecord],
        sth: Option<&SignedTreeHead>,
    ) -> Result<RootAudit, LogError> {
        let latest;
        let target = match sth {
            Some(s) => s,
            None => {
                latest = self.sths.latest()?.ok_or(LogError::NoSth)?;
                &latest
            }
        };
        Ok(audit::audit_root(raw_leaves, target)?)
    }

    /// Every stored leaf, in append order.
    pub fn leaves(&self) -> Result<Vec<LeafRecord>, LogError> {
        Ok(self.leaves.list_all()?)
    }

    /// Every STH, oldest first.
    pub fn sths(&self) -> Result<Vec<SignedTreeHead>, LogError> {
        Ok(self.sths.list_all()?)
    }

    /// Number of registered leaves.
    pub fn leaf_count(&self) -> Result<usize, LogError> {
        Ok(self.leaves.len()?)
    }

    /// Number of published STHs.
    pub fn sth_count(&self) -> Result<usize, LogError> {
        Ok(self.sths.len()?)
    }

    /// Public keys of the cosigners.
    pub fn roster(&self) -> &CosignerRoster {
        self.authority.roster()
    }

    /// The signing policy.
    pub fn policy(&self) -> ThresholdPolicy {
        self.authority.policy()
    }

    /// The log's behavior switches.
    pub fn config(&self) -> LogConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Auditor;
    use crate::store::{MemoryLeafStore, MemorySthStore};
    use nexo_core::FixedClock;
    use nexo_crypto::{CosignerId, CosignerKey, SigningMode};

    fn log_with(keys: Vec<CosignerKey>, config: LogConfig) -> TransparencyLog {
        let authority =
            CosignAuthority::new(keys, ThresholdPolicy::default(), SigningMode::Threshold).unwrap();
        TransparencyLog::new(
            Arc::new(MemoryLeafStore::new()),
            Arc::new(MemorySthStore::new()),
            Arc::new(authority),
            Arc::new(FixedClock::new(1_700_000_100)),
            config,
        )
    }

    fn keys() -> Vec<CosignerKey> {
        (0..3)
            .map(|i| CosignerKey::generate(CosignerId::indexed(i)))
            .collect()
    }

    fn starved_keys() -> Vec<CosignerKey> {
        keys()
            .into_iter()
            .enumerate()
            .map(|(i, k)| {
                if i == 0 {
                    k
                } else {
                    CosignerKey::verify_only(k.id().clone(), *k.public_key())
                }
            })
            .collect()
    }

    #[test]
    fn register_publishes_sth() {
        let log = log_with(keys(), LogConfig::default());
        let receipt = log.register_leaf("did:key:zA", vec![1; 32], 1_700_000_000).unwrap();
        assert_eq!(receipt.tree_size, 1);
        assert_eq!(receipt.sth.body.issued_at, 1_700_000_100);
        assert_eq!(log.latest_sth().unwrap(), Some(receipt.sth));
        assert_eq!(log.leaf_count().unwrap(), 1);
        assert_eq!(log.sth_count().unwrap(), 1);
    }

    #[test]
    fn invalid_input_writes_nothing() {
        let log = log_with(keys(), LogConfig::default());
        assert!(matches!(
            log.register_leaf("did:key:zA", vec![1; 31], 1),
            Err(LogError::Validation(_))
        ));
        assert_eq!(log.leaf_count().unwrap(), 0);
        assert_eq!(log.sth_count().unwrap(), 0);
    }

    #[test]
    fn undersigned_is_published_by_default() {
        let log = log_with(starved_keys(), LogConfig::default());
        let receipt = log.register_leaf("did:key:zA", vec![1; 32], 1).unwrap();
        assert_eq!(receipt.sth.signatures.len(), 1);
        assert_eq!(log.sth_count().unwrap(), 1);
    }

    #[test]
    fn undersigned_rejected_in_strict_mode() {
        let log = log_with(
            starved_keys(),
            LogConfig {
                reject_undersigned: true,
            },
        );
        let err = log.register_leaf("did:key:zA", vec![1; 32], 1).unwrap_err();
        assert!(matches!(
            err,
            LogError::InsufficientSignatures {
                tree_size: 1,
                got: 1,
                required: 2
            }
        ));
        assert_eq!(log.leaf_count().unwrap(), 1);
        assert_eq!(log.sth_count().unwrap(), 0);
    }

    #[test]
    fn chain_newest_first() {
        let log = log_with(keys(), LogConfig::default());
        for i in 1..=4 {
            log.register_leaf(&format!("did:key:z{i}"), vec![i; 32], i as i64)
                .unwrap();
        }
        let chain = log.sth_chain(3).unwrap();
        let sizes: Vec<_> = chain.iter().map(SignedTreeHead::tree_size).collect();
        assert_eq!(sizes, vec![4, 3, 2]);
    }

    #[test]
    fn proofs_verify_against_latest_root() {
        let log = log_with(keys(), LogConfig::default());
        for i in 1..=7 {
            log.register_leaf(&format!("did:key:z{i}"), vec![i; 32], i as i64)
                .unwrap();
        }
        let root = log.latest_sth().unwrap().unwrap().body.root;
        for i in 0..7 {
            let p = log.inclusion_proof(i).unwrap();
            assert_eq!(p.root, root);
            assert!(p.proof.verify(&p.leaf_hash, &root));
        }
        assert!(matches!(log.inclusion_proof(7), Err(LogError::Merkle(_))));
    }

    #[test]
    fn proof_before_any_sth() {
        let log = log_with(keys(), LogConfig::default());
        assert!(matches!(log.inclusion_proof(0), Err(LogError::NoSth)));
    }

    #[test]
    fn audit_root_defaults_to_latest() {
        let log = log_with(keys(), LogConfig::default());
        log.register_leaf("did:key:zA", vec![1; 32], 1).unwrap();
        log.register_leaf("did:key:zB", vec![2; 32], 2).unwrap();
        let leaves = log.leaves().unwrap();
        assert!(log.audit_root(&leaves, None).unwrap().matches);

        let first = log.sths().unwrap().remove(0);
        assert!(!log.audit_root(&leaves, Some(&first)).unwrap().matches);
        assert!(log.audit_root(&leaves[..1], Some(&first)).unwrap().matches);
    }

    #[test]
    fn concurrent_registrations_form_a_valid_chain() {
        let log = Arc::new(log_with(keys(), LogConfig::default()));
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for j in 0..5u8 {
                        let id = format!("did:key:z{i}-{j}");
                        log.register_leaf(&id, vec![i * 5 + j; 32], 1 + j as i64)
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let leaves = log.leaves().unwrap();
        let sths = log.sths().unwrap();
        assert_eq!(leaves.len(), 40);
        assert_eq!(sths.len(), 40);
        for (i, sth) in sths.iter().enumerate() {
            assert_eq!(sth.tree_size(), i as u64 + 1);
        }
        let report = Auditor::new(Some(log.roster().clone())).audit(&leaves, &sths);
        assert!(report.is_ok(), "{:?}", report.findings);
    }

    #[test]
    fn torn_leaf_line_does_not_block_later_registrations() {
        use std::io::Write as _;

        use crate::store::{JsonlLeafStore, JsonlSthStore};

        let dir = tempfile::tempdir().unwrap();
        let leaf_store = Arc::new(JsonlLeafStore::open(dir.path()).unwrap());
        let authority =
            CosignAuthority::new(keys(), ThresholdPolicy::default(), SigningMode::Threshold).unwrap();
        let log = TransparencyLog::new(
            leaf_store.clone(),
            Arc::new(JsonlSthStore::open(dir.path()).unwrap()),
            Arc::new(authority),
            Arc::new(FixedClock::new(1_700_000_100)),
            LogConfig::default(),
        );

        log.register_leaf("did:key:zA", vec![1; 32], 1).unwrap();
        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .open(leaf_store.path())
            .unwrap();
        write!(f, "{{\"id\":\"did:key:b\",\"public_k").unwrap();
        drop(f);

        assert_eq!(log.leaf_count().unwrap(), 1);
        let receipt = log.register_leaf("did:key:zB", vec![2; 32], 2).unwrap();
        assert_eq!(receipt.tree_size, 2);
        assert_eq!(log.leaf_count().unwrap(), 2);

        let leaves = log.leaves().unwrap();
        let sths = log.sths().unwrap();
        let report = Auditor::new(Some(log.roster().clone())).audit(&leaves, &sths);
        assert!(report.is_ok(), "{:?}", report.findings);
    }
}
