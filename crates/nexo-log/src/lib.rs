//! # nexo-log: Transparency-Log Engine
//!
//! Ties the Merkle engine and the cosign authority into an append-only log
//! of identity registrations.
//!
//! - [`leaf`]: the registration record and the leaf hasher.
//! - [`sth`]: signed tree heads and the hash-linked chain.
//! - [`store`]: the append-only leaf and STH stores, in memory or JSONL.
//! - [`log`]: [`TransparencyLog`], which serializes appends.
//! - [`audit`]: the read-only [`Auditor`].

pub mod audit;
pub mod error;
pub mod leaf;
pub mod log;
pub mod sth;
pub mod store;

pub use audit::{
    audit_root, recompute_root_from_leaves, verify_chain_link, verify_signature_threshold,
    AuditFinding, AuditReport, Auditor, RootAudit, SthAudit,
};
pub use error::{LogError, StoreError};
pub use leaf::{compute_leaf_hash, LeafRecord};
pub use log::{LeafProof, LogConfig, RegistrationReceipt, TransparencyLog};
pub use sth::{append_sth, SignedTreeHead, SthBody};
pub use store::{
    JsonlLeafStore, JsonlSthStore, LeafStore, MemoryLeafStore, MemorySthStore, SthStore,
};
