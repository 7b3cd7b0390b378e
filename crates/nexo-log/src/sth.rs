//! # Signed Tree Heads
//!
//! An STH commits to the Merkle root of the first `tree_size` leaves and
//! links to its predecessor:
//!
//! ```text
//! body     = { tree_size, root, prev_hash, policy: { t, n }, timestamp }
//! sth_hash = SHA256(JCS(body))
//! ```
//!
//! `prev_hash` of STH `k` is the body hash of STH `k-1`, or `""` for the first
//! head. Cosigners sign `sth_hash`. Signatures are not part of the body, so
//! attaching them never changes the link.

use nexo_core::digest::optional_base64;
use nexo_core::{sha256_digest, CanonicalBytes, CanonicalizationError, Digest32};
use nexo_crypto::{compute_root, CosignAuthority, CosignerRoster, CosignerSignature, ThresholdPolicy};
use serde::{Deserialize, Serialize};

/// The signed portion of a tree head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SthBody {
    /// Number of leaves committed.
    pub tree_size: u64,
    /// Merkle root over those leaves.
    pub root: Digest32,
    /// Body hash of the previous STH; `None` for the first.
    #[serde(with = "optional_base64")]
    pub prev_hash: Option<Digest32>,
    /// Policy in force when the head was signed.
    pub policy: ThresholdPolicy,
    /// Issue time, Unix seconds.
    #[serde(rename = "timestamp")]
    pub issued_at: i64,
}

impl SthBody {
    /// `SHA256(JCS(body))`.
    pub fn hash(&self) -> Result<Digest32, CanonicalizationError> {
        Ok(sha256_digest(&CanonicalBytes::new(self)?))
    }
}

/// A tree head with its cosigner signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTreeHead {
    /// Signed fields, flattened into the same JSON object.
    #[serde(flatten)]
    pub body: SthBody,
    /// Signatures in signing order.
    pub signatures: Vec<CosignerSignature>,
}

impl SignedTreeHead {
    /// Hash of the body without signatures. The next STH's `prev_hash`.
    pub fn body_hash(&self) -> Result<Digest32, CanonicalizationError> {
        self.body.hash()
    }

    /// Number of leaves committed.
    pub fn tree_size(&self) -> u64 {
        self.body.tree_size
    }

    /// Whether the head carries at least `policy.t` valid signatures from
    /// distinct roster members.
    pub fn verify_signatures(&self, roster: &CosignerRoster) -> Result<bool, CanonicalizationError> {
        let hash = self.body_hash()?;
        let ThresholdPolicy { t, n } = self.body.policy;
        Ok(roster.verify_threshold(&hash, &self.signatures, t, n))
    }

    /// Whether `self` correctly follows `previous` in the chain.
    pub fn links_to(&self, previous: &SignedTreeHead) -> Result<bool, CanonicalizationError> {
        Ok(self.body.prev_hash == Some(previous.body_hash()?))
    }
}

/// Build and sign the next STH over `leaf_hashes`.
///
/// The result may carry fewer than `policy.t` signatures if cosigners were
/// unavailable. The caller decides whether to publish it.
pub fn append_sth(
    leaf_hashes: &[Digest32],
    previous: Option<&SignedTreeHead>,
    authority: &CosignAuthority,
    issued_at: i64,
) -> Result<SignedTreeHead, CanonicalizationError> {
    let prev_hash = previous.map(SignedTreeHead::body_hash).transpose()?;
    let body = SthBody {
        tree_size: leaf_hashes.len() as u64,
        root: compute_root(leaf_hashes),
        prev_hash,
        policy: authority.policy(),
        issued_at,
    };
    let sth_hash = body.hash()?;
    let signatures = authority.sign(&sth_hash);
    Ok(SignedTreeHead { body, signatures })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexo_core::sha256_concat;
    use nexo_crypto::{CosignerId, CosignerKey, SigningMode};

    fn authority() -> CosignAuthority {
        let keys = (0..3)
            .map(|i| CosignerKey::from_seed(CosignerId::indexed(i), &[i as u8 + 1; 32]))
            .collect();
        CosignAuthority::new(keys, ThresholdPolicy::default(), SigningMode::Threshold).unwrap()
    }

    fn leaf(i: u8) -> Digest32 {
        sha256_concat(&[[i].as_slice()])
    }

    #[test]
    fn first_sth_has_empty_prev_hash() {
        let sth = append_sth(&[leaf(1)], None, &authority(), 1_700_000_000).unwrap();
        let v = serde_json::to_value(&sth).unwrap();
        assert_eq!(v["prev_hash"], "");
        assert_eq!(v["tree_size"], 1);
        assert_eq!(v["root"], leaf(1).to_base64());
        assert_eq!(v["policy"]["t"], 2);
        assert_eq!(v["timestamp"], 1_700_000_000);
        assert_eq!(v["signatures"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn canonical_body_bytes() {
        let body = SthBody {
            tree_size: 1,
            root: Digest32::ZERO,
            prev_hash: None,
            policy: ThresholdPolicy::default(),
            issued_at: 1_700_000_000,
        };
        let cb = CanonicalBytes::new(&body).unwrap();
        let expected = format!(
            r#"{{"policy":{{"n":3,"t":2}},"prev_hash":"","root":"{}","timestamp":1700000000,"tree_size":1}}"#,
            Digest32::ZERO.to_base64()
        );
        assert_eq!(std::str::from_utf8(cb.as_bytes()).unwrap(), expected);
    }

    #[test]
    fn chain_links() {
        let auth = authority();
        let first = append_sth(&[leaf(1)], None, &auth, 100).unwrap();
        let second = append_sth(&[leaf(1), leaf(2)], Some(&first), &auth, 101).unwrap();
        assert_eq!(second.body.prev_hash, Some(first.body_hash().unwrap()));
        assert!(second.links_to(&first).unwrap());
        assert!(!first.links_to(&second).unwrap());
    }

    #[test]
    fn signatures_do_not_affect_body_hash() {
        let auth = authority();
        let mut sth = append_sth(&[leaf(1)], None, &auth, 100).unwrap();
        let before = sth.body_hash().unwrap();
        sth.signatures.clear();
        assert_eq!(sth.body_hash().unwrap(), before);
    }

    #[test]
    fn signatures_verify_against_roster() {
        let auth = authority();
        let sth = append_sth(&[leaf(1)], None, &auth, 100).unwrap();
        assert!(sth.verify_signatures(auth.roster()).unwrap());

        let mut tampered = sth.clone();
        tampered.body.tree_size = 2;
        assert!(!tampered.verify_signatures(auth.roster()).unwrap());
    }

    #[test]
    fn json_round_trip_preserves_hash() {
        let auth = authority();
        let first = append_sth(&[leaf(1)], None, &auth, 100).unwrap();
        let second = append_sth(&[leaf(1), leaf(2)], Some(&first), &auth, 101).unwrap();
        let line = serde_json::to_string(&second).unwrap();
        let back: SignedTreeHead = serde_json::from_str(&line).unwrap();
        assert_eq!(back, second);
        assert_eq!(back.body_hash().unwrap(), second.body_hash().unwrap());
    }
}
