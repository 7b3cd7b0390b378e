//! # Cosign Authority
//!
//! A fixed set of `n` long-lived Ed25519 cosigner keys and the `t`-of-`n`
//! threshold policy that decides whether a tree head is authoritative.
//!
//! The authority is split in two halves:
//!
//! - [`CosignAuthority`] owns the key material and produces signatures. It is
//!   constructed once at startup and shared read-only behind an `Arc`.
//! - [`CosignerRoster`] holds only ids and public keys. Any third party can
//!   build one from published public keys and verify thresholds with it.
//!
//! ## Threshold Verification
//!
//! A signature counts toward the threshold only if the claimed cosigner is in
//! the roster, the signature verifies under that cosigner's exact public key,
//! and that cosigner has not already been counted. Unknown ids, duplicates,
//! and bad signatures are excluded from the count and recorded in the
//! [`ThresholdTally`].

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use nexo_core::{Digest32, ValidationError};
use serde::{Deserialize, Serialize};

use crate::ed25519::{self, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use crate::error::CosignError;

/// Default number of required signatures.
pub const DEFAULT_THRESHOLD: usize = 2;
/// Default number of cosigners.
pub const DEFAULT_COSIGNERS: usize = 3;

// ---------------------------------------------------------------------------
// Identifiers and policy
// ---------------------------------------------------------------------------

/// Stable cosigner identifier, `cosigner_0 .. cosigner_{n-1}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CosignerId(String);

impl CosignerId {
    /// Wrap an arbitrary id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The conventional id for the cosigner at position `index`.
    pub fn indexed(index: usize) -> Self {
        Self(format!("cosigner_{index}"))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CosignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `t`-of-`n` signature policy. Serialized as `{"t": .., "n": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    /// Signatures required.
    pub t: usize,
    /// Total cosigners.
    pub n: usize,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            t: DEFAULT_THRESHOLD,
            n: DEFAULT_COSIGNERS,
        }
    }
}

impl ThresholdPolicy {
    /// Build a policy, rejecting `t == 0` and `t > n`.
    pub fn new(t: usize, n: usize) -> Result<Self, ValidationError> {
        let policy = Self { t, n };
        policy.validate()?;
        Ok(policy)
    }

    /// Check `1 <= t <= n`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.t == 0 || self.t > self.n {
            return Err(ValidationError::InvalidPolicy {
                t: self.t,
                n: self.n,
            });
        }
        Ok(())
    }

    /// Whether `count` valid signatures satisfy this policy.
    pub fn is_met_by(&self, count: usize) -> bool {
        self.validate().is_ok() && count >= self.t
    }
}

/// One cosigner's signature over an STH hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosignerSignature {
    /// Claimed signer.
    #[serde(rename = "cosigner")]
    pub cosigner_id: CosignerId,
    /// Ed25519 signature over the raw 32-byte STH hash.
    #[serde(rename = "sig")]
    pub signature: Ed25519Signature,
}

/// How many signatures [`CosignAuthority::sign`] collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningMode {
    /// Stop once `t` signatures are collected.
    #[default]
    Threshold,
    /// Collect every obtainable signature.
    All,
}

impl FromStr for SigningMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "threshold" => Ok(Self::Threshold),
            "all" => Ok(Self::All),
            other => Err(format!(
                "unknown signing mode {other:?} (expected \"threshold\" or \"all\")"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Roster (verification half)
// ---------------------------------------------------------------------------

/// A published cosigner public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosignerPublic {
    /// Cosigner id.
    pub id: CosignerId,
    /// Ed25519 public key, base64 on the wire.
    pub public_key: Ed25519PublicKey,
}

/// Why a presented signature did not count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The claimed cosigner is not in the roster.
    UnknownCosigner,
    /// The cosigner was already counted.
    Duplicate,
    /// The signature does not verify under the cosigner's key.
    BadSignature,
}

/// Outcome of checking a signature list against a roster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdTally {
    /// Distinct cosigners whose signatures verified, in presentation order.
    pub valid: Vec<CosignerId>,
    /// Signatures that were excluded, with the reason.
    pub rejected: Vec<(CosignerId, RejectReason)>,
}

impl ThresholdTally {
    /// Number of distinct valid signers.
    pub fn valid_count(&self) -> usize {
        self.valid.len()
    }
}

/// The verification-only view of the cosigner set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CosignerRoster {
    cosigners: Vec<CosignerPublic>,
}

impl CosignerRoster {
    /// Build a roster. Ids must be unique.
    pub fn new(cosigners: Vec<CosignerPublic>) -> Result<Self, CosignError> {
        let mut seen = HashSet::new();
        for c in &cosigners {
            if !seen.insert(c.id.clone()) {
                return Err(CosignError::DuplicateId(c.id.to_string()));
            }
        }
        Ok(Self { cosigners })
    }

    /// Cosigners in roster order.
    pub fn cosigners(&self) -> &[CosignerPublic] {
        &self.cosigners
    }

    /// Number of cosigners.
    pub fn len(&self) -> usize {
        self.cosigners.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.cosigners.is_empty()
    }

    /// Look up a cosigner's public key.
    pub fn public_key(&self, id: &CosignerId) -> Option<&Ed25519PublicKey> {
        self.cosigners
            .iter()
            .find(|c| &c.id == id)
            .map(|c| &c.public_key)
    }

    /// Check every signature and sort it into valid or rejected.
    pub fn evaluate(&self, sth_hash: &Digest32, signatures: &[CosignerSignature]) -> ThresholdTally {
        let mut tally = ThresholdTally::default();
        let mut counted = HashSet::new();

        for sig in signatures {
            let id = &sig.cosigner_id;
            let Some(pk) = self.public_key(id) else {
                tally.rejected.push((id.clone(), RejectReason::UnknownCosigner));
                continue;
            };
            if counted.contains(id) {
                tally.rejected.push((id.clone(), RejectReason::Duplicate));
                continue;
            }
            if ed25519::verify(sth_hash, &sig.signature, pk).is_err() {
                tally.rejected.push((id.clone(), RejectReason::BadSignature));
                continue;
            }
            counted.insert(id.clone());
            tally.valid.push(id.clone());
        }
        tally
    }

    /// True iff at least `t` distinct roster members produced a valid
    /// signature over `sth_hash`. An unsatisfiable policy never verifies.
    pub fn verify_threshold(
        &self,
        sth_hash: &Digest32,
        signatures: &[CosignerSignature],
        t: usize,
        n: usize,
    ) -> bool {
        let policy = ThresholdPolicy { t, n };
        policy.is_met_by(self.evaluate(sth_hash, signatures).valid_count())
    }
}

// ---------------------------------------------------------------------------
// Keys and authority (signing half)
// ---------------------------------------------------------------------------

/// A cosigner's key material. The signing half may be absent, in which case
/// the cosigner is skipped when signing.
pub struct CosignerKey {
    id: CosignerId,
    public_key: Ed25519PublicKey,
    keypair: Option<Ed25519KeyPair>,
}

impl CosignerKey {
    /// Derive the key from a 32-byte private seed.
    pub fn from_seed(id: CosignerId, seed: &[u8; 32]) -> Self {
        let keypair = Ed25519KeyPair::from_seed(seed);
        Self {
            id,
            public_key: keypair.public_key(),
            keypair: Some(keypair),
        }
    }

    /// Generate a fresh random key.
    pub fn generate(id: CosignerId) -> Self {
        let keypair = Ed25519KeyPair::generate();
        Self {
            id,
            public_key: keypair.public_key(),
            keypair: Some(keypair),
        }
    }

    /// A key whose signing half is unavailable.
    pub fn verify_only(id: CosignerId, public_key: Ed25519PublicKey) -> Self {
        Self {
            id,
            public_key,
            keypair: None,
        }
    }

    /// Cosigner id.
    pub fn id(&self) -> &CosignerId {
        &self.id
    }

    /// Public key.
    pub fn public_key(&self) -> &Ed25519PublicKey {
        &self.public_key
    }

    /// The private seed, if the signing half is present.
    pub fn seed(&self) -> Option<[u8; 32]> {
        self.keypair.as_ref().map(Ed25519KeyPair::seed)
    }

    /// Whether this key can sign.
    pub fn can_sign(&self) -> bool {
        self.keypair.is_some()
    }

    /// The published half.
    pub fn to_public(&self) -> CosignerPublic {
        CosignerPublic {
            id: self.id.clone(),
            public_key: self.public_key,
        }
    }
}

impl fmt::Debug for CosignerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CosignerKey")
            .field("id", &self.id)
            .field("public_key", &self.public_key)
            .field("can_sign", &self.can_sign())
            .finish()
    }
}

/// Holds the `n` cosigner keys and signs STH hashes under the policy.
#[derive(Debug)]
pub struct CosignAuthority {
    keys: Vec<CosignerKey>,
    policy: ThresholdPolicy,
    mode: SigningMode,
    roster: CosignerRoster,
}

impl CosignAuthority {
    /// Build an authority. Requires exactly `policy.n` keys with unique ids
    /// and a satisfiable policy.
    pub fn new(
        keys: Vec<CosignerKey>,
        policy: ThresholdPolicy,
        mode: SigningMode,
    ) -> Result<Self, CosignError> {
        policy.validate()?;
        if keys.len() != policy.n {
            return Err(CosignError::KeyCount {
                expected: policy.n,
                actual: keys.len(),
            });
        }
        let roster = CosignerRoster::new(keys.iter().map(CosignerKey::to_public).collect())?;
        Ok(Self {
            keys,
            policy,
            mode,
            roster,
        })
    }

    /// An authority with `policy.n` freshly generated keys.
    pub fn generate(policy: ThresholdPolicy, mode: SigningMode) -> Result<Self, CosignError> {
        let keys = (0..policy.n)
            .map(|i| CosignerKey::generate(CosignerId::indexed(i)))
            .collect();
        Self::new(keys, policy, mode)
    }

    /// Sign `sth_hash` with cosigners in fixed order.
    ///
    /// Cosigners without a signing key are skipped. In
    /// [`SigningMode::Threshold`] signing stops once `t` signatures exist.
    /// The result may hold fewer than `t` signatures; callers decide whether
    /// such a head is publishable.
    pub fn sign(&self, sth_hash: &Digest32) -> Vec<CosignerSignature> {
        let mut signatures = Vec::with_capacity(self.policy.t);
        for key in &self.keys {
            if self.mode == SigningMode::Threshold && signatures.len() >= self.policy.t {
                break;
            }
            match &key.keypair {
                Some(kp) => signatures.push(CosignerSignature {
                    cosigner_id: key.id.clone(),
                    signature: kp.sign(sth_hash),
                }),
                None => {
                    tracing::warn!(cosigner = %key.id, "signing key unavailable; skipping cosigner");
                }
            }
        }
        signatures
    }

    /// Verify `signatures` against this authority's roster and policy.
    pub fn verify_threshold(&self, sth_hash: &Digest32, signatures: &[CosignerSignature]) -> bool {
        self.roster
            .verify_threshold(sth_hash, signatures, self.policy.t, self.policy.n)
    }

    /// The verification half.
    pub fn roster(&self) -> &CosignerRoster {
        &self.roster
    }

    /// The signing policy.
    pub fn policy(&self) -> ThresholdPolicy {
        self.policy
    }

    /// The signing mode.
    pub fn mode(&self) -> SigningMode {
        self.mode
    }

    /// Keys in signing order.
    pub fn keys(&self) -> &[CosignerKey] {
        &self.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexo_core::sha256_concat;

    fn sth_hash() -> Digest32 {
        sha256_concat(&[b"sth body".as_slice()])
    }

    fn seeded_keys(n: usize) -> Vec<CosignerKey> {
        (0..n)
            .map(|i| CosignerKey::from_seed(CosignerId::indexed(i), &[i as u8 + 1; 32]))
            .collect()
    }

    fn authority(mode: SigningMode) -> CosignAuthority {
        CosignAuthority::new(seeded_keys(3), ThresholdPolicy::default(), mode).unwrap()
    }

    #[test]
    fn test_policy_validation() {
        assert!(ThresholdPolicy::new(2, 3).is_ok());
        assert!(ThresholdPolicy::new(3, 3).is_ok());
        assert_eq!(
            ThresholdPolicy::new(0, 3),
            Err(ValidationError::InvalidPolicy { t: 0, n: 3 })
        );
        assert!(ThresholdPolicy::new(4, 3).is_err());
    }

    #[test]
    fn test_policy_serde_shape() {
        let json = serde_json::to_string(&ThresholdPolicy::default()).unwrap();
        assert_eq!(json, r#"{"t":2,"n":3}"#);
    }

    #[test]
    fn test_signature_wire_names() {
        let auth = authority(SigningMode::Threshold);
        let sigs = auth.sign(&sth_hash());
        let v = serde_json::to_value(&sigs[0]).unwrap();
        assert_eq!(v["cosigner"], "cosigner_0");
        assert!(v["sig"].is_string());
    }

    #[test]
    fn test_threshold_mode_stops_at_t() {
        let auth = authority(SigningMode::Threshold);
        let sigs = auth.sign(&sth_hash());
        let ids: Vec<_> = sigs.iter().map(|s| s.cosigner_id.as_str()).collect();
        assert_eq!(ids, vec!["cosigner_0", "cosigner_1"]);
        assert!(auth.verify_threshold(&sth_hash(), &sigs));
    }

    #[test]
    fn test_all_mode_collects_every_signature() {
        let auth = authority(SigningMode::All);
        assert_eq!(auth.sign(&sth_hash()).len(), 3);
    }

    #[test]
    fn test_unavailable_key_is_skipped() {
        let mut keys = seeded_keys(3);
        let pk = *keys[0].public_key();
        keys[0] = CosignerKey::verify_only(CosignerId::indexed(0), pk);
        let auth =
            CosignAuthority::new(keys, ThresholdPolicy::default(), SigningMode::Threshold).unwrap();
        let sigs = auth.sign(&sth_hash());
        let ids: Vec<_> = sigs.iter().map(|s| s.cosigner_id.as_str()).collect();
        assert_eq!(ids, vec!["cosigner_1", "cosigner_2"]);
    }

    #[test]
    fn test_undersigned_when_keys_missing() {
        let keys: Vec<_> = seeded_keys(3)
            .into_iter()
            .enumerate()
            .map(|(i, k)| {
                if i < 2 {
                    CosignerKey::verify_only(k.id().clone(), *k.public_key())
                } else {
                    k
                }
            })
            .collect();
        let auth =
            CosignAuthority::new(keys, ThresholdPolicy::default(), SigningMode::Threshold).unwrap();
        let sigs = auth.sign(&sth_hash());
        assert_eq!(sigs.len(), 1);
        assert!(!auth.verify_threshold(&sth_hash(), &sigs));
    }

    #[test]
    fn test_fewer_than_t_valid_signatures_fail() {
        let auth = authority(SigningMode::All);
        let sigs = auth.sign(&sth_hash());
        assert!(!auth.verify_threshold(&sth_hash(), &sigs[..1]));
    }

    #[test]
    fn test_duplicate_cosigner_counts_once() {
        let auth = authority(SigningMode::Threshold);
        let sigs = auth.sign(&sth_hash());
        let dup = vec![sigs[0].clone(), sigs[0].clone()];
        assert!(!auth.verify_threshold(&sth_hash(), &dup));

        let tally = auth.roster().evaluate(&sth_hash(), &dup);
        assert_eq!(tally.valid_count(), 1);
        assert_eq!(tally.rejected[0].1, RejectReason::Duplicate);
    }

    #[test]
    fn test_misattributed_signature_rejected() {
        let auth = authority(SigningMode::All);
        let sigs = auth.sign(&sth_hash());
        // cosigner_2's signature claimed as cosigner_1.
        let forged = vec![
            sigs[0].clone(),
            CosignerSignature {
                cosigner_id: CosignerId::indexed(1),
                signature: sigs[2].signature,
            },
        ];
        assert!(!auth.verify_threshold(&sth_hash(), &forged));
        let tally = auth.roster().evaluate(&sth_hash(), &forged);
        assert_eq!(
            tally.rejected,
            vec![(CosignerId::indexed(1), RejectReason::BadSignature)]
        );
    }

    #[test]
    fn test_unknown_cosigner_ignored() {
        let auth = authority(SigningMode::Threshold);
        let outsider = CosignerKey::generate(CosignerId::new("mallory"));
        let kp_sig = CosignAuthority::new(
            vec![outsider],
            ThresholdPolicy { t: 1, n: 1 },
            SigningMode::All,
        )
        .unwrap()
        .sign(&sth_hash());
        let mut sigs = auth.sign(&sth_hash());
        sigs.truncate(1);
        sigs.extend(kp_sig);
        assert!(!auth.verify_threshold(&sth_hash(), &sigs));
        let tally = auth.roster().evaluate(&sth_hash(), &sigs);
        assert_eq!(tally.rejected[0].1, RejectReason::UnknownCosigner);
    }

    #[test]
    fn test_signature_over_other_hash_rejected() {
        let auth = authority(SigningMode::Threshold);
        let sigs = auth.sign(&sha256_concat(&[b"other".as_slice()]));
        assert!(!auth.verify_threshold(&sth_hash(), &sigs));
    }

    #[test]
    fn test_unsatisfiable_policy_never_verifies() {
        let auth = authority(SigningMode::All);
        let sigs = auth.sign(&sth_hash());
        assert!(!auth.roster().verify_threshold(&sth_hash(), &sigs, 0, 3));
        assert!(!auth.roster().verify_threshold(&sth_hash(), &sigs, 4, 3));
        assert!(auth.roster().verify_threshold(&sth_hash(), &sigs, 3, 3));
    }

    #[test]
    fn test_key_count_must_match_policy() {
        let err =
            CosignAuthority::new(seeded_keys(2), ThresholdPolicy::default(), SigningMode::All)
                .unwrap_err();
        assert!(matches!(
            err,
            CosignError::KeyCount {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let keys = vec![
            CosignerKey::generate(CosignerId::indexed(0)),
            CosignerKey::generate(CosignerId::indexed(0)),
            CosignerKey::generate(CosignerId::indexed(1)),
        ];
        let err = CosignAuthority::new(keys, ThresholdPolicy::default(), SigningMode::All)
            .unwrap_err();
        assert!(matches!(err, CosignError::DuplicateId(id) if id == "cosigner_0"));
    }

    #[test]
    fn test_roster_built_from_public_keys_verifies() {
        let auth = authority(SigningMode::Threshold);
        let sigs = auth.sign(&sth_hash());
        let json = serde_json::to_string(auth.roster().cosigners()).unwrap();
        let published: Vec<CosignerPublic> = serde_json::from_str(&json).unwrap();
        let roster = CosignerRoster::new(published).unwrap();
        assert!(roster.verify_threshold(&sth_hash(), &sigs, 2, 3));
    }

    #[test]
    fn test_signing_mode_from_str() {
        assert_eq!("threshold".parse::<SigningMode>(), Ok(SigningMode::Threshold));
        assert_eq!("ALL".parse::<SigningMode>(), Ok(SigningMode::All));
        assert!("most".parse::<SigningMode>().is_err());
    }

    #[test]
    fn test_cosigner_key_debug_hides_seed() {
        let key = CosignerKey::from_seed(CosignerId::indexed(0), &[7u8; 32]);
        let dbg = format!("{key:?}");
        assert!(dbg.contains("can_sign: true"));
        assert!(!dbg.contains("0707070707"));
    }
}
