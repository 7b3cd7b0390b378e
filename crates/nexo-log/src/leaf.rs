//! # Leaf Hasher
//!
//! A leaf is the fixed binary pre-image
//!
//! ```text
//! identifier (UTF-8) || public_key (32 bytes) || registered_at (u64, big-endian)
//! ```
//!
//! hashed with SHA-256. The layout is a wire contract shared with every
//! auditor; it does not go through canonical JSON.

use nexo_core::{decode_base64, encode_base64, sha256_concat, Digest32, ValidationError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Required public key length in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Derive the leaf hash for a registration.
pub fn compute_leaf_hash(
    identifier: &str,
    public_key: &[u8],
    registered_at: i64,
) -> Result<Digest32, ValidationError> {
    if identifier.is_empty() {
        return Err(ValidationError::EmptyIdentifier);
    }
    if public_key.len() != PUBLIC_KEY_LEN {
        return Err(ValidationError::InvalidKeyLength {
            expected: PUBLIC_KEY_LEN,
            actual: public_key.len(),
        });
    }
    if registered_at <= 0 {
        return Err(ValidationError::NonPositiveTimestamp(registered_at));
    }
    let ts = (registered_at as u64).to_be_bytes();
    Ok(sha256_concat(&[identifier.as_bytes(), public_key, &ts]))
}

/// One registration as stored in the leaf store.
///
/// `public_key` is kept as raw bytes rather than a fixed array so that an
/// auditor can load and flag a malformed stored record instead of failing to
/// parse the whole store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafRecord {
    /// Registered identifier, e.g. a DID.
    #[serde(rename = "id")]
    pub identifier: String,
    /// Public key bytes, base64 on the wire.
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
    /// Registration time, Unix seconds.
    #[serde(rename = "timestamp")]
    pub registered_at: i64,
    /// Leaf hash computed at registration.
    pub leaf_hash: Digest32,
}

impl LeafRecord {
    /// Validate the inputs and build a record with its leaf hash.
    pub fn new(
        identifier: impl Into<String>,
        public_key: Vec<u8>,
        registered_at: i64,
    ) -> Result<Self, ValidationError> {
        let identifier = identifier.into();
        let leaf_hash = compute_leaf_hash(&identifier, &public_key, registered_at)?;
        Ok(Self {
            identifier,
            public_key,
            registered_at,
            leaf_hash,
        })
    }

    /// Re-derive the leaf hash from the record's raw fields.
    pub fn recompute_hash(&self) -> Result<Digest32, ValidationError> {
        compute_leaf_hash(&self.identifier, &self.public_key, self.registered_at)
    }
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_base64(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_base64("public_key", &s).map_err(serde::de::Error::custom)
    }
}
