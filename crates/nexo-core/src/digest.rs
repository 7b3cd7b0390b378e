//! # Digests: 32-byte SHA-256 Values and Their Wire Encoding
//!
//! Every hash the log publishes (leaf hashes, Merkle roots, STH `prev_hash`)
//! is a 32-byte SHA-256 output and crosses every external boundary as a
//! standard (padded) base64 string.
//!
//! ## Two Hashing Paths
//!
//! - [`sha256_digest()`] takes `&CanonicalBytes` and is the only way to hash
//!   a structured record.
//! - [`sha256_concat()`] hashes the concatenation of raw byte slices. It is
//!   used for the fixed binary layouts: the leaf pre-image and Merkle
//!   parent nodes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::ValidationError;

/// A 32-byte SHA-256 digest.
///
/// Serializes as a standard base64 string (44 chars including padding).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest32([u8; 32]);

impl Digest32 {
    /// The all-zero digest. Root of the empty tree.
    pub const ZERO: Digest32 = Digest32([0u8; 32]);

    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build a digest from a slice, which must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ValidationError::InvalidDigestLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Return the raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode as standard base64.
    pub fn to_base64(&self) -> String {
        encode_base64(&self.0)
    }

    /// Decode from standard base64. The decoded value must be 32 bytes.
    pub fn from_base64(s: &str) -> Result<Self, ValidationError> {
        let bytes = decode_base64("digest", s)?;
        Self::from_slice(&bytes)
    }

    /// Render as lowercase hex (diagnostics only; the wire format is base64).
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl AsRef<[u8]> for Digest32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Digest32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest32({})", &self.to_hex()[..16])
    }
}

impl std::fmt::Display for Digest32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl Serialize for Digest32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Digest32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Option<Digest32>` where `None` is the empty string.
///
/// The first STH in a chain has no predecessor; its `prev_hash` is `""` on
/// the wire and inside the canonical body.
pub mod optional_base64 {
    use super::Digest32;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Digest32>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_str(&d.to_base64()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Digest32>, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(None);
        }
        Digest32::from_base64(&s)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

/// Compute the SHA-256 digest of canonical bytes.
///
/// Accepts only `&CanonicalBytes`, so a structured record cannot be hashed
/// without first being canonicalized.
pub fn sha256_digest(data: &CanonicalBytes) -> Digest32 {
    sha256_concat(&[data.as_bytes()])
}

/// Compute `SHA-256(parts[0] || parts[1] || ...)`.
pub fn sha256_concat(parts: &[&[u8]]) -> Digest32 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    Digest32(out)
}

/// Encode bytes as standard padded base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard padded base64, naming `field` in the error.
pub fn decode_base64(field: &str, s: &str) -> Result<Vec<u8>, ValidationError> {
    STANDARD
        .decode(s.trim())
        .map_err(|e| ValidationError::InvalidBase64 {
            field: field.to_string(),
            reason: e.to_string(),
        })
}
