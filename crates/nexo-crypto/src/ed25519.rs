//! # Ed25519 Signing and Verification
//!
//! Cosigners sign the 32-byte STH hash directly, not the STH body.
//!
//! ## Security Invariant
//!
//! - Signing input MUST be a `&Digest32`. The only digests that reach this
//!   module are STH hashes, each produced from `CanonicalBytes`.
//! - Private keys are never serialized or logged. `Ed25519KeyPair` does not
//!   implement `Serialize` and its `Debug` output is redacted.
//!
//! ## Serde
//!
//! Public keys and signatures serialize as standard base64 strings, the wire
//! format of the log.

use ed25519_dalek::{Signer, Verifier};
use nexo_core::{decode_base64, encode_base64, CryptoError, Digest32};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An Ed25519 public key (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey(pub [u8; 32]);

/// An Ed25519 signature (64 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519Signature(pub [u8; 64]);

/// An Ed25519 key pair for signing operations.
pub struct Ed25519KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

// ---------------------------------------------------------------------------
// Ed25519PublicKey impls
// ---------------------------------------------------------------------------

impl Ed25519PublicKey {
    /// Create a public key from raw 32 bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the raw 32-byte public key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode as standard base64.
    pub fn to_base64(&self) -> String {
        encode_base64(&self.0)
    }

    /// Parse a public key from base64. The decoded value must be 32 bytes.
    pub fn from_base64(s: &str) -> Result<Self, CryptoError> {
        let bytes = decode_base64("public_key", s)
            .map_err(|e| CryptoError::KeyError(e.to_string()))?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::KeyError(format!("public key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Convert to an `ed25519_dalek::VerifyingKey`.
    pub fn to_verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::KeyError(format!("invalid public key: {e}")))
    }
}

impl Serialize for Ed25519PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Ed25519PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519PublicKey({}...)", hex_prefix(&self.0))
    }
}

impl std::fmt::Display for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base64())
    }
}

// ---------------------------------------------------------------------------
// Ed25519Signature impls
// ---------------------------------------------------------------------------

impl Ed25519Signature {
    /// Create a signature from raw 64 bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Return the raw 64-byte signature.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Encode as standard base64.
    pub fn to_base64(&self) -> String {
        encode_base64(&self.0)
    }

    /// Parse a signature from base64. The decoded value must be 64 bytes.
    pub fn from_base64(s: &str) -> Result<Self, CryptoError> {
        let bytes = decode_base64("sig", s)
            .map_err(|e| CryptoError::VerificationFailed(e.to_string()))?;
        let arr: [u8; 64] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::VerificationFailed(format!(
                "signature must be 64 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }
}

impl Serialize for Ed25519Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Ed25519Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519Signature({}...)", hex_prefix(&self.0))
    }
}

// ---------------------------------------------------------------------------
// Ed25519KeyPair impls
// ---------------------------------------------------------------------------

impl Ed25519KeyPair {
    /// Generate a new random key pair from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a key pair from a 32-byte private seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// The 32-byte private seed. Only for writing key files.
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Get the public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a 32-byte digest.
    pub fn sign(&self, digest: &Digest32) -> Ed25519Signature {
        let sig = self.signing_key.sign(digest.as_bytes());
        Ed25519Signature(sig.to_bytes())
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519KeyPair(<private>)")
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verify an Ed25519 signature over a 32-byte digest.
///
/// Returns `Ok(())` if valid, `Err(CryptoError)` if the key is malformed or
/// the signature does not verify.
pub fn verify(
    digest: &Digest32,
    signature: &Ed25519Signature,
    public_key: &Ed25519PublicKey,
) -> Result<(), CryptoError> {
    let vk = public_key.to_verifying_key()?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    vk.verify(digest.as_bytes(), &sig)
        .map_err(|e| CryptoError::VerificationFailed(format!("Ed25519 verification failed: {e}")))
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{b:02x}")).collect()
}
