//! # Canonical Serialization: JCS Byte Production
//!
//! `CanonicalBytes` is the sole construction path for bytes used as the
//! pre-image of a structured-record digest. In this log that means the STH
//! body: its hash is both what the cosigners sign and what the next STH
//! stores as `prev_hash`.
//!
//! ## Security Invariant
//!
//! The inner field is private. The only constructor is
//! `CanonicalBytes::new()`, which rejects floats and then serializes with
//! RFC 8785 (JCS) rules: object keys sorted lexicographically at every
//! nesting level, compact separators, no insignificant whitespace. Two
//! records that differ only in field insertion order therefore produce
//! identical bytes, and any function that needs a canonical pre-image can
//! demand `&CanonicalBytes` in its signature.
//!
//! Leaf hashing does NOT go through this module; it uses a fixed binary
//! layout (see `nexo_log::leaf`).

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization.
///
/// # Invariants
///
/// - The only constructor is `CanonicalBytes::new()`.
/// - Numbers are integers; floats are rejected.
/// - Object keys are sorted at every level, separators are compact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::FloatRejected` if the value contains a
    /// non-integer number, `CanonicalizationError::SerializationFailed` if the
    /// value cannot be represented as JSON.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        reject_floats(&value)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Walk the JSON tree and fail on the first number that is not an integer.
///
/// JCS number formatting for non-integers is the one place where
/// implementations in different languages routinely disagree, so nothing
/// hashed by the log may carry one.
fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if n.is_f64() && !n.is_i64() && !n.is_u64() {
                if let Some(f) = n.as_f64() {
                    return Err(CanonicalizationError::FloatRejected(f));
                }
            }
            Ok(())
        }
        Value::Array(items) => items.iter().try_for_each(reject_floats),
        Value::Object(map) => map.values().try_for_each(reject_floats),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn json_value_no_floats() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| serde_json::json!(n)),
            "[a-zA-Z0-9:_ ]{0,40}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
                prop::collection::btree_map("[a-z_]{1,10}", inner, 0..8).prop_map(|m| {
                    Value::Object(m.into_iter().collect::<serde_json::Map<String, Value>>())
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn canonical_bytes_deterministic(value in json_value_no_floats()) {
            let a = CanonicalBytes::new(&value).unwrap();
            let b = CanonicalBytes::new(&value).unwrap();
            prop_assert_eq!(a.as_bytes(), b.as_bytes());
        }

        #[test]
        fn canonical_bytes_parse_back_to_same_value(value in json_value_no_floats()) {
            let cb = CanonicalBytes::new(&value).unwrap();
            let parsed: Value = serde_json::from_slice(cb.as_bytes()).unwrap();
            prop_assert_eq!(parsed, value);
        }

        #[test]
        fn canonical_output_keys_sorted(
            keys in prop::collection::btree_set("[a-z]{1,8}", 2..6)
        ) {
            // Insert in reverse so the input order is never already sorted.
            let mut map = serde_json::Map::new();
            for (i, k) in keys.iter().rev().enumerate() {
                map.insert(k.clone(), serde_json::json!(i));
            }
            let cb = CanonicalBytes::new(&Value::Object(map)).unwrap();
            let s = std::str::from_utf8(cb.as_bytes()).unwrap();
            let positions: Vec<usize> = keys
                .iter()
                .map(|k| s.find(&format!("\"{k}\":")).unwrap())
                .collect();
            let mut sorted = positions.clone();
            sorted.sort_unstable();
            prop_assert_eq!(positions, sorted);
        }
    }
}
