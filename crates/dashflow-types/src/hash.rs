//! Content hashing for configuration values
//!
//! Provides [`ContentHash`], a Blake3 digest of a JSON value in canonical form.
//! Two values that differ only in object key order hash identically, which is
//! what makes content-hash deduplication of configuration writes reliable.

use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 32-byte content hash (Blake3) over canonical JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Create a hash from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create hash from byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HashError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| HashError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Hash raw bytes
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash a JSON value after canonicalizing it
    #[must_use]
    pub fn of_value(value: &Value) -> Self {
        let canonical = canonicalize(value);
        // Serializing a `Value` cannot fail: keys are always strings.
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        Self::compute(&bytes)
    }

    /// Hash any serializable value through its canonical JSON form
    ///
    /// # Errors
    /// Returns error if the value cannot be represented as JSON
    pub fn of_serializable<T>(value: &T) -> Result<Self, HashError>
    where
        T: serde::Serialize,
    {
        let json = serde_json::to_value(value)?;
        Ok(Self::of_value(&json))
    }

    /// Combine an ordered list of hashes into one
    #[must_use]
    pub fn combine<'a>(parts: impl IntoIterator<Item = &'a ContentHash>) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(&part.0);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// Check if hash is all zeros (placeholder)
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

/// Rebuild a JSON value with every object's keys sorted, recursively
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                if let Some(inner) = map.get(key) {
                    sorted.insert(key.clone(), canonicalize(inner));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl serde::Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for ContentHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        hex.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when working with content hashes
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Invalid hash length
    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Hex decoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Value could not be converted to JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_hash() {
        let a = json!({"b": 1, "a": {"y": [1, 2], "x": null}});
        let b = json!({"a": {"x": null, "y": [1, 2]}, "b": 1});
        assert_eq!(ContentHash::of_value(&a), ContentHash::of_value(&b));
    }

    #[test]
    fn array_order_changes_hash() {
        let a = json!([1, 2]);
        let b = json!([2, 1]);
        assert_ne!(ContentHash::of_value(&a), ContentHash::of_value(&b));
    }

    #[test]
    fn display_and_parse() {
        let hash = ContentHash::of_value(&json!({"k": "v"}));
        let parsed: ContentHash = hash.to_string().parse().unwrap();
        assert_eq!(hash, parsed);
        assert_eq!(hash.short().len(), 16);
        assert!(hash.to_string().starts_with(&hash.short()));
    }

    #[test]
    fn invalid_length_rejected() {
        let result = ContentHash::from_slice(&[0u8; 31]);
        assert!(matches!(
            result,
            Err(HashError::InvalidLength {
                expected: 32,
                actual: 31
            })
        ));
    }

    #[test]
    fn combine_is_order_sensitive() {
        let a = ContentHash::compute(b"a");
        let b = ContentHash::compute(b"b");
        assert_ne!(ContentHash::combine([&a, &b]), ContentHash::combine([&b, &a]));
        assert!(ContentHash::default().is_zero());
        assert!(!a.is_zero());
    }

    #[test]
    fn serde_uses_hex_string() {
        let hash = ContentHash::compute(b"serde");
        let json = serde_json::to_value(hash).unwrap();
        assert_eq!(json, Value::String(hash.to_string()));
        let back: ContentHash = serde_json::from_value(json).unwrap();
        assert_eq!(back, hash);
    }

    proptest! {
        #[test]
        fn canonical_hash_ignores_insertion_order(
            entries in proptest::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..12)
        ) {
            let mut forward = Map::new();
            for (k, v) in &entries {
                forward.insert(k.clone(), json!(v));
            }
            let mut reverse = Map::new();
            for (k, v) in entries.iter().rev() {
                reverse.insert(k.clone(), json!(v));
            }
            prop_assert_eq!(
                ContentHash::of_value(&Value::Object(forward)),
                ContentHash::of_value(&Value::Object(reverse))
            );
        }
    }
}
