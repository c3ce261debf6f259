//! Exact-value index: mapping from a hashable value to the ordered
//! sequence of keys currently bound to it.

use serde_json::Value;
use std::collections::HashMap;

/// A hashable projection of a `serde_json::Value`. `serde_json::Value`
/// itself does not implement `Hash` (its `Number` can hold an `f64`), so
/// primitives are canonicalized here; arrays and objects have no
/// `HashableKey` and are therefore never indexed, matching the spec's
/// "unhashable values are not indexed" rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashableKey {
    Null,
    Bool(bool),
    /// Canonical JSON text of the number (e.g. "1", "1.5").
    Number(String),
    Str(String),
}

impl HashableKey {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(HashableKey::Null),
            Value::Bool(b) => Some(HashableKey::Bool(*b)),
            Value::Number(n) => Some(HashableKey::Number(n.to_string())),
            Value::String(s) => Some(HashableKey::Str(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Exact-value secondary index.
#[derive(Debug, Default)]
pub struct ValueIndex {
    buckets: HashMap<HashableKey, Vec<String>>,
}

impl ValueIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `key` to the bucket for `value`. No-op if `value` is
    /// unhashable.
    pub fn add(&mut self, key: &str, value: &Value) {
        if let Some(hk) = HashableKey::from_value(value) {
            self.buckets.entry(hk).or_default().push(key.to_string());
        }
    }

    /// Remove one occurrence of `key` from the bucket for `value`; drop
    /// the bucket once empty.
    pub fn remove(&mut self, key: &str, value: &Value) {
        let Some(hk) = HashableKey::from_value(value) else {
            return;
        };
        if let Some(bucket) = self.buckets.get_mut(&hk) {
            if let Some(pos) = bucket.iter().position(|k| k == key) {
                bucket.remove(pos);
            }
            if bucket.is_empty() {
                self.buckets.remove(&hk);
            }
        }
    }

    /// A copy of the bucket for `value` (empty if absent or unhashable).
    pub fn search(&self, value: &Value) -> Vec<String> {
        HashableKey::from_value(value)
            .and_then(|hk| self.buckets.get(&hk))
            .cloned()
            .unwrap_or_default()
    }
}
