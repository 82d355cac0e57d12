//! Content hashing for change detection
//!
//! A leaf is rewritten only when the SHA-256 of its canonical JSON differs
//! from the hash stored with the existing row.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute lowercase hex SHA-256 of content.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Serialize a document with object keys sorted at every level.
///
/// Documents that differ only in key order serialize identically.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Fingerprint of an entity document.
pub fn fingerprint(value: &Value) -> String {
    content_hash(canonical_json(value).as_bytes())
}
