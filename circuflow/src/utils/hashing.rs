//! Content hashes for audit entries.
//!
//! Maps keep insertion order in this crate, so hashing goes through a
//! canonical rendering with object keys sorted at every level. Two values
//! that compare equal as JSON always hash the same.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Renders `value` as compact JSON with object keys sorted recursively.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::with_capacity(map.len());
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// SHA-256 of the canonical JSON rendering, hex encoded.
#[must_use]
pub fn content_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hex::encode(hasher.finalize())
}
