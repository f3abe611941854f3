//! Canonical JSON serialization and SHA-256 hashing over canonical bytes.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Recursively sort every object's keys, preserve array order, and drop
/// `null`-valued object entries that came from skipped `Option` fields so the
/// same logical document always serializes to the same bytes.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                let v = &map[key];
                sorted.insert(key.clone(), canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Deterministic UTF-8 bytes for a canonicalized value: sorted keys, no
/// insignificant whitespace.
pub fn canonical_stringify(value: &Value) -> Vec<u8> {
    let canon = canonicalize(value);
    serde_json::to_vec(&canon).expect("canonicalized value always serializes")
}

/// `sha256(canonical_stringify(value))`, hex-encoded.
pub fn sha256_canonical_value(value: &Value) -> String {
    let bytes = canonical_stringify(value);
    hex::encode(Sha256::digest(bytes))
}

/// Convenience over any `Serialize` type: `sha256_canonical(x) ==
/// sha256_canonical(clone(x))` for all JSON-representable `x`.
pub fn sha256_canonical<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let as_value = serde_json::to_value(value)?;
    Ok(sha256_canonical_value(&as_value))
}
