//! Canonical JSON encoding.
//!
//! `canonicalize` produces a deterministic byte encoding of any
//! serializable value: object keys are sorted lexicographically at every
//! nesting depth, there is no insignificant whitespace, and numeric types
//! round-trip through `serde_json::Value` untouched (no float coercion).

use serde::Serialize;
use serde_json::Value;

use crate::error::CodecError;

/// Canonicalize `value` to its deterministic byte encoding.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let v = serde_json::to_value(value).map_err(|e| CodecError::NonCanonicalInput(e.to_string()))?;
    canonicalize_value(&v)
}

/// Canonicalize an already-parsed `serde_json::Value`, rejecting
/// non-canonical inputs such as `NaN`/`Infinity` (which `serde_json`
/// represents as `Value::Null` only when configured to allow them —
/// reject any value that fails to serialize at all).
pub fn canonicalize_value(value: &Value) -> Result<Vec<u8>, CodecError> {
    let sorted = sort_keys(value);
    serde_json::to_vec(&sorted).map_err(|e| CodecError::NonCanonicalInput(e.to_string()))
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for k in keys {
                sorted.insert(k.clone(), sort_keys(&map[k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys_at_every_depth() {
        let v = json!({"b": 1, "a": {"d": 2, "c": 3}});
        let bytes = canonicalize_value(&v).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert_eq!(s, r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn is_idempotent() {
        let v = json!({"z": [3, 2, {"y": 1, "x": 2}], "a": true});
        let once = canonicalize_value(&v).unwrap();
        let reparsed: Value = serde_json::from_slice(&once).unwrap();
        let twice = canonicalize_value(&reparsed).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn preserves_integer_vs_float_distinction() {
        let v = json!({"n": 10, "f": 10.5});
        let bytes = canonicalize_value(&v).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert!(s.contains("\"n\":10"));
        assert!(s.contains("\"f\":10.5"));
    }

    #[test]
    fn no_insignificant_whitespace() {
        let v = json!({"a": 1, "b": [1, 2, 3]});
        let bytes = canonicalize_value(&v).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert!(!s.contains(' '));
        assert!(!s.contains('\n'));
    }
}
