//! Recursive redaction of sensitive-looking keys from tool results before
//! they cross the public boundary.

use serde_json::{Map, Value};

/// Lower-cased substrings that mark an object key as sensitive.
const SENSITIVE_KEY_FRAGMENTS: &[&str] = &["token", "secret", "auth", "key"];

pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEY_FRAGMENTS.iter().any(|frag| lower.contains(frag))
}

/// Return a copy of `value` with every sensitive key removed at any depth.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let clean: Map<String, Value> = map
                .iter()
                .filter(|(k, _)| !is_sensitive_key(k))
                .map(|(k, v)| (k.clone(), sanitize(v)))
                .collect();
            Value::Object(clean)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        scalar => scalar.clone(),
    }
}
