//! Deterministic identifiers and content fingerprints.

use md5::{Digest, Md5};
use serde_json::{Map, Value};

/// Derives the identifier of a pathogen model from its query string.
///
/// Queries that parse as JSON are re-serialized in canonical form (compact,
/// object keys sorted) before hashing, so formatting differences do not
/// change the id. Anything else is hashed verbatim.
///
/// # Examples
///
/// ```
/// use model_structs::model_id;
///
/// let a = model_id(r#"{"pathogen": "flu", "site": "all"}"#);
/// let b = model_id(r#"{"site":"all","pathogen":"flu"}"#);
/// assert_eq!(a, b);
/// ```
#[must_use]
pub fn model_id(query_str: &str) -> String {
    match serde_json::from_str::<Value>(query_str) {
        Ok(value) => content_key(canonicalize(value).to_string().as_bytes()),
        Err(_) => content_key(query_str.as_bytes()),
    }
}

/// Rebuilds every object with its keys in sorted order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut entries: Vec<(String, Value)> = object.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, canonicalize(value)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// MD5 hex digest of an uploaded artifact.
#[must_use]
pub fn content_key(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}
