//! Structured content mode shapes.
//!
//! Structured mode serialises the whole event — attributes and `data` — as
//! a single JSON document. The attribute *keys* differ per spec version
//! (see [`super::tables`]); only the shape of the `data` field is shared
//! across versions: a JSON string is taken verbatim as payload bytes,
//! anything else round-trips through `serde_json` so payload bytes are
//! exactly the bytes that would appear in the structured document.

use serde_json::Value;

use crate::error::{Error, Result};

/// Lifts the `data` field of a structured CloudEvents JSON document into
/// payload bytes, per §4.1's `decode`.
pub fn extract_data(object: &serde_json::Map<String, Value>) -> Result<Option<Vec<u8>>> {
    match object.get("data") {
        Some(Value::String(s)) => Ok(Some(s.clone().into_bytes())),
        Some(other) => serde_json::to_vec(other)
            .map(Some)
            .map_err(|e| Error::decode(format!("failed to re-serialize data field: {}", e))),
        None => Ok(None),
    }
}
