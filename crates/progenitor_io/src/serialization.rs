//! JSON helpers with consistent error mapping.
//!
//! Used for manifests, parameter maps and other human-readable side files.
//! Binary artifacts go through [`crate::envelope`] instead.

use crate::error::{Result, StoreError};
use crate::gate::PublishGate;
use crate::store::write_atomic;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serializes data to JSON.
pub fn to_json<T>(data: &T) -> Result<String>
where
    T: Serialize,
{
    serde_json::to_string(data)
        .map_err(|e| StoreError::serialization(format!("JSON serialization failed: {}", e)))
}

/// Serializes data to pretty-printed JSON.
pub fn to_json_pretty<T>(data: &T) -> Result<String>
where
    T: Serialize,
{
    serde_json::to_string_pretty(data)
        .map_err(|e| StoreError::serialization(format!("JSON serialization failed: {}", e)))
}

/// Deserializes data from a JSON string.
///
/// Empty input is rejected up front so callers get a validation error
/// instead of an opaque EOF message.
pub fn from_json<T>(json: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    if json.trim().is_empty() {
        return Err(StoreError::validation("Empty JSON string"));
    }

    serde_json::from_str(json)
        .map_err(|e| StoreError::serialization(format!("JSON deserialization failed: {}", e)))
}

/// Writes pretty JSON to a file atomically (temp file, then rename).
pub fn write_json_file<T, P>(data: &T, path: P) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let json = to_json_pretty(data)?;
    write_atomic(path.as_ref(), json.as_bytes(), &PublishGate::new())
        .map_err(|e| e.with_context(format!("writing JSON to {:?}", path.as_ref())))
}
