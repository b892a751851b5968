//! Canonical JSON: object keys sorted, tab indentation, trailing newline.

use std::path::Path;

use fs_err as fs;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;

use crate::error::{RegressError, Result};

/// Render `value` as canonical JSON text.
pub fn encode(value: &Value) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"\t");
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| RegressError::serialize(e.to_string()))?;
    buf.push(b'\n');
    String::from_utf8(buf).map_err(|e| RegressError::serialize(e.to_string()))
}

pub fn write(path: &Path, value: &Value) -> Result<()> {
    fs::write(path, encode(value)?)?;
    Ok(())
}

pub fn read(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| RegressError::corrupt(path, e))
}
