//! Failure-tolerant JSON encoding.
//!
//! Values that cannot be represented as JSON (maps with non-string keys,
//! failing `Serialize` impls) are replaced by a placeholder string instead of
//! aborting the surrounding write.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;

use crate::error::{MetaError, MetaResult};

/// Indentation used for the on-disk document.
const INDENT: &[u8] = b"    ";

/// Placeholder stored in place of a value that failed to encode.
pub fn placeholder(reason: &str) -> String {
    format!("<unserializable: {}>", reason)
}

/// Convert any serializable value to JSON, substituting a placeholder on failure.
pub fn to_value_lossy<T: Serialize + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => Value::String(placeholder(&e.to_string())),
    }
}

/// Pretty-print with a 4-space indent.
pub fn to_string_pretty<T: Serialize + ?Sized>(value: &T) -> MetaResult<String> {
    let mut buf = Vec::with_capacity(512);
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut ser).map_err(|e| MetaError::Serialize {
        message: e.to_string(),
    })?;
    String::from_utf8(buf).map_err(|e| MetaError::Serialize {
        message: e.to_string(),
    })
}

/// Pretty-print, never failing: an unencodable value renders as its placeholder.
pub fn encode_pretty<T: Serialize + ?Sized>(value: &T) -> String {
    match to_string_pretty(value) {
        Ok(s) => s,
        Err(e) => {
            let fallback = Value::String(placeholder(&e.to_string()));
            // A bare JSON string always encodes.
            to_string_pretty(&fallback).unwrap_or_else(|_| "null".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_pretty_uses_four_space_indent() {
        let v = serde_json::json!({"a": {"b": 1}});
        let s = to_string_pretty(&v).unwrap();
        assert_eq!(s, "{\n    \"a\": {\n        \"b\": 1\n    }\n}");
    }

    #[test]
    fn test_non_string_keys_become_placeholder() {
        let mut m = HashMap::new();
        m.insert((1, 2), "x");

        let v = to_value_lossy(&m);
        let s = v.as_str().expect("placeholder string");
        assert!(s.starts_with("<unserializable:"), "got {s}");

        let encoded = encode_pretty(&m);
        assert!(encoded.starts_with("\"<unserializable:"));
    }

    #[test]
    fn test_non_finite_float_encodes_as_null() {
        assert_eq!(to_value_lossy(&f64::NAN), Value::Null);
        assert_eq!(encode_pretty(&f64::INFINITY), "null");
    }
}
