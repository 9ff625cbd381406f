//! Helpers shared by the project and task tools for reading arguments and
//! normalizing backend responses.

use devpilot_core::error::ToolError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Decode validated arguments into a typed struct.
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Build a JSON object from `(key, value)` pairs, skipping `None`s.
pub(crate) fn compact(pairs: Vec<(&str, Option<Value>)>) -> Value {
    let map: Map<String, Value> = pairs
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
        .collect();
    Value::Object(map)
}

/// First present identifier among `keys` in a backend record.
pub(crate) fn extract_id(record: &Value, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .find_map(|k| record.get(*k))
        .filter(|v| v.is_number() || v.is_string())
        .cloned()
}

/// The backend returns lists either bare or wrapped in `data`/`content`.
pub(crate) fn into_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => ["data", "content", "items"]
            .iter()
            .find_map(|k| match map.remove(*k) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Read a string field under any of `keys`.
pub(crate) fn field_str<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| record.get(*k).and_then(Value::as_str))
}

/// Whether two identifiers match, tolerating `7` vs `"7"`.
pub(crate) fn same_id(a: &Value, b: i64) -> bool {
    match a {
        Value::Number(n) => n.as_i64() == Some(b),
        Value::String(s) => s.trim().parse::<i64>().ok() == Some(b),
        _ => false,
    }
}

/// Tags arrive either as a list or as one comma-separated string.
pub(crate) fn tags_of(record: &Value) -> Vec<String> {
    match record.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}
