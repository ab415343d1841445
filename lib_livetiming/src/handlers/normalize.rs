//! Wire-format normalization applied by both handlers.
//!
//! The feed sends some integer fields as strings (`"Position": "1"`). They
//! are rewritten to JSON numbers here, in one place, through a table keyed by
//! field name.

use serde_json::{Map, Number, Value};

use crate::clock::now_millis;
use crate::store::Section;

/// Entity-line fields that always hold integers.
pub const INTEGER_FIELDS: &[&str] = &["Position", "Line", "NumberOfLaps", "NumberOfPitStops"];

/// Sections whose top-level object is itself the entity map.
const FLAT_LINE_SECTIONS: &[Section] = &[Section::DriverList];

/// Parses an integer-looking string. Anything else is left alone.
pub fn coerce_integer(value: &Value) -> Option<Value> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    text.parse::<i64>().ok().map(|n| Value::Number(Number::from(n)))
}

fn coerce_line(line: &mut Value) {
    let Value::Object(fields) = line else {
        return;
    };
    for field in INTEGER_FIELDS {
        if let Some(slot) = fields.get_mut(*field) {
            if let Some(number) = coerce_integer(slot) {
                *slot = number;
            }
        }
    }
}

fn coerce_lines(lines: &mut Value) {
    if let Value::Object(entries) = lines {
        entries.values_mut().for_each(coerce_line);
    }
}

/// Coerces every entity line found in `payload`.
pub fn coerce_entity_lines(payload: &mut Map<String, Value>) {
    for section in Section::ALL {
        let Some(value) = payload.get_mut(section.as_str()) else {
            continue;
        };
        if section.has_lines() {
            if let Some(lines) = value.get_mut("Lines") {
                coerce_lines(lines);
            }
        } else if FLAT_LINE_SECTIONS.contains(&section) {
            coerce_lines(value);
        }
    }
}

/// Inserts `timestamp` (epoch ms) when it is missing or `null`.
pub fn ensure_timestamp(payload: &mut Map<String, Value>) {
    let missing = payload.get("timestamp").map_or(true, Value::is_null);
    if missing {
        payload.insert("timestamp".to_string(), Value::from(now_millis()));
    }
}

/// Drops top-level keys whose value is an empty object.
pub fn drop_empty_sections(payload: &mut Map<String, Value>) {
    payload.retain(|_, value| !matches!(value, Value::Object(map) if map.is_empty()));
}

/// Compact JSON length of `value`.
pub fn encoded_size(value: &Value) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}

/// Short type name used in diagnostics.
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
