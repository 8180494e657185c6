//! Topic parsers: raw upstream JSON payloads to typed patches.
//!
//! Parsers are pure and never fail — malformed input produces `None` or an
//! empty patch list and the accumulator merges whatever is present. Patch
//! structs carry `Option` per field so that "absent" stays distinguishable
//! from "zero" / empty.
//!
//! The feed serialises most numbers as strings ("27.5", lap counts, racing
//! numbers) and uses keyed objects for diffs where full snapshots use
//! arrays; the helpers below normalise both.

pub mod driver_list;
pub mod race_control;
pub mod session;
pub mod stints;
pub mod timing;
pub mod top_three;
pub mod track_status;
pub mod weather;

use serde_json::Value;

/// Extract a string field, accepting raw strings and JSON numbers.
pub(crate) fn string_field(obj: &Value, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extract an unsigned integer field, accepting numbers and numeric strings.
pub(crate) fn u32_field(obj: &Value, key: &str) -> Option<u32> {
    match obj.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Extract a float field, accepting numbers and numeric strings.
pub(crate) fn f64_field(obj: &Value, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Extract a boolean field, accepting booleans and "true"/"false" strings.
pub(crate) fn bool_field(obj: &Value, key: &str) -> Option<bool> {
    match obj.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" | "True" => Some(true),
            "false" | "False" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Extract a lap/sector time, which arrives either as a plain string or
/// wrapped as `{"Value": "1:23.456"}`. Empty strings count as absent.
pub(crate) fn time_field(obj: &Value, key: &str) -> Option<String> {
    let v = obj.get(key)?;
    let s = match v {
        Value::String(s) => s,
        Value::Object(_) => match v.get("Value")? {
            Value::String(s) => s,
            _ => return None,
        },
        _ => return None,
    };
    if s.is_empty() { None } else { Some(s.clone()) }
}

/// Iterate a collection that is an array in full snapshots and an
/// index-keyed object in diffs. Yields `(index, value)` in ascending index
/// order; non-numeric keys are skipped.
pub(crate) fn indexed_entries(v: &Value) -> Vec<(u32, &Value)> {
    match v {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| (i as u32, item))
            .collect(),
        Value::Object(map) => {
            let mut entries: Vec<(u32, &Value)> = map
                .iter()
                .filter_map(|(k, item)| k.parse::<u32>().ok().map(|i| (i, item)))
                .collect();
            entries.sort_by_key(|(i, _)| *i);
            entries
        }
        _ => Vec::new(),
    }
}
