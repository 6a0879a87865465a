//! Ordered field chains over loosely-shaped JSON records.
//!
//! Reservation records arrive from several producers that spell the same
//! logical field differently. Each logical field is read through a fixed,
//! ordered list of dotted paths; the first present, non-empty value wins.

use serde_json::Value;

/// Walk a dotted path (`user.phone`) into nested JSON objects.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |cur, key| cur.as_object()?.get(key))
}

/// A scalar as trimmed, non-empty text. Integral numbers render without a fraction.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(
            n.as_i64()
                .map(|i| i.to_string())
                .or_else(|| n.as_u64().map(|u| u.to_string()))
                .unwrap_or_else(|| n.to_string()),
        ),
        _ => None,
    }
}

/// First non-null value along the chain.
pub fn first_value<'a>(value: &'a Value, chain: &[&str]) -> Option<&'a Value> {
    chain
        .iter()
        .filter_map(|path| lookup(value, path))
        .find(|v| !v.is_null())
}

/// First non-empty text along the chain.
pub fn first_text(value: &Value, chain: &[&str]) -> Option<String> {
    chain
        .iter()
        .find_map(|path| lookup(value, path).and_then(scalar_text))
}

/// First value along the chain that reads as a boolean.
/// Accepts JSON booleans, numbers (non-zero is true) and `"true"`/`"1"` strings.
pub fn first_flag(value: &Value, chain: &[&str]) -> Option<bool> {
    chain.iter().find_map(|path| match lookup(value, path)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Display name of a person-like object: `firstName lastName`, then `name`, then `fullName`.
pub fn full_name(value: &Value) -> Option<String> {
    if !value.is_object() {
        return None;
    }
    let first = lookup(value, "firstName").and_then(scalar_text).unwrap_or_default();
    let last = lookup(value, "lastName").and_then(scalar_text).unwrap_or_default();
    let joined = format!("{first} {last}");
    let joined = joined.trim();
    if !joined.is_empty() {
        return Some(joined.to_string());
    }
    first_text(value, &["name", "fullName"])
}
