//! Salvaging structured verdicts from judge replies.
//!
//! Judges are asked for a bare JSON object but still wrap it in code fences,
//! prepend prose, or leave trailing commas. These helpers recover what they can
//! and fall back to an empty object instead of failing.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid trailing comma regex"));

static FIRST_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-+]?\d*\.?\d+(?:[eE][-+]?\d+)?").expect("valid number regex")
});

static OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^```(?:json)?\s*").expect("valid fence regex"));

/// Extract the first JSON object from a judge reply.
///
/// Returns an empty map when nothing object-shaped can be parsed.
pub fn parse_json_object(text: &str) -> Map<String, Value> {
    let trimmed = strip_code_fence(text.trim());
    if trimmed.is_empty() {
        return Map::new();
    }

    if let Some(obj) = parse_object(trimmed) {
        return obj;
    }

    let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) else {
        return Map::new();
    };
    if end <= start {
        return Map::new();
    }
    let fragment = &trimmed[start..=end];
    if let Some(obj) = parse_object(fragment) {
        return obj;
    }

    let repaired = TRAILING_COMMA.replace_all(fragment, "$1");
    parse_object(&repaired).unwrap_or_default()
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> &str {
    if !text.starts_with("```") {
        return text;
    }
    let body = match OPENING_FENCE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Numeric score in [0, 1] from a JSON value.
///
/// Numbers are used as-is, strings contribute their first numeric literal,
/// anything else scores 0.
pub fn coerce_score(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => FIRST_NUMBER
            .find(s)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0),
        _ => 0.0,
    };
    clip01(raw)
}

/// Clamp to [0, 1]; NaN becomes 0.
pub fn clip01(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// String field of a JSON object, trimmed; empty when absent or not a string.
pub fn str_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Truthiness of a judge-provided flag (`true`, `1`, `"yes"`, `"true"`).
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "y" | "1" | "covered"
        ),
        _ => false,
    }
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
