//! Pulling JSON out of model text.
//!
//! Models wrap answers in code fences or surround them with prose. These
//! helpers strip a leading fence and take the widest `{...}` or `[...]` span.

use serde_json::Value;

/// Remove a surrounding markdown code fence and an optional `json` tag
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let inner = trimmed.trim_matches('`');
    let inner = match inner.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => inner[4..].trim_start(),
        _ => inner,
    };
    inner.trim()
}

fn widest_span(text: &str, open: char, close: char) -> Option<&str> {
    let text = strip_fences(text);
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// First `{` through last `}`
pub fn extract_object(text: &str) -> Option<&str> {
    widest_span(text, '{', '}')
}

/// First `[` through last `]`
pub fn extract_array(text: &str) -> Option<&str> {
    widest_span(text, '[', ']')
}

/// Extract and parse a JSON object, reporting failures as plain strings for
/// use as a parse-failure reason
pub fn parse_object(text: &str) -> Result<serde_json::Map<String, Value>, String> {
    let raw = extract_object(text).ok_or_else(|| "response contained no JSON object".to_string())?;
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("response JSON is not an object".to_string()),
        Err(e) => Err(format!("invalid JSON object: {e}")),
    }
}
