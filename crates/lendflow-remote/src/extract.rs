//! Pull a JSON object out of free-form model output
//!
//! Replies come back bare, wrapped in a ```json fence, or surrounded by prose.
//! Extraction strips an optional fence and then takes the first balanced
//! `{ ... }` span that parses as an object.

use serde_json::Value;

/// No JSON object could be recovered from a reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unparsable response: no JSON object found in {excerpt:?}")]
pub struct UnparsableResponse {
    pub excerpt: String,
}

impl UnparsableResponse {
    fn from_text(text: &str) -> Self {
        Self {
            excerpt: text.chars().take(120).collect(),
        }
    }
}

pub fn extract_json_object(text: &str) -> Result<Value, UnparsableResponse> {
    let body = strip_fence(text);
    if let Some(v) = first_object(body) {
        return Ok(v);
    }
    if body.len() != text.len() {
        if let Some(v) = first_object(text) {
            return Ok(v);
        }
    }
    Err(UnparsableResponse::from_text(text))
}

fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };
    let mut inner = &trimmed[open + 3..];
    // language tag on the opening line
    if let Some(nl) = inner.find('\n') {
        if inner[..nl].trim().chars().all(|c| c.is_ascii_alphanumeric()) {
            inner = &inner[nl + 1..];
        }
    }
    match inner.find("```") {
        Some(close) => inner[..close].trim(),
        None => inner.trim(),
    }
}

fn first_object(s: &str) -> Option<Value> {
    let mut from = 0;
    while let Some(rel) = s[from..].find('{') {
        let start = from + rel;
        if let Some(len) = balanced_len(&s[start..]) {
            if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(&s[start..start + len]) {
                return Some(v);
            }
        }
        from = start + 1;
    }
    None
}

/// Byte length of the brace-balanced span at the start of `s`.
fn balanced_len(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
