use serde_json::{Map, Value};

/// Unwraps a verdict or judge answer that the model wrapped in a markdown
/// code fence, dropping the `json` language tag.
pub(crate) fn strip_code_fence(text: &str) -> String {
    let raw = text.trim();
    let Some(inner) = raw
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return raw.to_string();
    };
    // The opening line only carries the language tag.
    let body = match inner.split_once('\n') {
        Some((_, body)) => body.trim(),
        None => inner.trim(),
    };
    match body.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => body[4..].trim().to_string(),
        _ => body.to_string(),
    }
}

/// First well-formed JSON object in a model response.
///
/// Tolerates markdown fences and prose around the object. Braces inside
/// string literals do not count towards nesting.
pub fn extract_json_object_from_text(text: &str) -> Option<Map<String, Value>> {
    let raw = strip_code_fence(text);
    if raw.trim().is_empty() {
        return None;
    }
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(&raw) {
        return Some(object);
    }
    for (start, ch) in raw.char_indices() {
        if ch != '{' {
            continue;
        }
        let Some(end) = matching_brace(&raw, start) else {
            continue;
        };
        if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(&raw[start..=end]) {
            return Some(object);
        }
    }
    None
}

fn matching_brace(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}
