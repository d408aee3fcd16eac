//! Lenient reader for JSON-mode answers: tolerates Markdown code fences and
//! prose around the first balanced JSON object.

use serde_json::Value;

pub fn parse_json_relaxed(input: &str) -> Result<Value, String> {
    let t = strip_code_fences(input.trim());
    if let Ok(v) = serde_json::from_str::<Value>(t) {
        return Ok(v);
    }
    match first_balanced_object(t) {
        Some(s) => serde_json::from_str::<Value>(s)
            .map_err(|e| format!("invalid JSON after balance: {e}")),
        None => Err("no balanced JSON object found".into()),
    }
}

fn strip_code_fences(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop an info string such as `json` up to the end of the fence line.
    let body = match rest.find('\n') {
        Some(nl) if rest[..nl].chars().all(|c| c.is_ascii_alphanumeric()) => &rest[nl + 1..],
        _ => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Slice of the first `{...}` block whose braces balance, ignoring braces
/// inside string literals.
fn first_balanced_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_str = false;
    let mut esc = false;

    for (i, ch) in s[start..].char_indices() {
        if in_str {
            match ch {
                _ if esc => esc = false,
                '\\' => esc = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_str = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}
