//! Extraction paths
//!
//! Supports the dotted JSONPath subset used in source configs:
//! `$`, `.name`, `['name']`, `["name"]` and `[index]`, e.g. `$.data[0].price`.
//! Paths are translated to JSON Pointer and evaluated with `serde_json`.

use crate::error::ExtractError;
use serde_json::Value;

/// Translate a JSONPath expression into an RFC 6901 JSON Pointer
pub fn to_json_pointer(path: &str) -> Result<String, ExtractError> {
    let invalid = |reason: &str| ExtractError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let rest = path.trim().strip_prefix('$').ok_or_else(|| invalid("must start with '$'"))?;
    let chars: Vec<char> = rest.chars().collect();
    let mut pointer = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
                    end += 1;
                }
                if end == start {
                    return Err(invalid("empty segment after '.'"));
                }
                push_token(&mut pointer, &chars[start..end].iter().collect::<String>());
                i = end;
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|offset| i + offset)
                    .ok_or_else(|| invalid("unterminated '['"))?;
                let inner: String = chars[i + 1..close].iter().collect();
                let inner = inner.trim();

                let token = if let Some(quoted) = strip_quotes(inner) {
                    quoted.to_string()
                } else if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit()) {
                    inner.to_string()
                } else {
                    return Err(invalid("bracket must hold an index or a quoted name"));
                };
                push_token(&mut pointer, &token);
                i = close + 1;
            }
            _ => return Err(invalid("expected '.' or '['")),
        }
    }

    Ok(pointer)
}

/// Evaluate `path` against `document`, returning the selected value
pub fn lookup<'a>(document: &'a Value, field: &str, path: &str) -> Result<&'a Value, ExtractError> {
    let pointer = to_json_pointer(path)?;
    document.pointer(&pointer).ok_or_else(|| ExtractError::PathNotFound {
        field: field.to_string(),
        path: path.to_string(),
    })
}

fn strip_quotes(s: &str) -> Option<&str> {
    s.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
}

fn push_token(pointer: &mut String, token: &str) {
    pointer.push('/');
    pointer.push_str(&token.replace('~', "~0").replace('/', "~1"));
}
