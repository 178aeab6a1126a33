//! Model output parsing
//!
//! Models asked for JSON still wrap it in code fences, prose, or cut it
//! short. `parse_model_json` recovers the object when that is possible and
//! reports an upstream failure when it is not.

use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{ArchError, Result};

/// Parse a JSON value out of raw model text.
pub fn parse_model_json(raw: &str) -> Result<Value> {
    let cleaned = strip_code_fences(raw.trim().trim_start_matches('\u{feff}'));

    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return Ok(value);
    }
    debug!("Model output is not plain JSON, attempting recovery");

    let candidate = extract_embedded(&cleaned).unwrap_or(&cleaned);
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        warn!("JSON extracted from surrounding text");
        return Ok(value);
    }

    let repaired = close_open_structures(&remove_trailing_commas(candidate));
    serde_json::from_str::<Value>(&repaired).map_err(|e| {
        ArchError::upstream(
            "inference",
            format!(
                "unparseable model output ({}): {}",
                e,
                cleaned.chars().take(200).collect::<String>()
            ),
        )
    })
}

fn strip_code_fences(s: &str) -> String {
    let mut body = s;
    if body.starts_with("```")
        && let Some(newline) = body.find('\n')
    {
        body = &body[newline + 1..];
    }
    body.trim_end().trim_end_matches("```").trim().to_string()
}

/// Lexer state shared by the scanners below; tracks string literals and escapes.
#[derive(Default)]
struct Scan {
    in_string: bool,
    escape: bool,
}

impl Scan {
    /// Feed one char; returns true when it is structural (outside a string).
    fn structural(&mut self, ch: char) -> bool {
        if self.escape {
            self.escape = false;
            return false;
        }
        match ch {
            '\\' if self.in_string => {
                self.escape = true;
                false
            }
            '"' => {
                self.in_string = !self.in_string;
                false
            }
            _ => !self.in_string,
        }
    }
}

/// First balanced `{...}` or `[...]` span in mixed content.
fn extract_embedded(s: &str) -> Option<&str> {
    let start = s.find(['{', '['])?;
    let mut scan = Scan::default();
    let mut depth = 0i32;

    for (i, ch) in s[start..].char_indices() {
        if !scan.structural(ch) {
            continue;
        }
        match ch {
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    Some(&s[start..])
}

fn remove_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut scan = Scan::default();

    for (i, &ch) in chars.iter().enumerate() {
        if scan.structural(ch) && ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some(']') | Some('}')) {
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// Close an unterminated string and any unclosed brackets, innermost first.
fn close_open_structures(s: &str) -> String {
    let mut stack = Vec::new();
    let mut scan = Scan::default();

    for ch in s.chars() {
        if !scan.structural(ch) {
            continue;
        }
        match ch {
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = s.trim_end().trim_end_matches(',').to_string();
    if scan.in_string {
        out.push('"');
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        let value = parse_model_json(r#"{"answer": "ok"}"#).unwrap();
        assert_eq!(value["answer"], "ok");
    }

    #[test]
    fn test_code_fence() {
        let raw = "```json\n{\"tool_calls\": []}\n```";
        assert_eq!(parse_model_json(raw).unwrap(), json!({"tool_calls": []}));
    }

    #[test]
    fn test_prose_around_json() {
        let raw = "Sure! Here is the plan: {\"answer\": \"use {braces}\"} Hope it helps.";
        let value = parse_model_json(raw).unwrap();
        assert_eq!(value["answer"], "use {braces}");
    }

    #[test]
    fn test_trailing_comma() {
        let value = parse_model_json(r#"{"items": [1, 2, 3,],}"#).unwrap();
        assert_eq!(value["items"], json!([1, 2, 3]));
    }

    #[test]
    fn test_truncated_output() {
        let value = parse_model_json(r#"{"tool_calls": [{"tool": "drill_up", "args": {"#).unwrap();
        assert_eq!(value["tool_calls"][0]["tool"], "drill_up");
    }

    #[test]
    fn test_truncated_string() {
        let value = parse_model_json(r#"{"answer": "The checkout service"#).unwrap();
        assert_eq!(value["answer"], "The checkout service");
    }

    #[test]
    fn test_garbage_is_upstream_error() {
        let err = parse_model_json("I cannot help with that.").unwrap_err();
        assert!(matches!(err, ArchError::Upstream { .. }));
    }
}
