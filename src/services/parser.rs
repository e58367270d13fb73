//! Tolerant extraction of a JSON object from free-form model output.
//!
//! Models wrap their answer in reasoning blocks, Markdown fences or chatty
//! prose, and occasionally lose the opening brace. Everything here is total:
//! any input yields either a value or a `StageError`, never a panic.

use crate::core::error::StageError;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

pub fn parse_model_json(raw: &str) -> Result<Value, StageError> {
    let cleaned = strip_code_blocks(&strip_think(raw));

    let key_pos = first_key_position(&cleaned);
    let brace_pos = cleaned.find('{');
    let lost_opening_brace = match (key_pos, brace_pos) {
        (Some(k), Some(b)) => k < b,
        (Some(_), None) => true,
        _ => false,
    };

    if lost_opening_brace {
        if let Some(value) = recover_missing_brace(&cleaned) {
            return Ok(value);
        }
    }

    let mut found_span = false;
    for (start, end) in balanced_objects(&cleaned) {
        found_span = true;
        if let Ok(value) = serde_json::from_str::<Value>(&cleaned[start..end]) {
            return Ok(value);
        }
    }

    if !found_span && !lost_opening_brace {
        if let Some(value) = recover_missing_brace(&cleaned) {
            return Ok(value);
        }
    }

    debug!("Unparseable model output: {}", cleaned);
    Err(StageError::Parse {
        message: if found_span {
            "matched object is not valid JSON".to_string()
        } else {
            "no JSON object found".to_string()
        },
        cleaned,
    })
}

/// Parses and then deserializes into `T`; shape mismatches are validation errors.
pub fn parse_model_as<T: DeserializeOwned>(raw: &str) -> Result<T, StageError> {
    let value = parse_model_json(raw)?;
    serde_json::from_value(value)
        .map_err(|e| StageError::validation(format!("unexpected response shape: {}", e)))
}

/// Removes `<think>…</think>` regions. An unterminated opener drops the rest
/// of the text; a closer with no opener drops everything before it.
pub fn strip_think(s: &str) -> String {
    let mut rest = s;
    if let Some(close) = rest.find(THINK_CLOSE) {
        let opened_before = rest.find(THINK_OPEN).is_some_and(|open| open < close);
        if !opened_before {
            rest = &rest[close + THINK_CLOSE.len()..];
        }
    }

    let mut out = String::with_capacity(rest.len());
    while let Some(open) = rest.find(THINK_OPEN) {
        out.push_str(&rest[..open]);
        let after = &rest[open + THINK_OPEN.len()..];
        match after.find(THINK_CLOSE) {
            Some(close) => rest = &after[close + THINK_CLOSE.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Removes every Markdown fence, including a language tag on the opener.
pub fn strip_code_blocks(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(idx) = rest.find("```") {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 3..];
        let lang_len: usize = after
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .map(char::len_utf8)
            .sum();
        let tail = &after[lang_len..];
        rest = if tail.is_empty() || tail.starts_with(char::is_whitespace) {
            tail
        } else {
            after
        };
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Candidate `{…}` spans, one per opening brace that closes, in order.
fn balanced_objects(s: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut search_from = 0;
    while let Some(offset) = s[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = matching_brace(s, start) {
            spans.push((start, end));
        }
        search_from = start + 1;
    }
    spans
}

/// Returns the exclusive end of the object opened at `start`.
fn matching_brace(s: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s[start..].char_indices() {
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
                    return Some(start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Position of the first `"name":` pair in the text.
fn first_key_position(s: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(offset) = s[from..].find('"') {
        let open = from + offset;
        let close = open + 1 + s[open + 1..].find('"')?;
        if close > open + 1 && s[close + 1..].trim_start().starts_with(':') {
            return Some(open);
        }
        from = close + 1;
    }
    None
}

fn recover_missing_brace(s: &str) -> Option<Value> {
    let key = first_key_position(s)?;
    let last = s.rfind('}')?;
    if last < key {
        return None;
    }
    let candidate = format!("{{{}", &s[key..=last]);
    match serde_json::from_str::<Value>(&candidate) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_plain_object() {
        let v = parse_model_json(r#"{"prompts": ["a", "b"]}"#).unwrap();
        assert_eq!(v, json!({"prompts": ["a", "b"]}));
    }

    #[test]
    fn test_think_block_and_fences_are_removed() {
        let raw = "<think>The user wants {\"bogus\": true} maybe</think>\n```json\n{\"name\": \"Kai\"}\n```";
        let v = parse_model_json(raw).unwrap();
        assert_eq!(v, json!({"name": "Kai"}));
    }

    #[test]
    fn test_prose_around_object() {
        let raw = "Sure! Here is the result:\n{\"a\": {\"b\": \"}\"}}\nHope that helps.";
        let v = parse_model_json(raw).unwrap();
        assert_eq!(v, json!({"a": {"b": "}"}}));
    }

    #[test]
    fn test_missing_leading_brace_is_recovered() {
        let raw = "\"prompts\": [\"one\", \"two\"], \"styleLabels\": [\"A\", \"B\"]}";
        let v = parse_model_json(raw).unwrap();
        assert_eq!(v["prompts"], json!(["one", "two"]));
        assert_eq!(v["styleLabels"], json!(["A", "B"]));
    }

    #[test]
    fn test_missing_leading_brace_with_nested_object() {
        let raw = "```json\n\"image_analysis\": {\"mood\": \"dark\"}, \"recommended_relationship\": \"Rival\"}\n```";
        let v = parse_model_json(raw).unwrap();
        assert_eq!(v["image_analysis"]["mood"], "dark");
        assert_eq!(v["recommended_relationship"], "Rival");
    }

    #[test]
    fn test_skips_non_json_brace_in_prose() {
        let raw = "Using template {scene} now: {\"ok\": 1}";
        let v = parse_model_json(raw).unwrap();
        assert_eq!(v, json!({"ok": 1}));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        for raw in ["", "no json here", "{ not: valid", "<think>{\"a\":1}</think>", "}}}{{{"] {
            match parse_model_json(raw) {
                Err(StageError::Parse { .. }) => {}
                other => panic!("expected parse error for {:?}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_parse_error_carries_cleaned_text() {
        let err = parse_model_json("<think>hmm</think>```\nsorry, cannot help\n```").unwrap_err();
        match err {
            StageError::Parse { cleaned, .. } => assert_eq!(cleaned, "sorry, cannot help"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_think_and_stray_close() {
        assert_eq!(strip_think("keep <think>drop everything"), "keep ");
        assert_eq!(strip_think("reasoning...</think>{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_think("a<think>x</think>b<think>y</think>c"), "abc");
    }

    #[test]
    fn test_strip_code_blocks_keeps_inner_text() {
        assert_eq!(strip_code_blocks("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("plain"), "plain");
    }

    #[test]
    fn test_parse_model_as_reports_shape_mismatch() {
        #[derive(Deserialize, Debug)]
        struct Out {
            #[allow(dead_code)]
            prompts: Vec<String>,
        }
        let err = parse_model_as::<Out>(r#"{"prompts": "not a list"}"#).unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(parse_model_as::<Out>(r#"{"prompts": ["x"]}"#).is_ok());
    }

    #[test]
    fn test_multibyte_text_does_not_panic() {
        let raw = "角色分析：\"名字\": \"明月\"}";
        let v = parse_model_json(raw).unwrap();
        assert_eq!(v["名字"], "明月");
        assert!(parse_model_json("中文```").is_err());
    }
}
