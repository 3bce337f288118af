//! Claude Code transcript records
//!
//! Data format: one JSON object per line, e.g.
//! `{"type":"user","message":{"role":"user","content":[{"type":"text","text":"..."}]},"timestamp":"..."}`

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use super::{Role, Turn};

/// Parse one transcript line.
///
/// `Ok(None)` means the line is well-formed but carries no conversational
/// text (summaries, tool results, tool-use-only replies). `Err` means the
/// line is not a JSON object at all.
pub fn parse_record(line: &str) -> Result<Option<Turn>, String> {
    let json: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    if !json.is_object() {
        return Err("record is not a JSON object".to_string());
    }

    let message = json.get("message");

    // Role: type, then role, then message.role
    let role = ["type", "role"]
        .iter()
        .filter_map(|key| json.get(*key).and_then(|v| v.as_str()))
        .find_map(Role::parse)
        .or_else(|| {
            message
                .and_then(|m| m.get("role"))
                .and_then(|v| v.as_str())
                .and_then(Role::parse)
        });

    let role = match role {
        Some(r) => r,
        None => return Ok(None),
    };

    let text = message.map(extract_text).unwrap_or_default();
    if text.is_empty() {
        return Ok(None);
    }

    let timestamp = json
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok());

    Ok(Some(Turn {
        role,
        text,
        timestamp,
    }))
}

/// Text of a message: string content, or the text items of array content
fn extract_text(message: &Value) -> String {
    match message.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                Value::Object(_) if item.get("type").and_then(|t| t.as_str()) == Some("text") => {
                    Some(item.get("text").and_then(|t| t.as_str()).unwrap_or(""))
                }
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_content() {
        let turn = parse_record(
            r#"{"type":"user","message":{"content":"Direct string content"},"timestamp":"2025-01-05T09:00:00Z"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.text, "Direct string content");
        assert_eq!(
            turn.timestamp.unwrap().to_rfc3339(),
            "2025-01-05T09:00:00+00:00"
        );
    }

    #[test]
    fn test_array_content_keeps_only_text() {
        let turn = parse_record(
            r#"{"role":"assistant","message":{"content":[
                {"type":"text","text":"Part 1"},
                {"type":"tool_use","name":"Read","input":{}},
                {"type":"thinking","thinking":"hmm"},
                {"type":"text","text":"Part 2"}
            ]}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.text, "Part 1\nPart 2");
        assert!(turn.timestamp.is_none());
    }

    #[test]
    fn test_role_from_message() {
        let turn = parse_record(r#"{"message":{"role":"user","content":"hi"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(turn.role, Role::User);
    }

    #[test]
    fn test_non_conversational_records_are_ignored() {
        assert!(parse_record(r#"{"type":"summary","summary":"x"}"#)
            .unwrap()
            .is_none());
        assert!(parse_record(
            r#"{"type":"user","message":{"content":[{"type":"tool_result","content":"ok"}]}}"#
        )
        .unwrap()
        .is_none());
        assert!(parse_record(r#"{"type":"assistant","message":{"content":[]}}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_malformed_lines() {
        assert!(parse_record("{ not json").is_err());
        assert!(parse_record("[1, 2]").is_err());
        assert!(parse_record("\"user\"").is_err());
    }
}
