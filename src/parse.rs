//! Extraction of tool requests from free-form model output
//!
//! The model is asked to reply either with a JSON object
//! `{"tool": "<name>", "input": "<text>"}` or with a plain-text answer. The
//! extraction takes the span from the first `{` to the last `}` and tries to
//! read it as a tool request. Responses that embed unrelated braces (quoted
//! code, for instance) can be misread.

use serde_json::Value;

use crate::types::ParsedAction;

/// Classify a raw model response
pub fn parse_action(raw: &str) -> ParsedAction {
    let Some(span) = brace_span(raw) else {
        return ParsedAction::FinalAnswer {
            text: raw.to_string(),
        };
    };

    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(map)) => match map.get("tool") {
            Some(Value::String(name)) => ParsedAction::ToolCall {
                name: name.clone(),
                input: input_text(map.get("input")),
            },
            _ => ParsedAction::FinalAnswer {
                text: raw.to_string(),
            },
        },
        Ok(_) => ParsedAction::FinalAnswer {
            text: raw.to_string(),
        },
        Err(_) => ParsedAction::Unparseable {
            raw: raw.to_string(),
        },
    }
}

/// Greedy span from the first `{` to the last `}`
fn brace_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn input_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
