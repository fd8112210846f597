//! Decoding of runtime responses into reply content.

use super::AgentError;
use serde_json::Value;

/// Reply payload as returned by the runtime's `result` field.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyContent {
    Text(String),
    /// Structured agent output, typically `{"role": ..., "content": [{"text": ...}]}`.
    Structured(Value),
}

impl ReplyContent {
    /// Plain text for delivery. Structured content with text blocks is
    /// flattened into newline-joined text; anything else is rendered as compact JSON.
    pub fn to_text(&self) -> String {
        match self {
            ReplyContent::Text(text) => text.clone(),
            ReplyContent::Structured(value) => {
                let blocks: Vec<&str> = value
                    .get("content")
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|item| item.get("text").and_then(Value::as_str))
                            .filter(|text| !text.is_empty())
                            .collect()
                    })
                    .unwrap_or_default();
                if blocks.is_empty() {
                    value.to_string()
                } else {
                    blocks.join("\n")
                }
            }
        }
    }
}

/// Decode a successful runtime body according to its content type.
pub fn decode_response(content_type: &str, body: &str) -> Result<ReplyContent, AgentError> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if mime == "text/event-stream" {
        return Ok(decode_event_stream(body));
    }

    if mime.is_empty() || mime == "application/json" || mime.ends_with("+json") {
        let value: Value = serde_json::from_str(body).map_err(|e| {
            tracing::warn!("Agent runtime returned invalid JSON: {e}");
            AgentError::Upstream {
                code: "InvalidResponsePayload".into(),
            }
        })?;
        return Ok(extract_result(value));
    }

    Err(AgentError::Upstream {
        code: "UnsupportedContentType".into(),
    })
}

fn extract_result(value: Value) -> ReplyContent {
    match value {
        Value::String(text) => ReplyContent::Text(text),
        Value::Object(mut map) => match map.remove("result") {
            Some(Value::String(text)) => ReplyContent::Text(text),
            None | Some(Value::Null) => ReplyContent::Text(String::new()),
            Some(other) => ReplyContent::Structured(other),
        },
        _ => ReplyContent::Text(String::new()),
    }
}

/// Join every `data:` line of an SSE body and decode the result.
///
/// The joined payload is tried as one JSON document first. Failing that, each
/// line is taken as a JSON string fragment when it parses as one, or as raw text.
fn decode_event_stream(body: &str) -> ReplyContent {
    let lines: Vec<&str> = body
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();

    let joined = lines.concat();
    if let Ok(value) = serde_json::from_str::<Value>(&joined) {
        if value.is_object() {
            return extract_result(value);
        }
    }

    let text: String = lines
        .iter()
        .map(|line| match serde_json::from_str::<Value>(line) {
            Ok(Value::String(fragment)) => fragment,
            _ => (*line).to_string(),
        })
        .collect();
    ReplyContent::Text(text)
}
