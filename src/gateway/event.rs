//! Classification of verified Slack payloads.
//!
//! Payloads are parsed into [`VerifiedEvent`] before any field is read by the
//! handler. Only the handler constructs these, and only after the request
//! signature has been checked.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum VerifiedEvent {
    /// Endpoint ownership handshake; the challenge is echoed verbatim.
    UrlVerification { challenge: Value },
    EventCallback {
        event_type: String,
        text: String,
        channel: String,
        sender_is_bot: bool,
        thread_ts: Option<String>,
    },
    /// Payload is missing a required field. `reason` is the client-facing message.
    Malformed { reason: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    challenge: Option<Value>,
    event: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventBody {
    #[serde(rename = "type")]
    kind: Option<Value>,
    text: Option<Value>,
    channel: Option<Value>,
    bot_id: Option<Value>,
    thread_ts: Option<Value>,
}

impl VerifiedEvent {
    pub(crate) fn classify(payload: Value) -> Self {
        if !payload.is_object() {
            return Self::missing("event");
        }
        let Ok(envelope) = serde_json::from_value::<Envelope>(payload) else {
            return Self::missing("event");
        };

        if envelope.kind.as_deref() == Some("url_verification") {
            return match envelope.challenge {
                Some(challenge) if !challenge.is_null() => Self::UrlVerification { challenge },
                _ => Self::missing("challenge"),
            };
        }

        let event = match envelope.event {
            Some(Value::Object(map)) if !map.is_empty() => map,
            _ => return Self::missing("event"),
        };
        let Ok(body) = serde_json::from_value::<EventBody>(Value::Object(event)) else {
            return Self::missing("event");
        };

        // Bot messages are acknowledged before the content checks.
        let sender_is_bot = body.bot_id.as_ref().is_some_and(is_truthy);
        let event_type = non_empty_str(body.kind.as_ref()).unwrap_or_default();
        if sender_is_bot {
            return Self::EventCallback {
                event_type,
                text: String::new(),
                channel: non_empty_str(body.channel.as_ref()).unwrap_or_default(),
                sender_is_bot,
                thread_ts: non_empty_str(body.thread_ts.as_ref()),
            };
        }

        let Some(text) = non_empty_str(body.text.as_ref()) else {
            return Self::missing("text");
        };
        let Some(channel) = non_empty_str(body.channel.as_ref()) else {
            return Self::missing("channel");
        };

        Self::EventCallback {
            event_type,
            text,
            channel,
            sender_is_bot,
            thread_ts: non_empty_str(body.thread_ts.as_ref()),
        }
    }

    fn missing(field: &str) -> Self {
        Self::Malformed {
            reason: format!("{field} missing"),
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_verification_keeps_challenge() {
        let event = VerifiedEvent::classify(json!({
            "type": "url_verification",
            "challenge": "abc123",
            "token": "legacy"
        }));
        assert_eq!(
            event,
            VerifiedEvent::UrlVerification {
                challenge: json!("abc123")
            }
        );
    }

    #[test]
    fn url_verification_without_challenge_is_malformed() {
        let event = VerifiedEvent::classify(json!({"type": "url_verification"}));
        assert_eq!(
            event,
            VerifiedEvent::Malformed {
                reason: "challenge missing".into()
            }
        );
    }

    #[test]
    fn message_event_is_classified() {
        let event = VerifiedEvent::classify(json!({
            "type": "event_callback",
            "event": {
                "type": "app_mention",
                "text": "<@U1> create an issue",
                "channel": "C123",
                "user": "U2",
                "thread_ts": "1700000000.000100"
            }
        }));
        assert_eq!(
            event,
            VerifiedEvent::EventCallback {
                event_type: "app_mention".into(),
                text: "<@U1> create an issue".into(),
                channel: "C123".into(),
                sender_is_bot: false,
                thread_ts: Some("1700000000.000100".into()),
            }
        );
    }

    #[test]
    fn bot_message_wins_over_missing_text() {
        let event = VerifiedEvent::classify(json!({
            "type": "event_callback",
            "event": {"type": "message", "bot_id": "B1"}
        }));
        assert!(matches!(
            event,
            VerifiedEvent::EventCallback {
                sender_is_bot: true,
                ..
            }
        ));
    }

    #[test]
    fn empty_bot_id_is_not_a_bot() {
        let event = VerifiedEvent::classify(json!({
            "type": "event_callback",
            "event": {"type": "message", "bot_id": "", "text": "hi", "channel": "C1"}
        }));
        assert!(matches!(
            event,
            VerifiedEvent::EventCallback {
                sender_is_bot: false,
                ..
            }
        ));
    }

    #[test]
    fn missing_fields_are_reported_in_order() {
        let cases = [
            (json!({"type": "event_callback"}), "event missing"),
            (json!({"type": "event_callback", "event": {}}), "event missing"),
            (json!({"type": "event_callback", "event": null}), "event missing"),
            (json!(["not", "an", "object"]), "event missing"),
            (
                json!({"event": {"type": "message", "channel": "C1"}}),
                "text missing",
            ),
            (
                json!({"event": {"type": "message", "text": "", "channel": "C1"}}),
                "text missing",
            ),
            (
                json!({"event": {"type": "message", "text": "hi"}}),
                "channel missing",
            ),
        ];
        for (payload, reason) in cases {
            assert_eq!(
                VerifiedEvent::classify(payload.clone()),
                VerifiedEvent::Malformed {
                    reason: reason.into()
                },
                "payload: {payload}"
            );
        }
    }

    #[test]
    fn non_string_text_is_missing() {
        let event = VerifiedEvent::classify(json!({
            "event": {"type": "message", "text": 42, "channel": "C1"}
        }));
        assert_eq!(
            event,
            VerifiedEvent::Malformed {
                reason: "text missing".into()
            }
        );
    }
}
