//! Slack Events ingress: verify, classify, invoke the agent, reply.
//!
//! [`IngressHandler::handle`] is a request → response function. It keeps no
//! state between calls apart from the shared credential cache, and every
//! failure maps to a fixed status and a minimal JSON body. Nothing from a
//! downstream error reaches the caller.

use crate::agent::AgentCoreClient;
use crate::channels::{Channel, SendMessage};
use crate::config::Config;
use crate::credentials::CredentialCache;
use crate::gateway::event::VerifiedEvent;
use crate::logging::GatewayLog;
use crate::security::verify_slack_signature_at;
use crate::util::truncate_with_ellipsis;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use base64::Engine as _;
use serde_json::{json, Value};
use std::sync::Arc;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

const LOG_PREVIEW_CHARS: usize = 50;

/// One inbound request as the transport delivered it.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub headers: HeaderMap,
    /// Raw body bytes; only decoded after the header check.
    pub body: Vec<u8>,
    /// Body is base64 text that must be decoded before verification.
    pub is_base64_encoded: bool,
}

impl InboundRequest {
    pub fn raw(headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers,
            body: body.into(),
            is_base64_encoded: false,
        }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn decoded_body(&self) -> anyhow::Result<String> {
        let text = std::str::from_utf8(&self.body)?;
        if !self.is_base64_encoded {
            return Ok(text.to_string());
        }
        let bytes = base64::engine::general_purpose::STANDARD.decode(text.trim())?;
        Ok(String::from_utf8(bytes)?)
    }
}

/// Status plus JSON body, independent of the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl GatewayResponse {
    pub fn ok() -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({"ok": true}),
        }
    }

    pub fn challenge(challenge: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({ "challenge": challenge }),
        }
    }

    pub fn error(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
        }
    }

    pub fn internal_error() -> Self {
        Self::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub struct IngressHandler {
    credentials: Arc<CredentialCache>,
    agent: Arc<AgentCoreClient>,
    channel: Arc<dyn Channel>,
    log: GatewayLog,
    signing_secret_param: String,
    fallback_reply: String,
    clock: fn() -> i64,
}

impl IngressHandler {
    pub fn new(
        credentials: Arc<CredentialCache>,
        agent: Arc<AgentCoreClient>,
        channel: Arc<dyn Channel>,
        signing_secret_param: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            agent,
            channel,
            log: GatewayLog::default(),
            signing_secret_param: signing_secret_param.into(),
            fallback_reply: crate::config::DEFAULT_FALLBACK_REPLY.to_string(),
            clock: unix_now,
        }
    }

    pub fn from_config(
        config: &Config,
        credentials: Arc<CredentialCache>,
        agent: Arc<AgentCoreClient>,
        channel: Arc<dyn Channel>,
    ) -> Self {
        Self::new(
            credentials,
            agent,
            channel,
            config.slack.signing_secret_param.clone(),
        )
        .with_fallback_reply(config.slack.fallback_reply.clone())
    }

    pub fn with_log(mut self, log: GatewayLog) -> Self {
        self.log = log;
        self
    }

    pub fn with_fallback_reply(mut self, reply: impl Into<String>) -> Self {
        self.fallback_reply = reply.into();
        self
    }

    /// Override the Unix-seconds clock used for the freshness check.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    pub async fn handle(&self, request: InboundRequest) -> GatewayResponse {
        let (Some(signature), Some(timestamp)) = (
            request.header(SIGNATURE_HEADER),
            request.header(TIMESTAMP_HEADER),
        ) else {
            self.log
                .error("Missing required headers (x-slack-signature or x-slack-request-timestamp)");
            return GatewayResponse::error(StatusCode::BAD_REQUEST, "Missing required headers");
        };

        let body = match request.decoded_body() {
            Ok(body) => body,
            Err(e) => {
                self.log.error(format!("Failed to decode request body: {e}"));
                return GatewayResponse::internal_error();
            }
        };

        let secret = match self.credentials.get(&self.signing_secret_param).await {
            Ok(secret) => secret,
            Err(e) => {
                self.log.error(format!("Failed to load signing secret: {e}"));
                return GatewayResponse::internal_error();
            }
        };

        if !verify_slack_signature_at(&body, timestamp, signature, &secret, (self.clock)()) {
            self.log.warn(format!(
                "Signature verification failed for timestamp: {timestamp}"
            ));
            return GatewayResponse::error(StatusCode::UNAUTHORIZED, "Invalid signature");
        }

        let payload: Value = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(e) => {
                self.log.warn(format!("Invalid JSON payload: {e}"));
                return GatewayResponse::error(StatusCode::BAD_REQUEST, "Invalid JSON payload");
            }
        };
        self.log.info(format!(
            "Received payload type: {}",
            payload.get("type").and_then(Value::as_str).unwrap_or("unknown")
        ));

        match VerifiedEvent::classify(payload) {
            VerifiedEvent::UrlVerification { challenge } => {
                self.log.info("Handling URL verification");
                GatewayResponse::challenge(challenge)
            }
            VerifiedEvent::Malformed { reason } => {
                self.log.error(format!("Rejecting event: {reason}"));
                GatewayResponse::error(StatusCode::BAD_REQUEST, &reason)
            }
            VerifiedEvent::EventCallback {
                sender_is_bot: true,
                ..
            } => {
                self.log.info("Ignoring bot message to prevent loops");
                GatewayResponse::ok()
            }
            VerifiedEvent::EventCallback {
                event_type,
                text,
                channel,
                thread_ts,
                ..
            } => {
                self.dispatch(&event_type, &text, &channel, thread_ts)
                    .await
            }
        }
    }

    async fn dispatch(
        &self,
        event_type: &str,
        text: &str,
        channel: &str,
        thread_ts: Option<String>,
    ) -> GatewayResponse {
        self.log.info(format!(
            "Invoking agent for {event_type} in {channel}: {}",
            truncate_with_ellipsis(text, LOG_PREVIEW_CHARS)
        ));

        let reply = match self.agent.invoke(text, None).await {
            Ok(reply) => reply,
            Err(e) => {
                self.log
                    .error(format!("Agent invocation failed ({}): {e}", e.kind()));
                return GatewayResponse::internal_error();
            }
        };

        let mut reply_text = reply.text();
        self.log.info(format!(
            "Agent response (session {}): {}",
            reply.session_id,
            truncate_with_ellipsis(&reply_text, LOG_PREVIEW_CHARS)
        ));
        if reply_text.trim().is_empty() {
            reply_text = self.fallback_reply.clone();
        }

        let message = SendMessage::new(reply_text, channel).in_thread(thread_ts);
        match self.channel.send(&message).await {
            Ok(()) => self
                .log
                .info(format!("Posted reply to {channel} via {}", self.channel.name())),
            Err(e) => self
                .log
                .error(format!("Failed to send reply to {channel}: {e:#}")),
        }

        GatewayResponse::ok()
    }
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
