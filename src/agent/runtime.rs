//! Transport to the remote agent runtime.
//!
//! [`AgentRuntime`] is one raw call with no retries; the retry policy lives in
//! [`super::AgentCoreClient`]. [`HttpAgentRuntime`] speaks the AgentCore
//! `InvokeAgentRuntime` REST shape.

use crate::config::AgentConfig;
use crate::util::short_error_code;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Header carrying the runtime session id.
pub const SESSION_ID_HEADER: &str = "X-Amzn-Bedrock-AgentCore-Runtime-Session-Id";
const ERROR_TYPE_HEADER: &str = "x-amzn-ErrorType";

pub const THROTTLING_EXCEPTION: &str = "ThrottlingException";
pub const RESOURCE_NOT_FOUND_EXCEPTION: &str = "ResourceNotFoundException";

/// Raw successful response: the body is decoded later according to its content type.
#[derive(Debug, Clone)]
pub struct RuntimeResponse {
    pub content_type: String,
    pub body: String,
}

impl RuntimeResponse {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            content_type: "application/json".into(),
            body: body.into(),
        }
    }

    pub fn event_stream(body: impl Into<String>) -> Self {
        Self {
            content_type: "text/event-stream".into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    Throttling,
    ResourceNotFound,
    Other,
}

/// A failed runtime call, classified by its error code.
#[derive(Debug, Clone, Error)]
#[error("{code}")]
pub struct RuntimeCallError {
    pub kind: RuntimeErrorKind,
    pub code: String,
}

impl RuntimeCallError {
    pub fn from_code(code: impl Into<String>) -> Self {
        let code = code.into();
        let kind = match code.as_str() {
            THROTTLING_EXCEPTION | "TooManyRequestsException" => RuntimeErrorKind::Throttling,
            RESOURCE_NOT_FOUND_EXCEPTION => RuntimeErrorKind::ResourceNotFound,
            _ => RuntimeErrorKind::Other,
        };
        Self { kind, code }
    }

    pub fn throttling() -> Self {
        Self::from_code(THROTTLING_EXCEPTION)
    }

    pub fn resource_not_found() -> Self {
        Self::from_code(RESOURCE_NOT_FOUND_EXCEPTION)
    }
}

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Issue one invocation with a JSON `payload` under `session_id`.
    async fn invoke_agent_runtime(
        &self,
        runtime_arn: &str,
        session_id: &str,
        payload: &str,
    ) -> Result<RuntimeResponse, RuntimeCallError>;
}

pub struct HttpAgentRuntime {
    client: reqwest::Client,
    endpoint: String,
    qualifier: String,
}

impl HttpAgentRuntime {
    pub fn new(endpoint: &str, qualifier: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim().trim_end_matches('/').to_string(),
            qualifier: qualifier.to_string(),
        })
    }

    pub fn from_config(config: &AgentConfig) -> reqwest::Result<Self> {
        Self::new(
            &config.resolved_endpoint(),
            &config.qualifier,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn invocation_url(&self, runtime_arn: &str) -> String {
        format!(
            "{}/runtimes/{}/invocations?qualifier={}",
            self.endpoint,
            urlencoding::encode(runtime_arn),
            urlencoding::encode(&self.qualifier)
        )
    }
}

#[async_trait]
impl AgentRuntime for HttpAgentRuntime {
    async fn invoke_agent_runtime(
        &self,
        runtime_arn: &str,
        session_id: &str,
        payload: &str,
    ) -> Result<RuntimeResponse, RuntimeCallError> {
        let resp = self
            .client
            .post(self.invocation_url(runtime_arn))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
            .header(SESSION_ID_HEADER, session_id)
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Agent runtime request failed: {e}");
                RuntimeCallError::from_code(if e.is_timeout() {
                    "RequestTimeout"
                } else {
                    "NetworkError"
                })
            })?;

        let status = resp.status();
        let header_code = resp
            .headers()
            .get(ERROR_TYPE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| short_error_code(v).to_string())
            .filter(|v| !v.is_empty());
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = resp.text().await.map_err(|e| {
            tracing::warn!("Agent runtime response body read failed: {e}");
            RuntimeCallError::from_code("ResponseReadError")
        })?;

        if !status.is_success() {
            return Err(RuntimeCallError::from_code(error_code(
                status,
                header_code,
                &body,
            )));
        }

        Ok(RuntimeResponse { content_type, body })
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    code: Option<String>,
}

/// Error code from, in order: `x-amzn-ErrorType`, body `__type`/`code`, HTTP status.
fn error_code(status: StatusCode, header_code: Option<String>, body: &str) -> String {
    if let Some(code) = header_code {
        return code;
    }
    let body_code = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|e| e.kind.or(e.code))
        .map(|raw| short_error_code(&raw).to_string())
        .filter(|v| !v.is_empty());
    if let Some(code) = body_code {
        return code;
    }
    match status {
        StatusCode::TOO_MANY_REQUESTS => THROTTLING_EXCEPTION.to_string(),
        StatusCode::NOT_FOUND => RESOURCE_NOT_FOUND_EXCEPTION.to_string(),
        other => format!("HTTP {}", other.as_u16()),
    }
}
