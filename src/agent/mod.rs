//! Agent runtime invocation with session identity and throttling backoff.

pub mod error;
pub mod reply;
pub mod runtime;

use crate::config::AgentConfig;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use error::AgentError;
pub use reply::{decode_response, ReplyContent};
pub use runtime::{
    AgentRuntime, HttpAgentRuntime, RuntimeCallError, RuntimeErrorKind, RuntimeResponse,
};

/// Shortest session id the runtime accepts.
pub const MIN_SESSION_ID_LEN: usize = 33;

/// Opaque runtime session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Two random v4 UUIDs joined by `-` (73 characters).
    pub fn generate() -> Self {
        Self(format!("{}-{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4()))
    }

    /// Accept a caller-supplied continuation id.
    pub fn parse(raw: impl Into<String>) -> Result<Self, AgentError> {
        let raw = raw.into();
        let len = raw.chars().count();
        if len < MIN_SESSION_ID_LEN {
            return Err(AgentError::InvalidSessionId {
                len,
                min: MIN_SESSION_ID_LEN,
            });
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct AgentReply {
    pub content: ReplyContent,
    pub session_id: SessionId,
}

impl AgentReply {
    /// Reply flattened to deliverable text.
    pub fn text(&self) -> String {
        self.content.to_text()
    }
}

/// Delay before retry number `attempt + 1`: `base * 2^attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

pub struct AgentCoreClient {
    runtime: Arc<dyn AgentRuntime>,
    runtime_arn: String,
    max_retries: u32,
    base_delay: Duration,
}

impl AgentCoreClient {
    pub fn new(runtime: Arc<dyn AgentRuntime>, runtime_arn: impl Into<String>) -> Self {
        Self {
            runtime,
            runtime_arn: runtime_arn.into(),
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_retry_policy(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    pub fn from_config(config: &AgentConfig) -> anyhow::Result<Self> {
        let runtime = HttpAgentRuntime::from_config(config)?;
        Ok(Self::new(Arc::new(runtime), config.runtime_arn.clone())
            .with_retry_policy(config.max_retries, config.base_delay()))
    }

    pub fn runtime_arn(&self) -> &str {
        &self.runtime_arn
    }

    /// Invoke with the configured retry budget.
    pub async fn invoke(
        &self,
        prompt: &str,
        session_id: Option<SessionId>,
    ) -> Result<AgentReply, AgentError> {
        self.invoke_with_retries(prompt, session_id, self.max_retries)
            .await
    }

    /// Invoke the runtime, retrying only on throttling.
    ///
    /// `max_retries` is the total number of attempts. A throttled attempt that
    /// still has budget left sleeps `base_delay * 2^attempt` first; the last
    /// throttled attempt yields [`AgentError::TransientFailure`].
    pub async fn invoke_with_retries(
        &self,
        prompt: &str,
        session_id: Option<SessionId>,
        max_retries: u32,
    ) -> Result<AgentReply, AgentError> {
        let session_id = session_id.unwrap_or_else(SessionId::generate);
        let payload = serde_json::json!({ "prompt": prompt }).to_string();
        let max_attempts = max_retries.max(1);

        let mut attempt = 0;
        loop {
            let result = self
                .runtime
                .invoke_agent_runtime(&self.runtime_arn, session_id.as_str(), &payload)
                .await;

            match result {
                Ok(response) => {
                    debug!(
                        attempt = attempt + 1,
                        content_type = %response.content_type,
                        "Agent runtime invocation succeeded"
                    );
                    let content = decode_response(&response.content_type, &response.body)?;
                    return Ok(AgentReply {
                        content,
                        session_id,
                    });
                }
                Err(e) if e.kind == RuntimeErrorKind::Throttling && attempt + 1 < max_attempts => {
                    let delay = backoff_delay(self.base_delay, attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        retry_delay_ms = delay.as_millis() as u64,
                        "Agent runtime throttled, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(match e.kind {
                        RuntimeErrorKind::Throttling => AgentError::TransientFailure {
                            attempts: attempt + 1,
                        },
                        RuntimeErrorKind::ResourceNotFound => AgentError::Configuration {
                            runtime_arn: self.runtime_arn.clone(),
                        },
                        RuntimeErrorKind::Other => AgentError::Upstream { code: e.code },
                    });
                }
            }
        }
    }
}
