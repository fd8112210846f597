//! Agent invocation errors

use thiserror::Error;

/// Errors from invoking the agent runtime
#[derive(Debug, Error)]
pub enum AgentError {
    /// Still throttled when the retry budget ran out
    #[error("Agent invocation failed after {attempts} attempts (throttling)")]
    TransientFailure { attempts: u32 },

    /// The runtime ARN/endpoint does not resolve to a runtime
    #[error("Agent runtime not found: {runtime_arn}")]
    Configuration { runtime_arn: String },

    /// Any other downstream failure, with the downstream error code
    #[error("Agent invocation failed: {code}")]
    Upstream { code: String },

    /// Caller-supplied session id is shorter than the runtime accepts
    #[error("Session id must be at least {min} characters (got {len})")]
    InvalidSessionId { len: usize, min: usize },
}

impl AgentError {
    /// Short, stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::TransientFailure { .. } => "transient_failure",
            AgentError::Configuration { .. } => "configuration_error",
            AgentError::Upstream { .. } => "upstream_error",
            AgentError::InvalidSessionId { .. } => "invalid_session_id",
        }
    }
}
