//! Axum-based HTTP gateway with body limits and timeouts.
//!
//! Two transports feed the same [`IngressHandler`]:
//! - `POST /slack/events` takes the raw Slack request
//! - `POST /invoke` takes a Function-URL style envelope
//!   (`{"headers", "body", "isBase64Encoded"}`) and answers `{"statusCode", "body"}`

pub mod event;
pub mod handler;

use crate::agent::AgentCoreClient;
use crate::channels::{Channel, SlackChannel};
use crate::config::Config;
use crate::credentials::{CredentialCache, SsmParameterStore};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;

pub use event::VerifiedEvent;
pub use handler::{GatewayResponse, InboundRequest, IngressHandler};

/// Default request body limit (64KB). Slack event payloads are far smaller.
pub const MAX_BODY_SIZE: usize = 65_536;
/// Default request deadline. Must outlast one agent attempt.
pub const REQUEST_TIMEOUT_SECS: u64 = 90;

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<IngressHandler>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(handler: IngressHandler, request_timeout: Duration) -> Self {
        Self {
            handler: Arc::new(handler),
            request_timeout,
        }
    }

    /// Run the handler under the request deadline. An overrun is answered
    /// like any other internal failure.
    async fn handle(&self, request: InboundRequest) -> GatewayResponse {
        match tokio::time::timeout(self.request_timeout, self.handler.handle(request)).await {
            Ok(resp) => resp,
            Err(_) => {
                tracing::error!(
                    timeout_secs = self.request_timeout.as_secs(),
                    "Request handling exceeded deadline"
                );
                GatewayResponse::internal_error()
            }
        }
    }
}

/// Wire the handler to its collaborators as described by `config`.
pub fn build_handler(config: &Config) -> Result<IngressHandler> {
    let store = SsmParameterStore::from_config(&config.parameter_store)
        .context("Failed to create parameter store client")?;
    let credentials = Arc::new(CredentialCache::new(Arc::new(store)));
    let agent = AgentCoreClient::from_config(&config.agent)
        .context("Failed to create agent runtime client")?;
    let channel: Arc<dyn Channel> = Arc::new(
        SlackChannel::from_config(&config.slack, credentials.clone())
            .context("Failed to create Slack channel")?,
    );
    Ok(IngressHandler::from_config(
        config,
        credentials,
        Arc::new(agent),
        channel,
    ))
}

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/slack/events", post(handle_slack_events))
        .route("/invoke", post(handle_invoke))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
}

/// Resolve the bot token and call Slack `auth.test`.
pub async fn check_slack_auth(config: &Config) -> Result<bool> {
    let store = SsmParameterStore::from_config(&config.parameter_store)
        .context("Failed to create parameter store client")?;
    let credentials = Arc::new(CredentialCache::new(Arc::new(store)));
    let slack = SlackChannel::from_config(&config.slack, credentials)
        .context("Failed to create Slack channel")?;
    Ok(slack.health_check().await)
}

/// Run the HTTP gateway until Ctrl+C.
pub async fn run_gateway(config: Config) -> Result<()> {
    let handler = build_handler(&config)?;
    let state = AppState::new(
        handler,
        Duration::from_secs(config.gateway.request_timeout_secs),
    );

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind gateway to {addr}"))?;
    let actual: SocketAddr = listener.local_addr()?;

    println!("🦀 slackgate listening on http://{actual}");
    println!("  POST /slack/events  Slack Events API (signed)");
    println!("  POST /invoke        Function URL envelope");
    println!("  GET  /health        health check");
    println!("  Agent runtime: {}", config.agent.runtime_arn);
    println!("  Press Ctrl+C to stop.\n");
    tracing::info!(address = %actual, "Gateway started");

    let app = build_router(state, config.gateway.max_body_bytes);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /health
async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "channel": state.handler.channel().name(),
    }))
}

/// POST /slack/events: raw Slack request, never base64.
async fn handle_slack_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> GatewayResponse {
    state
        .handle(InboundRequest::raw(headers, body.to_vec()))
        .await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FunctionUrlRequest {
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    #[serde(rename = "isBase64Encoded")]
    pub is_base64_encoded: bool,
}

impl FunctionUrlRequest {
    fn into_inbound(self) -> InboundRequest {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                continue;
            };
            headers.insert(name, value);
        }
        InboundRequest {
            headers,
            body: self.body.unwrap_or_default().into_bytes(),
            is_base64_encoded: self.is_base64_encoded,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct FunctionUrlResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    /// JSON document encoded as a string.
    pub body: String,
}

impl From<GatewayResponse> for FunctionUrlResponse {
    fn from(resp: GatewayResponse) -> Self {
        Self {
            status_code: resp.status.as_u16(),
            headers: HashMap::from([("Content-Type".to_string(), "application/json".to_string())]),
            body: resp.body.to_string(),
        }
    }
}

/// POST /invoke: Function URL envelope in, Function URL result out.
async fn handle_invoke(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let Ok(envelope) = serde_json::from_slice::<FunctionUrlRequest>(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Invalid invocation envelope"})),
        )
            .into_response();
    };
    let resp = state.handle(envelope.into_inbound()).await;
    Json(FunctionUrlResponse::from(resp)).into_response()
}
