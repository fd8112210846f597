use crate::channels::traits::{Channel, SendMessage};
use crate::config::SlackConfig;
use crate::credentials::CredentialCache;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Posts replies through the Slack Web API.
///
/// The bot token is resolved through the credential cache on each send, so
/// only the first message of a process pays for the parameter store lookup.
#[derive(Clone)]
pub struct SlackChannel {
    client: reqwest::Client,
    api_base_url: String,
    credentials: Arc<CredentialCache>,
    bot_token_param: String,
}

impl SlackChannel {
    pub fn new(
        api_base_url: &str,
        credentials: Arc<CredentialCache>,
        bot_token_param: impl Into<String>,
    ) -> Result<Self> {
        let api_base_url = api_base_url.trim().trim_end_matches('/').to_string();
        if api_base_url.is_empty() {
            anyhow::bail!("Slack API base URL is empty");
        }
        let bot_token_param = bot_token_param.into();
        if bot_token_param.trim().is_empty() {
            anyhow::bail!("Slack bot token parameter name is empty");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build Slack HTTP client")?;
        Ok(Self {
            client,
            api_base_url,
            credentials,
            bot_token_param,
        })
    }

    pub fn from_config(config: &SlackConfig, credentials: Arc<CredentialCache>) -> Result<Self> {
        Self::new(
            &config.api_base_url,
            credentials,
            config.bot_token_param.clone(),
        )
    }

    async fn bot_token(&self) -> Result<String> {
        self.credentials
            .get(&self.bot_token_param)
            .await
            .with_context(|| format!("Failed to resolve Slack bot token ({})", self.bot_token_param))
    }

    async fn call(&self, method: &str, payload: &serde_json::Value) -> Result<SlackApiResponse> {
        let token = self.bot_token().await?;
        let url = format!("{}/{method}", self.api_base_url);
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("Slack {method} request failed"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Slack {method} failed ({status}): {}", body.trim());
        }
        resp.json::<SlackApiResponse>()
            .await
            .with_context(|| format!("Invalid Slack {method} response"))
    }
}

#[async_trait]
impl Channel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, message: &SendMessage) -> anyhow::Result<()> {
        let channel = message.recipient.trim();
        if channel.is_empty() {
            anyhow::bail!("Slack channel recipient is required");
        }
        let mut payload = serde_json::json!({
            "channel": channel,
            "text": message.content,
        });
        if let Some(thread_ts) = message.thread_ts.as_deref() {
            payload["thread_ts"] = serde_json::Value::String(thread_ts.to_string());
        }

        let resp = self.call("chat.postMessage", &payload).await?;
        if !resp.ok {
            anyhow::bail!(
                "Slack chat.postMessage rejected: {}",
                resp.error.as_deref().unwrap_or("unknown_error")
            );
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.call("auth.test", &serde_json::json!({}))
            .await
            .map(|resp| resp.ok)
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    #[serde(default)]
    ok: bool,
    error: Option<String>,
}
