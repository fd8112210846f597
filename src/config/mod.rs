//! Gateway configuration: TOML file, then environment overrides.

use crate::gateway::{MAX_BODY_SIZE, REQUEST_TIMEOUT_SECS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_REGION: &str = "ap-northeast-1";
const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_FALLBACK_REPLY: &str = "Processing complete.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Used when neither `RUST_LOG` nor `LOG_LEVEL` is set.
    pub log_level: String,
    /// Region used to derive default service endpoints.
    pub region: String,
    pub gateway: GatewayConfig,
    pub slack: SlackConfig,
    pub parameter_store: ParameterStoreConfig,
    pub agent: AgentConfig,
    /// Keys skipped while parsing, reported once logging is up.
    #[serde(skip)]
    pub ignored_keys: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            region: DEFAULT_REGION.into(),
            gateway: GatewayConfig::default(),
            slack: SlackConfig::default(),
            parameter_store: ParameterStoreConfig::default(),
            agent: AgentConfig::default(),
            ignored_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            max_body_bytes: MAX_BODY_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Parameter-store key holding the request signing secret.
    pub signing_secret_param: String,
    /// Parameter-store key holding the `xoxb-` bot token.
    pub bot_token_param: String,
    pub api_base_url: String,
    /// Posted when the agent returns an empty reply.
    pub fallback_reply: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            signing_secret_param: "/slack-issue-agent/slack/signing-secret".into(),
            bot_token_param: "/slack-issue-agent/slack/bot-token".into(),
            api_base_url: "https://slack.com/api".into(),
            fallback_reply: DEFAULT_FALLBACK_REPLY.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterStoreConfig {
    pub endpoint: Option<String>,
    pub auth_token: Option<String>,
    #[serde(skip)]
    region: Option<String>,
}

impl ParameterStoreConfig {
    pub fn resolved_endpoint(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| {
            format!(
                "https://ssm.{}.amazonaws.com",
                self.region.as_deref().unwrap_or(DEFAULT_REGION)
            )
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// `arn:aws:bedrock-agentcore:<region>:<account>:runtime/<id>`
    pub runtime_arn: String,
    pub endpoint: Option<String>,
    pub qualifier: String,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub request_timeout_secs: u64,
    #[serde(skip)]
    region: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            runtime_arn: String::new(),
            endpoint: None,
            qualifier: "DEFAULT".into(),
            max_retries: 3,
            base_delay_ms: 1_000,
            request_timeout_secs: 60,
            region: None,
        }
    }
}

impl AgentConfig {
    pub fn resolved_endpoint(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| {
            format!(
                "https://bedrock-agentcore.{}.amazonaws.com",
                self.region.as_deref().unwrap_or(DEFAULT_REGION)
            )
        })
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Config {
    /// Load from `path`, or from the platform config dir when `path` is `None`.
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(raw) => {
                let expanded = PathBuf::from(shellexpand::tilde(raw).into_owned());
                Self::from_file(&expanded)?
            }
            None => match default_config_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides_from(|key| std::env::var(key).ok());
        config.propagate_region();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.propagate_region();
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let value: toml::Value = toml::from_str(contents)?;
        let mut ignored = Vec::new();
        let mut config: Config = serde_ignored::deserialize(value, |unknown| {
            ignored.push(unknown.to_string());
        })?;
        config.ignored_keys = ignored;
        config.propagate_region();
        Ok(config)
    }

    /// Environment overrides (`AGENTCORE_RUNTIME_ARN`, `AWS_REGION`, `LOG_LEVEL`, `SLACKGATE_*`).
    pub fn apply_env_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(arn) = get("AGENTCORE_RUNTIME_ARN") {
            self.agent.runtime_arn = arn;
        }
        if let Some(region) = get("AWS_REGION") {
            self.region = region;
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(endpoint) = get("SLACKGATE_PARAMETER_STORE_ENDPOINT") {
            self.parameter_store.endpoint = Some(endpoint);
        }
        if let Some(token) = get("SLACKGATE_PARAMETER_STORE_TOKEN") {
            self.parameter_store.auth_token = Some(token);
        }
        if let Some(endpoint) = get("SLACKGATE_AGENT_ENDPOINT") {
            self.agent.endpoint = Some(endpoint);
        }
        self.propagate_region();
    }

    /// Emit one warning per key skipped at load time.
    pub fn warn_ignored_keys(&self) {
        for key in &self.ignored_keys {
            tracing::warn!("Ignoring unknown config key: {key}");
        }
    }

    pub fn validate(&self) -> Result<()> {
        let arn = self.agent.runtime_arn.trim();
        if arn.is_empty() {
            anyhow::bail!("agent.runtime_arn is not set (config file or AGENTCORE_RUNTIME_ARN)");
        }
        if !arn.starts_with("arn:") {
            anyhow::bail!("agent.runtime_arn must be an ARN (got {arn:?})");
        }
        if self.agent.max_retries == 0 {
            anyhow::bail!("agent.max_retries must be at least 1");
        }
        if self.gateway.request_timeout_secs <= self.agent.request_timeout_secs {
            anyhow::bail!(
                "gateway.request_timeout_secs ({}) must exceed agent.request_timeout_secs ({})",
                self.gateway.request_timeout_secs,
                self.agent.request_timeout_secs
            );
        }
        if self.slack.signing_secret_param.trim().is_empty() {
            anyhow::bail!("slack.signing_secret_param is empty");
        }
        if self.slack.bot_token_param.trim().is_empty() {
            anyhow::bail!("slack.bot_token_param is empty");
        }
        Ok(())
    }

    /// Copy safe to print: credentials replaced.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.parameter_store.auth_token.is_some() {
            copy.parameter_store.auth_token = Some("***".into());
        }
        copy
    }

    fn propagate_region(&mut self) {
        self.parameter_store.region = Some(self.region.clone());
        self.agent.region = Some(self.region.clone());
    }
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "slackgate")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
