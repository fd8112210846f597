//! `GetParameter` over the SSM JSON protocol.
//!
//! Request signing is left to the endpoint: point `endpoint` at a signing proxy
//! or a local emulator. An optional bearer token is attached when configured.

use super::{ParameterError, ParameterStore};
use crate::config::ParameterStoreConfig;
use crate::util::short_error_code;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const TARGET_GET_PARAMETER: &str = "AmazonSSM.GetParameter";
const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Clone)]
pub struct SsmParameterStore {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl SsmParameterStore {
    pub fn new(endpoint: &str, auth_token: Option<String>) -> Result<Self, ParameterError> {
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(ParameterError::InvalidConfig(
                "parameter store endpoint is empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            auth_token: auth_token
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }

    pub fn from_config(config: &ParameterStoreConfig) -> Result<Self, ParameterError> {
        Self::new(&config.resolved_endpoint(), config.auth_token.clone())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    async fn get_parameter(
        &self,
        name: &str,
        with_decryption: bool,
    ) -> Result<String, ParameterError> {
        let payload = serde_json::json!({
            "Name": name,
            "WithDecryption": with_decryption,
        });
        let mut req = self
            .client
            .post(format!("{}/", self.endpoint))
            .header("X-Amz-Target", TARGET_GET_PARAMETER)
            .header(reqwest::header::CONTENT_TYPE, AMZ_JSON_CONTENT_TYPE)
            .body(payload.to_string());
        if let Some(token) = self.auth_token.as_deref() {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(classify_error(name, status, &body));
        }

        let parsed: GetParameterResponse = serde_json::from_str(&body)
            .map_err(|e| ParameterError::Decode(format!("GetParameter response: {e}")))?;
        Ok(parsed.parameter.value)
    }
}

#[derive(Debug, Deserialize)]
struct GetParameterResponse {
    #[serde(rename = "Parameter")]
    parameter: ParameterValue,
}

#[derive(Debug, Deserialize)]
struct ParameterValue {
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct AwsErrorBody {
    #[serde(rename = "__type", default)]
    kind: Option<String>,
}

fn classify_error(name: &str, status: StatusCode, body: &str) -> ParameterError {
    let code = serde_json::from_str::<AwsErrorBody>(body)
        .ok()
        .and_then(|e| e.kind)
        .map(|kind| short_error_code(&kind).to_string())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    match code.as_str() {
        "ParameterNotFound" | "ParameterVersionNotFound" => {
            ParameterError::NotFound(name.to_string())
        }
        "AccessDeniedException" | "UnrecognizedClientException" => {
            ParameterError::AccessDenied(name.to_string())
        }
        _ if status == StatusCode::FORBIDDEN => ParameterError::AccessDenied(name.to_string()),
        _ => ParameterError::Upstream { code },
    }
}
