//! Process-lifetime cache over a remote parameter store.
//!
//! Values are fetched with decryption enabled and kept until the process exits.
//! There is no TTL and no eviction. Concurrent lookups of the same uncached key
//! share one in-flight fetch; a failed fetch is not cached and the next caller
//! retries it.

pub mod ssm;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

pub use ssm::SsmParameterStore;

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("Parameter not found: {0}")]
    NotFound(String),

    #[error("Access denied to parameter: {0}")]
    AccessDenied(String),

    #[error("Parameter store error: {code}")]
    Upstream { code: String },

    #[error("Parameter store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid parameter store response: {0}")]
    Decode(String),

    #[error("Invalid parameter store configuration: {0}")]
    InvalidConfig(String),
}

/// Remote source of secret/config values.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get_parameter(&self, name: &str, with_decryption: bool)
        -> Result<String, ParameterError>;
}

pub struct CredentialCache {
    store: Arc<dyn ParameterStore>,
    entries: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
}

impl CredentialCache {
    pub fn new(store: Arc<dyn ParameterStore>) -> Self {
        Self {
            store,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the decrypted value for `name`, fetching it at most once per process.
    pub async fn get(&self, name: &str) -> Result<String, ParameterError> {
        let cell = {
            let mut entries = self.entries.lock();
            Arc::clone(entries.entry(name.to_string()).or_default())
        };

        let value = cell
            .get_or_try_init(|| async {
                tracing::debug!(parameter = name, "Fetching parameter from store");
                self.store.get_parameter(name, true).await
            })
            .await?;
        Ok(value.clone())
    }

    /// Fetch straight from the store without reading or updating the cache.
    pub async fn get_uncached(&self, name: &str) -> Result<String, ParameterError> {
        self.store.get_parameter(name, true).await
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.entries
            .lock()
            .get(name)
            .is_some_and(|cell| cell.initialized())
    }
}
