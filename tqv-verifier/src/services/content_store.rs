//! Content-addressed asset retrieval
//!
//! Assets are fetched from an HTTP gateway by content identifier. Downloads
//! are cached under `{root}/cache`, keyed by the content identifier itself,
//! so two tasks whose assets share a file name can never see each other's
//! bytes.

use crate::services::workspace::sanitize_component;
use crate::utils::{retry_with_backoff, RetryPolicy};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Content store errors
#[derive(Debug, Error)]
pub enum ContentStoreError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Gateway error {0}: {1}")]
    GatewayError(u16, String),

    #[error("Invalid content identifier: {0}")]
    InvalidIdentifier(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Retrieve-by-identifier
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Make the content available under `dest_dir` and return its local path
    async fn fetch(&self, content_id: &str, dest_dir: &Path) -> Result<PathBuf, ContentStoreError>;
}

/// HTTP gateway content store with a local cache
pub struct GatewayContentStore {
    http_client: reqwest::Client,
    gateway_url: String,
    cache_dir: PathBuf,
    retry: RetryPolicy,
}

impl GatewayContentStore {
    pub fn new(
        gateway_url: impl Into<String>,
        cache_dir: PathBuf,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, ContentStoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ContentStoreError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            gateway_url: gateway_url.into(),
            cache_dir,
            retry,
        })
    }

    /// Cache location for a content identifier
    pub fn cache_path(&self, content_id: &str) -> Result<PathBuf, ContentStoreError> {
        let key = sanitize_component(content_id)
            .map_err(|_| ContentStoreError::InvalidIdentifier(content_id.to_string()))?;
        Ok(self.cache_dir.join(key))
    }

    fn content_url(&self, content_id: &str) -> String {
        format!(
            "{}/ipfs/{}",
            self.gateway_url.trim_end_matches('/'),
            content_id
        )
    }

    async fn download(&self, content_id: &str) -> Result<Vec<u8>, ContentStoreError> {
        let url = self.content_url(content_id);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ContentStoreError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ContentStoreError::NotFound(content_id.to_string()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ContentStoreError::GatewayError(status.as_u16(), error_text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ContentStoreError::NetworkError(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ContentStore for GatewayContentStore {
    async fn fetch(&self, content_id: &str, dest_dir: &Path) -> Result<PathBuf, ContentStoreError> {
        let cache_path = self.cache_path(content_id)?;
        let file_name = cache_path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| ContentStoreError::InvalidIdentifier(content_id.to_string()))?;
        let dest_path = dest_dir.join(file_name);

        if tokio::fs::try_exists(&cache_path).await? {
            tracing::debug!(content_id, "Content cache hit");
        } else {
            tracing::info!(content_id, "Downloading content");
            let bytes = retry_with_backoff("content download", &self.retry, || {
                self.download(content_id)
            })
            .await?;

            tokio::fs::create_dir_all(&self.cache_dir).await?;
            // Write-then-rename so a crashed download never looks like a cache hit
            let partial = cache_path.with_extension("partial");
            tokio::fs::write(&partial, &bytes).await?;
            tokio::fs::rename(&partial, &cache_path).await?;

            tracing::debug!(content_id, bytes = bytes.len(), "Content cached");
        }

        tokio::fs::create_dir_all(dest_dir).await?;
        tokio::fs::copy(&cache_path, &dest_path).await?;
        Ok(dest_path)
    }
}
