//! Remote registry client
//!
//! Looks up model versions by content hash. Every request holds a permit from
//! a semaphore shared by all scans (and by the preview downloader) so the
//! registry never sees more than the configured number of in-flight requests.

use super::metadata::RemoteMetadata;
use crate::error::{RegistryFailure, SyncError, SyncResult};
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Hash-keyed metadata client for the model registry
#[derive(Clone)]
pub struct RegistryClient {
    http: Client,
    base_url: String,
    permits: Arc<Semaphore>,
}

impl RegistryClient {
    /// Create a client with its own connection pool and request limiter
    ///
    /// # Arguments
    /// * `base_url` - Registry API root, e.g. `https://civitai.com/api/v1`
    /// * `max_concurrent` - Simultaneous in-flight requests
    /// * `timeout` - Per-request timeout, covering connect and body
    pub fn new(base_url: &str, max_concurrent: usize, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("model-catalog/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        })
    }

    /// HTTP client shared with the preview downloader
    pub fn http(&self) -> Client {
        self.http.clone()
    }

    /// Request limiter shared with the preview downloader
    pub fn permits(&self) -> Arc<Semaphore> {
        self.permits.clone()
    }

    pub fn lookup_url(&self, hash: &str) -> String {
        format!("{}/model-versions/by-hash/{}", self.base_url, hash)
    }

    /// Fetch metadata for a content hash
    ///
    /// Not retried: a failed lookup leaves the file stale so the next scan
    /// tries again.
    pub async fn fetch(&self, hash: &str) -> SyncResult<RemoteMetadata> {
        let result = self.fetch_inner(hash).await;

        let label = match &result {
            Ok(_) => "ok",
            Err(RegistryFailure::NotFound) => "not_found",
            Err(RegistryFailure::Status(_)) => "status",
            Err(RegistryFailure::Timeout) => "timeout",
            Err(RegistryFailure::Transport(_)) => "transport",
            Err(RegistryFailure::Decode(_)) => "decode",
        };
        crate::metrics::record_registry_request(label);

        result.map_err(|failure| SyncError::Registry {
            hash: hash.to_string(),
            failure,
        })
    }

    async fn fetch_inner(&self, hash: &str) -> Result<RemoteMetadata, RegistryFailure> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| RegistryFailure::Transport(e.to_string()))?;

        let url = self.lookup_url(hash);
        tracing::debug!(url = %url, "Registry lookup");

        let response = self.http.get(&url).send().await.map_err(classify)?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(RegistryFailure::NotFound),
            other => return Err(RegistryFailure::Status(other.as_u16())),
        }

        let body = response.bytes().await.map_err(classify)?;
        serde_json::from_slice(&body).map_err(|e| RegistryFailure::Decode(e.to_string()))
    }
}

fn classify(err: reqwest::Error) -> RegistryFailure {
    if err.is_timeout() {
        RegistryFailure::Timeout
    } else {
        RegistryFailure::Transport(err.to_string())
    }
}
