//! Preview image cache
//!
//! Images are stored flat in one directory under the last segment of their
//! URL path. Registry image names are content-addressed, so an existing file
//! is never downloaded again:
//! ```text
//! static/images/
//! ├── 1a2b3c4d-preview.jpeg
//! └── 9f8e7d6c-sample.png
//! ```
//! Records reference cached files as `/static/images/{name}`, the route the
//! API serves this directory under.

use crate::error::SyncError;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

/// URL prefix under which cached previews are served
pub const PREVIEW_ROUTE: &str = "/static/images";

/// Derive the cache file name from an image URL
///
/// Returns `None` for URLs that do not end in a usable file name.
pub fn preview_file_name(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    let name = urlencoding::decode(segment).ok()?.into_owned();
    is_safe_name(&name).then_some(name)
}

/// `/static/images/{name}` reference stored in records
pub fn local_reference(name: &str) -> String {
    format!("{}/{}", PREVIEW_ROUTE, urlencoding::encode(name))
}

/// Resolve a stored reference to its file inside `dir`
pub fn resolve_reference(dir: &Path, reference: &str) -> Option<PathBuf> {
    let encoded = reference.rsplit('/').next()?;
    let name = urlencoding::decode(encoded).ok()?;
    is_safe_name(&name).then(|| dir.join(&*name))
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

/// Downloads preview images into the cache directory with bounded retries
pub struct ImageCache {
    dir: PathBuf,
    http: Client,
    permits: Arc<Semaphore>,
    attempts: u32,
    retry_base: Duration,
    /// Source of unique temp file names
    partial_seq: AtomicU64,
}

impl ImageCache {
    /// # Arguments
    /// * `dir` - Cache directory, created if missing
    /// * `http` - Client carrying the per-request timeout
    /// * `permits` - Limiter shared with the registry client
    /// * `attempts` - Download tries before giving up
    /// * `retry_base` - Delay unit; attempt `n` failing waits `retry_base * n`
    pub fn new(
        dir: PathBuf,
        http: Client,
        permits: Arc<Semaphore>,
        attempts: u32,
        retry_base: Duration,
    ) -> Self {
        Self {
            dir,
            http,
            permits,
            attempts: attempts.max(1),
            retry_base,
            partial_seq: AtomicU64::new(0),
        }
    }

    /// Make sure the image behind `url` is cached, returning its local reference
    ///
    /// `None` means the image could not be cached; callers keep the upstream
    /// URL for display instead.
    pub async fn ensure_local(&self, url: &str) -> Option<String> {
        let Some(name) = preview_file_name(url) else {
            tracing::debug!(url = %url, "Image URL has no usable file name");
            return None;
        };
        let target = self.dir.join(&name);

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            crate::metrics::record_image_download("cached");
            return Some(local_reference(&name));
        }

        for attempt in 1..=self.attempts {
            match self.download(url, &name, &target).await {
                Ok(()) => {
                    tracing::debug!(url = %url, file = %target.display(), attempt, "Preview cached");
                    crate::metrics::record_image_download("downloaded");
                    return Some(local_reference(&name));
                }
                Err(e) => {
                    tracing::warn!(
                        url = %url,
                        attempt,
                        max_attempts = self.attempts,
                        error = %e,
                        "Preview download attempt failed"
                    );
                    if attempt < self.attempts {
                        tokio::time::sleep(self.retry_base * attempt).await;
                    }
                }
            }
        }

        crate::metrics::record_image_download("failed");
        None
    }

    /// One download attempt, written through a temp file
    async fn download(&self, url: &str, name: &str, target: &Path) -> Result<(), SyncError> {
        let download_err = |reason: String| SyncError::Download {
            url: url.to_string(),
            reason,
        };

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(download_err(format!("status {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| download_err(e.to_string()))?;

        // Fixed-length name so long image names still fit the filesystem limit
        let seq = self.partial_seq.fetch_add(1, Ordering::Relaxed);
        let partial = self
            .dir
            .join(format!(".download-{}-{:08x}.part", std::process::id(), seq));

        let written = match tokio::fs::write(&partial, &bytes).await {
            Ok(()) => tokio::fs::rename(&partial, target).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(download_err(format!("writing {}: {}", name, e)));
        }

        Ok(())
    }
}
