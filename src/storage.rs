//! Atomic file persistence shared by the catalog and settings stores

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Trait for storage backend operations
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Save content to a file path atomically
    async fn save(&self, path: &Path, content: &str) -> Result<()>;

    /// Load content from a file path
    /// Returns None if file doesn't exist
    async fn load(&self, path: &Path) -> Result<Option<String>>;
}

/// Production storage backend using tokio::fs
#[derive(Debug, Default)]
pub struct FileSystemStorage;

impl FileSystemStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StorageBackend for FileSystemStorage {
    async fn save(&self, path: &Path, content: &str) -> Result<()> {
        // Atomic write: write to temp file, then rename
        let temp_file = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_file)
            .await
            .with_context(|| format!("Failed to create temp file: {:?}", temp_file))?;
        file.write_all(content.as_bytes())
            .await
            .context("Failed to write temp file")?;
        file.sync_all().await.context("Failed to sync temp file")?;

        fs::rename(&temp_file, path)
            .await
            .with_context(|| format!("Failed to move temp file into place: {:?}", path))?;

        Ok(())
    }

    async fn load(&self, path: &Path) -> Result<Option<String>> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read file: {:?}", path))?;

        Ok(Some(content))
    }
}
