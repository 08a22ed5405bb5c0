//! Configuration structures and loading logic

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Main service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub host: IpAddr,
    pub api_port: u16,
    /// Application settings JSON (models path and sensitivity overrides)
    pub settings_file: PathBuf,
    /// Persisted catalog of scanned model records
    pub catalog_file: PathBuf,
    /// Directory holding downloaded preview images
    pub image_cache_dir: PathBuf,
    pub registry_base_url: String,
    /// Simultaneous in-flight registry and image requests
    pub max_concurrent_requests: usize,
    pub request_timeout_secs: u64,
    pub download_attempts: u32,
    pub download_retry_base_ms: u64,
    /// Files hashed at once. Defaults to available parallelism
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_workers: Option<usize>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_port: default_api_port(),
            settings_file: default_settings_file(),
            catalog_file: default_catalog_file(),
            image_cache_dir: default_image_cache_dir(),
            registry_base_url: default_registry_base_url(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout_secs: default_request_timeout(),
            download_attempts: default_download_attempts(),
            download_retry_base_ms: default_download_retry_base_ms(),
            hash_workers: None,
        }
    }
}

impl CatalogConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content).context("Failed to parse TOML config")?
        } else {
            Self::default()
        };

        // Environment variable overrides
        if let Ok(port) = std::env::var("MODEL_CATALOG_API_PORT") {
            config.api_port = port
                .parse()
                .context("Invalid MODEL_CATALOG_API_PORT value")?;
        }
        if let Ok(settings_file) = std::env::var("MODEL_CATALOG_SETTINGS_FILE") {
            config.settings_file = PathBuf::from(settings_file);
        }
        if let Ok(catalog_file) = std::env::var("MODEL_CATALOG_CATALOG_FILE") {
            config.catalog_file = PathBuf::from(catalog_file);
        }
        if let Ok(image_dir) = std::env::var("MODEL_CATALOG_IMAGE_DIR") {
            config.image_cache_dir = PathBuf::from(image_dir);
        }
        if let Ok(url) = std::env::var("MODEL_CATALOG_REGISTRY_URL") {
            config.registry_base_url = url;
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_port < 1024 {
            anyhow::bail!("API port must be >= 1024 (got {})", self.api_port);
        }

        let url = reqwest::Url::parse(&self.registry_base_url).with_context(|| {
            format!("Invalid registry base URL: {}", self.registry_base_url)
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!(
                "Registry base URL must use http or https (got {})",
                url.scheme()
            );
        }

        if self.max_concurrent_requests == 0 {
            anyhow::bail!("max_concurrent_requests must be > 0");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be > 0");
        }
        if self.download_attempts == 0 {
            anyhow::bail!("download_attempts must be > 0");
        }
        if self.hash_workers == Some(0) {
            anyhow::bail!("hash_workers must be > 0 when set");
        }

        for file in [&self.settings_file, &self.catalog_file] {
            if let Some(parent) = file.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Cannot create directory: {:?}", parent))?;
            }
        }

        std::fs::create_dir_all(&self.image_cache_dir).with_context(|| {
            format!("Cannot create image cache directory: {:?}", self.image_cache_dir)
        })?;

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn download_retry_base(&self) -> Duration {
        Duration::from_millis(self.download_retry_base_ms)
    }

    /// Origin of the registry API, where model pages live
    pub fn registry_site_url(&self) -> String {
        reqwest::Url::parse(&self.registry_base_url)
            .map(|url| url.origin().ascii_serialization())
            .unwrap_or_else(|_| self.registry_base_url.clone())
    }

    pub fn effective_hash_workers(&self) -> usize {
        self.hash_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}

// Default functions
fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}
fn default_api_port() -> u16 {
    8080
}
fn default_settings_file() -> PathBuf {
    PathBuf::from("config.json")
}
fn default_catalog_file() -> PathBuf {
    PathBuf::from("models_info.json")
}
fn default_image_cache_dir() -> PathBuf {
    PathBuf::from("static/images")
}
fn default_registry_base_url() -> String {
    "https://civitai.com/api/v1".to_string()
}
fn default_max_concurrent_requests() -> usize {
    5
}
fn default_request_timeout() -> u64 {
    10
}
fn default_download_attempts() -> u32 {
    3
}
fn default_download_retry_base_ms() -> u64 {
    1000
}
