//! API request and response models

use crate::models::ModelRecord;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Request to change the models root
#[derive(Debug, Serialize, Deserialize)]
pub struct PathUpdate {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PathUpdateResponse {
    pub message: String,
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub models_path: String,
    pub is_path_valid: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelPathResponse {
    pub path: String,
}

/// Request to toggle the sensitivity override of a model
#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleRequest {
    /// Absolute path of the model file
    pub model_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub success: bool,
    pub model_id: String,
    pub nsfw: bool,
}

/// Catalog entry as shown to the user
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelDisplay {
    pub path: String,
    /// Registry model name, or the file name when unknown
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: Option<String>,
    pub hash: String,
    /// Cached preview if available, otherwise the upstream image URL
    pub preview_url: Option<String>,
    #[serde(rename = "baseModel")]
    pub base_model: Option<String>,
    /// Registry web page for this model version
    pub url: Option<String>,
    /// Registry flag merged with the manual override
    pub nsfw: bool,
    #[serde(rename = "nsfwLevel")]
    pub nsfw_level: u64,
}

impl ModelDisplay {
    pub fn from_record(path: &str, record: &ModelRecord, sensitive: bool, site_base: &str) -> Self {
        let remote = &record.info.remote;
        let name = remote.model_name().map(str::to_string).unwrap_or_else(|| {
            Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string())
        });

        Self {
            path: path.to_string(),
            name,
            model_type: remote.model_type().map(str::to_string),
            hash: record.hash.clone(),
            preview_url: record
                .info
                .local_preview
                .clone()
                .or_else(|| remote.preview_url().map(str::to_string)),
            base_model: remote.base_model.clone(),
            url: remote.page_url(site_base),
            nsfw: sensitive,
            nsfw_level: remote.preview_nsfw_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RemoteMetadata;
    use serde_json::json;

    #[test]
    fn test_display_prefers_local_preview() {
        let remote: RemoteMetadata = serde_json::from_value(json!({
            "id": 2, "modelId": 1, "baseModel": "SDXL 1.0",
            "model": {"name": "Juggernaut", "type": "Checkpoint"},
            "images": [{"url": "https://img.example.com/p.jpeg", "nsfwLevel": 1}]
        }))
        .unwrap();
        let record = ModelRecord::new(
            "aa".repeat(32),
            remote,
            Some("/static/images/p.jpeg".to_string()),
            1.0,
        );

        let display = ModelDisplay::from_record(
            "/m/checkpoints/j.safetensors",
            &record,
            false,
            "https://civitai.com",
        );
        assert_eq!(display.name, "Juggernaut");
        assert_eq!(display.model_type.as_deref(), Some("Checkpoint"));
        assert_eq!(display.preview_url.as_deref(), Some("/static/images/p.jpeg"));
        assert_eq!(
            display.url.as_deref(),
            Some("https://civitai.com/models/1?modelVersionId=2")
        );
        assert_eq!(display.nsfw_level, 1);
    }

    #[test]
    fn test_display_falls_back_to_upstream_and_file_name() {
        let remote: RemoteMetadata = serde_json::from_value(json!({
            "images": [{"url": "https://img.example.com/p.jpeg"}]
        }))
        .unwrap();
        let record = ModelRecord::new("bb".repeat(32), remote, None, 1.0);

        let display = ModelDisplay::from_record(
            "/m/loras/style.safetensors",
            &record,
            true,
            "https://civitai.com",
        );
        assert_eq!(display.name, "style.safetensors");
        assert_eq!(
            display.preview_url.as_deref(),
            Some("https://img.example.com/p.jpeg")
        );
        assert_eq!(display.url, None);
        assert!(display.nsfw);

        let json = serde_json::to_value(&display).unwrap();
        assert!(json.get("baseModel").is_some());
        assert!(json.get("type").is_some());
    }
}
