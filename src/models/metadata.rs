//! Registry metadata and catalog record types
//!
//! The registry payload is only partially interpreted: the handful of fields
//! the catalog reads are typed, everything else is kept in `extra` so a record
//! written back to disk carries the full upstream document.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Model version payload returned by the registry's hash lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteMetadata {
    /// Model version ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(rename = "modelId", default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<u64>,

    #[serde(rename = "baseModel", default, skip_serializing_if = "Option::is_none")]
    pub base_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSummary>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub images: Vec<ImageDescriptor>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parent model section of the payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsfw: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Preview image entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Numeric in current registry responses, a label in older ones
    #[serde(rename = "nsfwLevel", default, skip_serializing_if = "Option::is_none")]
    pub nsfw_level: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteMetadata {
    /// URL of the first preview image, if the payload has one
    pub fn preview_url(&self) -> Option<&str> {
        self.images
            .first()
            .and_then(|image| image.url.as_deref())
            .filter(|url| !url.is_empty())
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_ref().and_then(|m| m.name.as_deref())
    }

    pub fn model_type(&self) -> Option<&str> {
        self.model.as_ref().and_then(|m| m.kind.as_deref())
    }

    /// Sensitivity classification as reported upstream
    pub fn is_nsfw(&self) -> bool {
        self.model.as_ref().and_then(|m| m.nsfw).unwrap_or(false)
    }

    /// Numeric sensitivity level of the first image, 0 when unknown
    pub fn preview_nsfw_level(&self) -> u64 {
        self.images
            .first()
            .and_then(|image| image.nsfw_level.as_ref())
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    /// Web page for this model version on the registry site
    pub fn page_url(&self, site_base: &str) -> Option<String> {
        match (self.model_id, self.id) {
            (Some(model_id), Some(version_id)) => Some(format!(
                "{}/models/{}?modelVersionId={}",
                site_base.trim_end_matches('/'),
                model_id,
                version_id
            )),
            _ => None,
        }
    }
}

/// Stored `info` section: the registry payload plus locally injected fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(flatten)]
    pub remote: RemoteMetadata,

    /// `/static/images/{name}` reference into the preview cache
    #[serde(
        rename = "localPreview",
        alias = "local_preview",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub local_preview: Option<String>,

    /// File modification time observed when the record was written.
    /// Missing in catalogs from older releases, which makes them stale.
    #[serde(default)]
    pub mtime: f64,

    #[serde(rename = "scanTime", alias = "scan_time", default)]
    pub scan_time: f64,
}

/// One catalog entry, keyed by absolute model file path in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// SHA-256 hex digest of the file contents
    pub hash: String,
    pub info: ModelInfo,
}

impl ModelRecord {
    pub fn new(
        hash: String,
        remote: RemoteMetadata,
        local_preview: Option<String>,
        mtime: f64,
    ) -> Self {
        Self {
            hash,
            info: ModelInfo {
                remote,
                local_preview,
                mtime,
                scan_time: now_seconds(),
            },
        }
    }

    pub fn is_nsfw(&self) -> bool {
        self.info.remote.is_nsfw()
    }
}

/// Current wall clock as fractional Unix seconds
pub fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
