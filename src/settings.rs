//! Persisted application settings
//!
//! Holds the user-editable part of the configuration: the models root and the
//! manual sensitivity overrides. Stored as JSON next to the catalog; fields
//! this service does not know about are carried through untouched.

use crate::error::{SyncError, SyncResult};
use crate::storage::{FileSystemStorage, StorageBackend};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Root directory holding the model subfolders. Empty means unset
    #[serde(default, alias = "model_path")]
    pub models_path: String,

    /// Model paths manually flagged as sensitive
    #[serde(default)]
    pub custom_nsfw_models: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Settings {
    pub fn models_root(&self) -> Option<PathBuf> {
        (!self.models_path.is_empty()).then(|| PathBuf::from(&self.models_path))
    }
}

/// Settings file with in-memory cache; every change is persisted before it
/// becomes visible
pub struct SettingsStore {
    path: PathBuf,
    settings: RwLock<Settings>,
    storage: Arc<dyn StorageBackend>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self::new_with_storage(path, Arc::new(FileSystemStorage::new()))
    }

    pub fn new_with_storage(path: PathBuf, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            path,
            settings: RwLock::new(Settings::default()),
            storage,
        }
    }

    /// Read the settings file
    ///
    /// A missing file is created with defaults. A corrupt one is logged and
    /// replaced by defaults in memory only, so the file is left for the user
    /// to inspect until the next change.
    pub async fn load(&self) -> SyncResult<()> {
        let loaded = match self.storage.load(&self.path).await {
            Ok(Some(content)) => match serde_json::from_str::<Settings>(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(path = ?self.path, error = %e, "Settings file is corrupt, using defaults");
                    Settings::default()
                }
            },
            Ok(None) => {
                tracing::info!(path = ?self.path, "No settings file found, writing defaults");
                let defaults = Settings::default();
                self.persist(&defaults).await?;
                defaults
            }
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Settings file unreadable, using defaults");
                Settings::default()
            }
        };

        *self.settings.write().await = loaded;
        Ok(())
    }

    pub async fn snapshot(&self) -> Settings {
        self.settings.read().await.clone()
    }

    pub async fn models_root(&self) -> Option<PathBuf> {
        self.settings.read().await.models_root()
    }

    /// Point the catalog at a new models root, which must exist
    pub async fn set_models_root(&self, root: &Path) -> SyncResult<()> {
        if !tokio::fs::try_exists(root).await.unwrap_or(false) {
            return Err(SyncError::InvalidPath(root.to_path_buf()));
        }

        let value = root.to_string_lossy().into_owned();
        self.update(|settings| settings.models_path = value).await?;
        tracing::info!(path = %root.display(), "Models root updated");
        Ok(())
    }

    pub async fn is_overridden(&self, key: &str) -> bool {
        self.settings
            .read()
            .await
            .custom_nsfw_models
            .iter()
            .any(|entry| entry == key)
    }

    /// Flip membership of `key` in the override set, returning whether it is
    /// now present
    pub async fn toggle_override(&self, key: &str) -> SyncResult<bool> {
        self.update(|settings| {
            let overrides = &mut settings.custom_nsfw_models;
            if let Some(pos) = overrides.iter().position(|entry| entry == key) {
                overrides.remove(pos);
                false
            } else {
                overrides.push(key.to_string());
                true
            }
        })
        .await
    }

    /// Apply `change` to a copy, persist it, then publish it
    async fn update<R>(&self, change: impl FnOnce(&mut Settings) -> R) -> SyncResult<R> {
        let mut settings = self.settings.write().await;
        let mut next = settings.clone();
        let result = change(&mut next);
        self.persist(&next).await?;
        *settings = next;
        Ok(result)
    }

    async fn persist(&self, settings: &Settings) -> SyncResult<()> {
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| SyncError::persistence(&self.path, e))?;
        self.storage
            .save(&self.path, &content)
            .await
            .map_err(|e| SyncError::persistence(&self.path, format!("{:#}", e)))
    }
}
