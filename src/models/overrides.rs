//! Manual sensitivity overrides
//!
//! An override can only add a sensitive marking. Records the registry already
//! flags as sensitive stay sensitive no matter how often they are toggled.

use super::store::{MetadataStore, record_key};
use crate::error::SyncResult;
use crate::settings::SettingsStore;
use std::path::Path;
use std::sync::Arc;

pub struct OverrideStore {
    settings: Arc<SettingsStore>,
    catalog: Arc<MetadataStore>,
}

impl OverrideStore {
    pub fn new(settings: Arc<SettingsStore>, catalog: Arc<MetadataStore>) -> Self {
        Self { settings, catalog }
    }

    /// Toggle the override for `path`, returning the merged sensitivity
    pub async fn toggle(&self, path: &Path) -> SyncResult<bool> {
        if self.remote_sensitive(path).await {
            tracing::debug!(path = %path.display(), "Registry marks model sensitive, override ignored");
            return Ok(true);
        }

        let present = self.settings.toggle_override(&record_key(path)).await?;
        tracing::info!(path = %path.display(), sensitive = present, "Sensitivity override toggled");
        Ok(present)
    }

    /// Merged classification: registry flag OR manual override
    pub async fn is_sensitive(&self, path: &Path) -> bool {
        self.remote_sensitive(path).await || self.settings.is_overridden(&record_key(path)).await
    }

    async fn remote_sensitive(&self, path: &Path) -> bool {
        self.catalog
            .get(path)
            .await
            .is_some_and(|record| record.is_nsfw())
    }
}
