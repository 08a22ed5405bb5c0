//! Persistent catalog of scanned model files
//!
//! The catalog file is a JSON object keyed by absolute model path:
//! ```json
//! {
//!   "/models/checkpoints/a.safetensors": {
//!     "hash": "<sha256 hex>",
//!     "info": { "...registry payload...", "localPreview": "/static/images/x.jpeg",
//!               "mtime": 1700000000.5, "scanTime": 1700000100.25 }
//!   }
//! }
//! ```

use super::cache::resolve_reference;
use super::metadata::ModelRecord;
use crate::error::{SyncError, SyncResult};
use crate::storage::{FileSystemStorage, StorageBackend};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Outcome of loading the catalog file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records read from disk
    pub loaded: usize,
    /// Records dropped because their file is gone
    pub reconciled: usize,
    /// Catalog file existed but could not be read or parsed
    pub corrupt: bool,
}

/// Catalog key for a model file
pub fn record_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Path-keyed store of model records, persisted after every change
pub struct MetadataStore {
    catalog_file: PathBuf,
    preview_dir: PathBuf,
    records: RwLock<HashMap<String, ModelRecord>>,
    storage: Arc<dyn StorageBackend>,
    /// Serializes writers of the catalog file
    save_lock: Mutex<()>,
}

impl MetadataStore {
    /// Create a store backed by the filesystem
    pub fn new(catalog_file: PathBuf, preview_dir: PathBuf) -> Self {
        Self::new_with_storage(catalog_file, preview_dir, Arc::new(FileSystemStorage::new()))
    }

    /// Create a store with a custom storage backend
    pub fn new_with_storage(
        catalog_file: PathBuf,
        preview_dir: PathBuf,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            catalog_file,
            preview_dir,
            records: RwLock::new(HashMap::new()),
            storage,
            save_lock: Mutex::new(()),
        }
    }

    /// Replace in-memory records with the catalog file, then reconcile
    ///
    /// Never fails: an unreadable or corrupt catalog leaves the store empty
    /// and is reported through `LoadReport::corrupt`.
    pub async fn load(&self) -> LoadReport {
        let mut report = LoadReport::default();

        let parsed = match self.storage.load(&self.catalog_file).await {
            Ok(Some(content)) => {
                match serde_json::from_str::<HashMap<String, ModelRecord>>(&content) {
                    Ok(records) => records,
                    Err(e) => {
                        tracing::warn!(
                            path = ?self.catalog_file,
                            error = %e,
                            "Catalog file is corrupt, starting with an empty catalog"
                        );
                        report.corrupt = true;
                        HashMap::new()
                    }
                }
            }
            Ok(None) => {
                tracing::info!(path = ?self.catalog_file, "No catalog file found, starting fresh");
                HashMap::new()
            }
            Err(e) => {
                tracing::warn!(
                    path = ?self.catalog_file,
                    error = %e,
                    "Catalog file unreadable, starting with an empty catalog"
                );
                report.corrupt = true;
                HashMap::new()
            }
        };

        report.loaded = parsed.len();
        *self.records.write().await = parsed;

        report.reconciled = self.reconcile_with_disk().await;

        tracing::info!(
            loaded = report.loaded,
            reconciled = report.reconciled,
            "Catalog loaded"
        );
        crate::metrics::update_catalog_size(self.len().await);

        report
    }

    /// Write all records to the catalog file atomically
    pub async fn save(&self) -> SyncResult<()> {
        let _guard = self.save_lock.lock().await;

        let content = {
            let records = self.records.read().await;
            // Sorted keys keep the file diffable
            let ordered: BTreeMap<&String, &ModelRecord> = records.iter().collect();
            serde_json::to_string_pretty(&ordered)
                .map_err(|e| SyncError::persistence(&self.catalog_file, e))?
        };

        self.storage
            .save(&self.catalog_file, &content)
            .await
            .map_err(|e| SyncError::persistence(&self.catalog_file, format!("{:#}", e)))?;

        tracing::debug!(path = ?self.catalog_file, "Catalog saved");
        Ok(())
    }

    /// Whether `path` needs a registry fetch
    ///
    /// Stale when there is no record, the stored mtime differs, or the
    /// record's cached preview has disappeared. The content hash is not
    /// consulted.
    pub async fn is_stale(&self, path: &Path, current_mtime: f64) -> bool {
        let preview = {
            let records = self.records.read().await;
            match records.get(&record_key(path)) {
                None => return true,
                Some(record) if record.info.mtime != current_mtime => return true,
                Some(record) => record.info.local_preview.clone(),
            }
        };

        match preview {
            Some(reference) => !self.preview_exists(&reference).await,
            None => false,
        }
    }

    async fn preview_exists(&self, reference: &str) -> bool {
        match resolve_reference(&self.preview_dir, reference) {
            Some(file) => tokio::fs::try_exists(&file).await.unwrap_or(false),
            None => false,
        }
    }

    /// Drop records whose model file no longer exists
    ///
    /// Cached previews of dropped records are deleted unless a remaining
    /// record still uses them. Cleanup failures are logged and skipped.
    /// Returns the number of records removed.
    pub async fn reconcile_with_disk(&self) -> usize {
        let snapshot: Vec<(String, Option<String>)> = {
            let records = self.records.read().await;
            records
                .iter()
                .map(|(path, record)| (path.clone(), record.info.local_preview.clone()))
                .collect()
        };

        let mut missing = Vec::new();
        for (path, preview) in snapshot {
            // An error here (e.g. permissions) is not proof the file is gone
            if !tokio::fs::try_exists(&path).await.unwrap_or(true) {
                missing.push((path, preview));
            }
        }

        if missing.is_empty() {
            return 0;
        }

        let still_referenced: HashSet<String> = {
            let mut records = self.records.write().await;
            for (path, _) in &missing {
                records.remove(path);
            }
            records
                .values()
                .filter_map(|r| r.info.local_preview.clone())
                .collect()
        };

        for (path, preview) in &missing {
            tracing::info!(path = %path, "Model file removed from disk, dropping record");
            if let Some(reference) = preview
                && !still_referenced.contains(reference)
                && let Err(e) = self.remove_preview(reference).await
            {
                tracing::warn!(error = %e, "Failed to delete cached preview");
            }
        }

        let removed = missing.len();
        if let Err(e) = self.save().await {
            tracing::error!(error = %e, "Failed to save catalog after reconciliation");
        }

        crate::metrics::record_reconciled(removed);
        crate::metrics::update_catalog_size(self.len().await);
        tracing::info!(removed, "Catalog reconciled with disk");

        removed
    }

    async fn remove_preview(&self, reference: &str) -> SyncResult<()> {
        let Some(file) = resolve_reference(&self.preview_dir, reference) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SyncError::Reconciliation { path: file, source }),
        }
    }

    /// Insert or replace the record for `path`
    pub async fn upsert(&self, path: &Path, record: ModelRecord) {
        let len = {
            let mut records = self.records.write().await;
            records.insert(record_key(path), record);
            records.len()
        };
        crate::metrics::update_catalog_size(len);
    }

    pub async fn get(&self, path: &Path) -> Option<ModelRecord> {
        self.records.read().await.get(&record_key(path)).cloned()
    }

    /// All records sorted by path
    pub async fn list(&self) -> Vec<(String, ModelRecord)> {
        let records = self.records.read().await;
        let mut entries: Vec<_> = records
            .iter()
            .map(|(path, record)| (path.clone(), record.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
