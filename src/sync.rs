//! Catalog synchronization
//!
//! A scan walks the models root, skips files whose mtime matches the catalog,
//! and for the rest runs fingerprint → registry lookup → preview cache →
//! catalog write. Files are processed one at a time in enumeration order and
//! each one produces exactly one progress event. A per-file failure becomes an
//! `Errored` event; it never ends the scan.

use crate::config::CatalogConfig;
use crate::error::{SyncError, SyncResult};
use crate::models::scanner::{self, current_mtime};
use crate::models::{Fingerprinter, ImageCache, MetadataStore, ModelRecord, RegistryClient};
use crate::settings::SettingsStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Buffered progress events before the scan waits on its consumer
const PROGRESS_BUFFER: usize = 64;

/// Result of processing one candidate file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// mtime unchanged, no work done
    Skipped,
    /// Fetched from the registry and written to the catalog
    Updated,
}

/// What a progress event reports
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressKind {
    Skipped { path: PathBuf },
    Updated { path: PathBuf },
    Errored { path: PathBuf, error: String },
    /// Terminal event for a root with no candidate files
    NoFiles,
    /// Terminal event after the last file
    Completed,
}

/// One step of a running scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProgress {
    /// Files handled so far, including this one
    pub processed: usize,
    pub total: usize,
    pub kind: ProgressKind,
}

impl ScanProgress {
    /// `processed / total`; 1.0 for the empty scan
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, ProgressKind::NoFiles | ProgressKind::Completed)
    }

    pub fn message(&self) -> String {
        match &self.kind {
            ProgressKind::Skipped { path } => format!("Skipped: {}", file_name(path)),
            ProgressKind::Updated { path } => format!("Processed: {}", file_name(path)),
            ProgressKind::Errored { path, error } => {
                format!("Error: {}: {}", file_name(path), error)
            }
            ProgressKind::NoFiles => "No model files found".to_string(),
            ProgressKind::Completed => format!("Scan complete: {} files processed", self.total),
        }
    }

    /// Wire form sent to stream consumers
    pub fn to_event(&self) -> ProgressEvent {
        ProgressEvent {
            progress: self.fraction(),
            message: self.message(),
            status: self.is_terminal().then_some(ScanStatus::Completed),
        }
    }
}

/// JSON payload of one progress stream event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub progress: f64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ScanStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Completed,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Drives scans of the models root against the catalog
pub struct SyncEngine {
    store: Arc<MetadataStore>,
    settings: Arc<SettingsStore>,
    fingerprinter: Fingerprinter,
    client: RegistryClient,
    cache: ImageCache,
    /// Held for the whole of a scan; overlapping scans queue behind it
    scan_lock: Mutex<()>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<MetadataStore>,
        settings: Arc<SettingsStore>,
        fingerprinter: Fingerprinter,
        client: RegistryClient,
        cache: ImageCache,
    ) -> Self {
        Self {
            store,
            settings,
            fingerprinter,
            client,
            cache,
            scan_lock: Mutex::new(()),
        }
    }

    /// Build the engine's remote and hashing components from configuration
    pub fn from_config(
        config: &CatalogConfig,
        store: Arc<MetadataStore>,
        settings: Arc<SettingsStore>,
    ) -> anyhow::Result<Self> {
        let client = RegistryClient::new(
            &config.registry_base_url,
            config.max_concurrent_requests,
            config.request_timeout(),
        )?;
        let cache = ImageCache::new(
            config.image_cache_dir.clone(),
            client.http(),
            client.permits(),
            config.download_attempts,
            config.download_retry_base(),
        );
        let fingerprinter = Fingerprinter::new(config.effective_hash_workers());

        Ok(Self::new(store, settings, fingerprinter, client, cache))
    }

    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    /// Start a scan in the background and return its progress events
    ///
    /// Fails up front if no models root is configured or it does not exist.
    /// The channel closes after the terminal event. Dropping the receiver
    /// does not stop the scan.
    pub async fn start_scan(self: &Arc<Self>) -> SyncResult<mpsc::Receiver<ScanProgress>> {
        let root = self.settings.models_root().await.ok_or(SyncError::NoRoot)?;
        if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
            return Err(SyncError::InvalidPath(root));
        }

        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_scan(root, tx).await;
        });

        Ok(rx)
    }

    async fn run_scan(&self, root: PathBuf, tx: mpsc::Sender<ScanProgress>) {
        let _guard = self.scan_lock.lock().await;
        let started = std::time::Instant::now();
        tracing::info!(root = %root.display(), "Scan started");

        self.store.reconcile_with_disk().await;

        let walk_root = root.clone();
        let files = match tokio::task::spawn_blocking(move || scanner::enumerate(&walk_root)).await
        {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(error = %e, "Directory enumeration task failed");
                Vec::new()
            }
        };

        let total = files.len();
        if total == 0 {
            tracing::info!(root = %root.display(), "No model files found");
            emit(
                &tx,
                ScanProgress {
                    processed: 0,
                    total: 0,
                    kind: ProgressKind::NoFiles,
                },
            )
            .await;
            return;
        }

        tracing::info!(total, "Model files found");

        let (mut skipped, mut updated, mut errored) = (0usize, 0usize, 0usize);

        for (index, path) in files.into_iter().enumerate() {
            let kind = match self.process_item(&path).await {
                Ok(ItemOutcome::Skipped) => {
                    skipped += 1;
                    crate::metrics::record_scan_item("skipped");
                    ProgressKind::Skipped { path }
                }
                Ok(ItemOutcome::Updated) => {
                    updated += 1;
                    crate::metrics::record_scan_item("updated");
                    ProgressKind::Updated { path }
                }
                Err(e) => {
                    errored += 1;
                    crate::metrics::record_scan_item("errored");
                    tracing::warn!(path = %path.display(), error = %e, "Failed to process model file");
                    ProgressKind::Errored {
                        path,
                        error: e.to_string(),
                    }
                }
            };

            emit(
                &tx,
                ScanProgress {
                    processed: index + 1,
                    total,
                    kind,
                },
            )
            .await;
        }

        tracing::info!(
            total,
            skipped,
            updated,
            errored,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scan complete"
        );

        emit(
            &tx,
            ScanProgress {
                processed: total,
                total,
                kind: ProgressKind::Completed,
            },
        )
        .await;
    }

    /// Bring one file's catalog record up to date
    ///
    /// A failed catalog save is logged and does not fail the item; the record
    /// stays in memory and reaches disk with the next successful save.
    pub async fn process_item(&self, path: &Path) -> SyncResult<ItemOutcome> {
        let mtime = current_mtime(path)
            .await
            .map_err(|e| SyncError::file_access(path, e))?;

        if !self.store.is_stale(path, mtime).await {
            tracing::debug!(path = %path.display(), "Unchanged since last scan");
            return Ok(ItemOutcome::Skipped);
        }

        let hash = self.fingerprinter.fingerprint(path).await?;
        let remote = self.client.fetch(&hash).await?;

        let local_preview = match remote.preview_url() {
            Some(url) => self.cache.ensure_local(url).await,
            None => None,
        };

        self.store
            .upsert(path, ModelRecord::new(hash, remote, local_preview, mtime))
            .await;

        if let Err(e) = self.store.save().await {
            tracing::error!(path = %path.display(), error = %e, "Failed to persist catalog");
        }

        tracing::debug!(path = %path.display(), "Catalog record updated");
        Ok(ItemOutcome::Updated)
    }
}

/// Send an event, ignoring a consumer that has gone away
async fn emit(tx: &mpsc::Sender<ScanProgress>, progress: ScanProgress) {
    if tx.send(progress).await.is_err() {
        tracing::trace!("Progress consumer gone, scan continues");
    }
}
