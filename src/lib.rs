//! Model Catalog - local model files enriched from a remote registry
//!
//! Scans a models directory for `.safetensors` files, identifies each by
//! content hash, fetches its metadata and preview image from the registry, and
//! keeps the resulting catalog in sync as files come and go.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod settings;
pub mod storage;
pub mod sync;

pub use config::CatalogConfig;
pub use error::{ApiError, SyncError, SyncResult};
pub use models::{MetadataStore, ModelRecord, OverrideStore, RemoteMetadata};
pub use settings::SettingsStore;
pub use sync::{ItemOutcome, ProgressEvent, ProgressKind, ScanProgress, SyncEngine};
