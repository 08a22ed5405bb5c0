//! Model catalog components
//!
//! Provides functionality for:
//! - Finding model files under the configured root
//! - Fingerprinting model files by content
//! - Looking up model versions in the remote registry
//! - Caching registry preview images locally
//! - Persisting the catalog between runs
//! - Manual sensitivity overrides

pub mod cache;
pub mod client;
pub mod fingerprint;
pub mod metadata;
pub mod overrides;
pub mod scanner;
pub mod store;

pub use cache::{ImageCache, PREVIEW_ROUTE, preview_file_name};
pub use client::RegistryClient;
pub use fingerprint::{Fingerprinter, hash_file};
pub use metadata::{ImageDescriptor, ModelInfo, ModelRecord, ModelSummary, RemoteMetadata};
pub use overrides::OverrideStore;
pub use scanner::{ALLOWED_FOLDERS, MODEL_EXTENSION, enumerate};
pub use store::{LoadReport, MetadataStore};
