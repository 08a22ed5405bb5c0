//! Candidate file discovery under the models root
//!
//! Only two subfolders of the root are scanned, recursively:
//! ```text
//! {root}/
//! ├── checkpoints/**/*.safetensors
//! └── loras/**/*.safetensors
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

/// Subfolders of the root that hold model files
pub const ALLOWED_FOLDERS: [&str; 2] = ["checkpoints", "loras"];

/// Extension of model files
pub const MODEL_EXTENSION: &str = "safetensors";

/// List every model file under the allowed subfolders of `root`
///
/// Unreadable directory entries are skipped. Order is unspecified.
pub fn enumerate(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for folder in ALLOWED_FOLDERS {
        let folder_path = root.join(folder);
        if !folder_path.is_dir() {
            continue;
        }

        for entry in WalkDir::new(&folder_path).follow_links(true) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if entry.file_type().is_file() && is_model_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }

    files
}

fn is_model_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == MODEL_EXTENSION)
}

/// Modification time as fractional Unix seconds
pub async fn current_mtime(path: &Path) -> io::Result<f64> {
    unix_seconds(tokio::fs::metadata(path).await?.modified()?)
}

fn unix_seconds(time: SystemTime) -> io::Result<f64> {
    let since_epoch = time.duration_since(UNIX_EPOCH).map_err(io::Error::other)?;
    Ok(since_epoch.as_secs_f64())
}
