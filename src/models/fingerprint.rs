//! Content fingerprinting for model files
//!
//! Model files run to several gigabytes, so hashing streams the file through
//! SHA-256 in fixed chunks on tokio's blocking pool.

use crate::error::{SyncError, SyncResult};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Read size for each hashing step
const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the SHA-256 hex digest of a file, blocking the calling thread
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Hashes files off the async workers, at most `workers` at a time
#[derive(Clone)]
pub struct Fingerprinter {
    workers: Arc<Semaphore>,
}

impl Fingerprinter {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Fingerprint a file
    ///
    /// Missing or unreadable files yield `SyncError::FileAccess`.
    pub async fn fingerprint(&self, path: &Path) -> SyncResult<String> {
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|e| SyncError::file_access(path, io::Error::other(e)))?;

        let owned: PathBuf = path.to_path_buf();
        let started = std::time::Instant::now();

        let digest = tokio::task::spawn_blocking(move || hash_file(&owned))
            .await
            .map_err(|e| SyncError::file_access(path, io::Error::other(e)))?
            .map_err(|e| SyncError::file_access(path, e))?;

        tracing::debug!(
            path = %path.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fingerprint computed"
        );

        Ok(digest)
    }
}
