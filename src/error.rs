//! Error types for the sync engine and API responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

/// Why a registry lookup did not produce metadata
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryFailure {
    /// Registry has no model version for this hash (HTTP 404)
    #[error("not found")]
    NotFound,
    /// Any other non-200 status
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    /// 200 response whose body was not valid metadata JSON
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Errors produced by the synchronization engine
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cannot read {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry lookup for {hash} failed: {failure}")]
    Registry {
        hash: String,
        failure: RegistryFailure,
    },

    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("catalog persistence failed for {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    #[error("cleanup of {} failed: {source}", path.display())]
    Reconciliation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no models directory configured")]
    NoRoot,

    #[error("path does not exist: {}", .0.display())]
    InvalidPath(PathBuf),
}

impl SyncError {
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// API error types
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            timestamp: chrono::Utc::now(),
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::NoRoot | SyncError::InvalidPath(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    timestamp: chrono::DateTime<chrono::Utc>,
}
