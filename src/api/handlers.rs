//! API request handlers

use super::models::{
    ConfigResponse, HealthResponse, ModelDisplay, ModelPathResponse, PathUpdate,
    PathUpdateResponse, ToggleRequest, ToggleResponse,
};
use super::routes::AppState;
use crate::error::ApiError;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::sse::{Event, Sse},
};
use std::path::{Path, PathBuf};
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};

/// GET /health - Service health check
pub async fn health() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now(),
        }),
    )
}

/// GET /metrics - Prometheus metrics
pub async fn metrics(State(state): State<AppState>) -> String {
    state.prometheus_handle.render()
}

/// GET /api/models - Catalog entries under the current models root
///
/// Empty while no models root is configured.
pub async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelDisplay>> {
    let Some(root) = state.engine.settings().models_root().await else {
        return Json(Vec::new());
    };
    let records = state.engine.store().list().await;

    let mut models = Vec::with_capacity(records.len());
    for (path, record) in records {
        if !Path::new(&path).starts_with(&root) {
            continue;
        }
        let sensitive = state.overrides.is_sensitive(Path::new(&path)).await;
        models.push(ModelDisplay::from_record(
            &path,
            &record,
            sensitive,
            &state.site_base,
        ));
    }

    Json(models)
}

/// GET /api/scan - Run a scan, streaming progress as server-sent events
pub async fn scan(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let progress = state.engine.start_scan().await?;

    let events = ReceiverStream::new(progress).map(|p| Event::default().json_data(p.to_event()));

    Ok(Sse::new(events))
}

/// POST /api/toggle-nsfw - Flip the manual sensitivity override of a model
pub async fn toggle_nsfw(
    State(state): State<AppState>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, ApiError> {
    if req.model_id.is_empty() {
        return Err(ApiError::BadRequest("model_id is required".to_string()));
    }

    let nsfw = state.overrides.toggle(Path::new(&req.model_id)).await?;

    Ok(Json(ToggleResponse {
        success: true,
        model_id: req.model_id,
        nsfw,
    }))
}

/// GET /api/config - Current models root and whether it exists
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let root = state.engine.settings().models_root().await;
    let is_path_valid = match &root {
        Some(root) => tokio::fs::try_exists(root).await.unwrap_or(false),
        None => false,
    };

    Json(ConfigResponse {
        models_path: display_root(root),
        is_path_valid,
    })
}

/// GET /api/model-path - Current models root
pub async fn get_model_path(State(state): State<AppState>) -> Json<ModelPathResponse> {
    let root = state.engine.settings().models_root().await;
    Json(ModelPathResponse {
        path: display_root(root),
    })
}

/// POST /api/path - Change the models root
pub async fn update_path(
    State(state): State<AppState>,
    Json(req): Json<PathUpdate>,
) -> Result<Json<PathUpdateResponse>, ApiError> {
    if req.path.is_empty() {
        return Err(ApiError::BadRequest("path is required".to_string()));
    }

    state
        .engine
        .settings()
        .set_models_root(&PathBuf::from(&req.path))
        .await?;

    Ok(Json(PathUpdateResponse {
        message: "Path updated".to_string(),
        path: req.path,
    }))
}

fn display_root(root: Option<PathBuf>) -> String {
    root.map(|r| r.to_string_lossy().into_owned())
        .unwrap_or_default()
}
