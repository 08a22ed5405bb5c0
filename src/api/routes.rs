//! API route definitions

use crate::models::{OverrideStore, PREVIEW_ROUTE};
use crate::sync::SyncEngine;
use axum::{
    Router,
    routing::{get, post},
};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use super::handlers;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
    pub overrides: Arc<OverrideStore>,
    /// Registry website root used for model page links
    pub site_base: String,
    /// Directory served under the preview route
    pub image_dir: PathBuf,
    pub prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let previews = ServeDir::new(&state.image_dir);

    Router::new()
        // Health and status
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        // Catalog
        .route("/api/models", get(handlers::list_models))
        .route("/api/scan", get(handlers::scan))
        .route("/api/toggle-nsfw", post(handlers::toggle_nsfw))
        // Settings
        .route("/api/config", get(handlers::get_config))
        .route("/api/model-path", get(handlers::get_model_path))
        .route("/api/path", post(handlers::update_path))
        .nest_service(PREVIEW_ROUTE, previews)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
