//! Common test fixtures: an in-process fake registry and a scan harness

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path as UrlPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use model_catalog::{
    CatalogConfig, MetadataStore, ScanProgress, SettingsStore, SyncEngine, models::hash_file,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio::sync::mpsc;

#[derive(Clone, Default)]
struct FakeState {
    payloads: Arc<Mutex<HashMap<String, Value>>>,
    /// Hashes whose lookup never answers in time
    hanging: Arc<Mutex<HashSet<String>>>,
    lookup_delay: Arc<Mutex<Duration>>,
    lookups: Arc<AtomicUsize>,
    lookups_in_flight: Arc<AtomicUsize>,
    peak_lookups_in_flight: Arc<AtomicUsize>,
    image_requests: Arc<AtomicUsize>,
    /// Requests seen per flaky image name
    flaky_attempts: Arc<Mutex<HashMap<String, usize>>>,
}

/// Delay of a hanging lookup, far beyond any client timeout used in tests
const HANG: Duration = Duration::from_secs(30);

/// Requests a flaky image fails before it is served
pub const FLAKY_FAILURES: usize = 2;

/// Registry stand-in serving hash lookups and preview images
///
/// - `GET /api/v1/model-versions/by-hash/{hash}`: registered payload or 404
/// - `GET /images/{name}`: image bytes
/// - `GET /broken/{name}`: always 500
/// - `GET /flaky/{name}`: 503 for the first [`FLAKY_FAILURES`] requests, then bytes
pub struct FakeRegistry {
    pub origin: String,
    state: FakeState,
}

impl FakeRegistry {
    pub async fn start() -> Self {
        let state = FakeState::default();

        let app = Router::new()
            .route("/api/v1/model-versions/by-hash/{hash}", get(lookup))
            .route("/images/{name}", get(image))
            .route("/broken/{name}", get(broken_image))
            .route("/flaky/{name}", get(flaky_image))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake registry");
        let addr = listener.local_addr().expect("Fake registry has no address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            origin: format!("http://{}", addr),
            state,
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}/api/v1", self.origin)
    }

    pub fn image_url(&self, name: &str) -> String {
        format!("{}/images/{}", self.origin, name)
    }

    pub fn broken_image_url(&self, name: &str) -> String {
        format!("{}/broken/{}", self.origin, name)
    }

    pub fn flaky_image_url(&self, name: &str) -> String {
        format!("{}/flaky/{}", self.origin, name)
    }

    /// Never answer lookups for `hash` within a test's timeout
    pub fn hang(&self, hash: &str) {
        self.state.hanging.lock().unwrap().insert(hash.to_string());
    }

    /// Hold every lookup for `delay` before answering
    pub fn set_lookup_delay(&self, delay: Duration) {
        *self.state.lookup_delay.lock().unwrap() = delay;
    }

    /// Most lookups the registry was serving at the same moment
    pub fn peak_lookups_in_flight(&self) -> usize {
        self.state.peak_lookups_in_flight.load(Ordering::SeqCst)
    }

    /// Answer lookups for `hash` with `payload`
    pub fn register(&self, hash: &str, payload: Value) {
        self.state
            .payloads
            .lock()
            .unwrap()
            .insert(hash.to_string(), payload);
    }

    pub fn lookups(&self) -> usize {
        self.state.lookups.load(Ordering::SeqCst)
    }

    pub fn image_requests(&self) -> usize {
        self.state.image_requests.load(Ordering::SeqCst)
    }
}

async fn lookup(State(state): State<FakeState>, UrlPath(hash): UrlPath<String>) -> Response {
    state.lookups.fetch_add(1, Ordering::SeqCst);
    let in_flight = state.lookups_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state
        .peak_lookups_in_flight
        .fetch_max(in_flight, Ordering::SeqCst);

    let delay = if state.hanging.lock().unwrap().contains(&hash) {
        HANG
    } else {
        *state.lookup_delay.lock().unwrap()
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    state.lookups_in_flight.fetch_sub(1, Ordering::SeqCst);

    let payload = state.payloads.lock().unwrap().get(&hash).cloned();
    match payload {
        Some(payload) => Json(payload).into_response(),
        None => (StatusCode::NOT_FOUND, "Model not found").into_response(),
    }
}

async fn image(State(state): State<FakeState>, UrlPath(name): UrlPath<String>) -> Response {
    state.image_requests.fetch_add(1, Ordering::SeqCst);
    format!("image-bytes-{}", name).into_response()
}

async fn broken_image(State(state): State<FakeState>, UrlPath(_name): UrlPath<String>) -> Response {
    state.image_requests.fetch_add(1, Ordering::SeqCst);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

async fn flaky_image(State(state): State<FakeState>, UrlPath(name): UrlPath<String>) -> Response {
    state.image_requests.fetch_add(1, Ordering::SeqCst);
    let seen = {
        let mut attempts = state.flaky_attempts.lock().unwrap();
        let count = attempts.entry(name.clone()).or_insert(0);
        *count += 1;
        *count
    };
    if seen <= FLAKY_FAILURES {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    } else {
        format!("image-bytes-{}", name).into_response()
    }
}

/// Registry payload with one preview image
pub fn payload(name: &str, image_url: &str, nsfw: bool) -> Value {
    serde_json::json!({
        "id": 11,
        "modelId": 7,
        "baseModel": "SD 1.5",
        "model": {"name": name, "type": "Checkpoint", "nsfw": nsfw},
        "images": [{"url": image_url, "nsfwLevel": 1}]
    })
}

/// Temp models root plus an engine wired to a fake registry
pub struct Harness {
    pub root: TempDir,
    pub data: TempDir,
    pub registry: FakeRegistry,
    pub config: CatalogConfig,
    pub settings: Arc<SettingsStore>,
    pub store: Arc<MetadataStore>,
    pub engine: Arc<SyncEngine>,
}

impl Harness {
    /// Harness with the models root already configured
    pub async fn new() -> Self {
        let harness = Self::without_root().await;
        harness
            .settings
            .set_models_root(harness.root.path())
            .await
            .expect("Failed to set models root");
        harness
    }

    /// Harness whose settings have no models root
    pub async fn without_root() -> Self {
        let root = TempDir::new().expect("Failed to create models root");
        let data = TempDir::new().expect("Failed to create data dir");
        let registry = FakeRegistry::start().await;

        let config = CatalogConfig {
            settings_file: data.path().join("config.json"),
            catalog_file: data.path().join("models_info.json"),
            image_cache_dir: data.path().join("images"),
            registry_base_url: registry.base_url(),
            request_timeout_secs: 5,
            download_retry_base_ms: 1,
            hash_workers: Some(2),
            ..Default::default()
        };
        std::fs::create_dir_all(&config.image_cache_dir).unwrap();

        let settings = Arc::new(SettingsStore::new(config.settings_file.clone()));
        settings.load().await.expect("Failed to load settings");

        let store = Arc::new(MetadataStore::new(
            config.catalog_file.clone(),
            config.image_cache_dir.clone(),
        ));
        store.load().await;

        let engine = Arc::new(
            SyncEngine::from_config(&config, store.clone(), settings.clone())
                .expect("Failed to build engine"),
        );

        Self {
            root,
            data,
            registry,
            config,
            settings,
            store,
            engine,
        }
    }

    /// Write a model file under the root, returning its absolute path
    pub fn write_model(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.root.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Write a model file and register it with the fake registry
    pub fn add_known_model(&self, relative: &str, contents: &str, image: &str) -> PathBuf {
        let path = self.write_model(relative, contents);
        let hash = hash_file(&path).unwrap();
        self.registry
            .register(&hash, payload(relative, &self.registry.image_url(image), false));
        path
    }

    pub fn image_path(&self, name: &str) -> PathBuf {
        self.config.image_cache_dir.join(name)
    }

    /// Run a full scan and collect every event
    pub async fn scan(&self) -> Vec<ScanProgress> {
        let rx = self.engine.start_scan().await.expect("Failed to start scan");
        collect(rx).await
    }
}

/// Drain a progress channel, failing the test if the scan stalls
pub async fn collect(mut rx: mpsc::Receiver<ScanProgress>) -> Vec<ScanProgress> {
    let mut events = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(30), rx.recv()).await {
            Ok(Some(event)) => events.push(event),
            Ok(None) => break,
            Err(_) => panic!("Scan stalled after {} events", events.len()),
        }
    }
    events
}

/// Set a file's modification time explicitly
pub fn set_mtime(path: &Path, time: SystemTime) {
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}
