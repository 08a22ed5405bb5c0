//! Model Catalog - Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use model_catalog::{
    CatalogConfig, MetadataStore, OverrideStore, SettingsStore, SyncEngine, api, metrics,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(name = "model-catalog")]
#[command(about = "Model file catalog synchronized with a remote registry", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override API port
    #[arg(long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    log_format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    match cli.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .init();
        }
    }

    tracing::info!("Starting Model Catalog");

    // Load configuration
    let mut config = CatalogConfig::load(cli.config)?;

    // CLI overrides
    if let Some(port) = cli.port {
        config.api_port = port;
    }

    config.validate()?;

    tracing::info!(
        api_port = config.api_port,
        settings_file = ?config.settings_file,
        catalog_file = ?config.catalog_file,
        registry = %config.registry_base_url,
        "Configuration loaded"
    );

    // Setup metrics
    let prometheus_handle = metrics::setup_metrics()?;

    // Settings hold the models root and the sensitivity overrides
    let settings = Arc::new(SettingsStore::new(config.settings_file.clone()));
    settings
        .load()
        .await
        .context("Failed to initialize settings file")?;

    // Catalog, reconciled against disk on load
    let store = Arc::new(MetadataStore::new(
        config.catalog_file.clone(),
        config.image_cache_dir.clone(),
    ));
    let report = store.load().await;
    if report.corrupt {
        tracing::warn!(
            path = ?config.catalog_file,
            "Catalog could not be read; the next save will replace it"
        );
    }

    let engine = Arc::new(SyncEngine::from_config(
        &config,
        store.clone(),
        settings.clone(),
    )?);
    let overrides = Arc::new(OverrideStore::new(settings, store.clone()));

    // Setup API
    let app_state = api::AppState {
        engine,
        overrides,
        site_base: config.registry_site_url(),
        image_dir: config.image_cache_dir.clone(),
        prometheus_handle,
    };

    let app = api::create_router(app_state);

    let addr = std::net::SocketAddr::new(config.host, config.api_port);
    tracing::info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind API server")?;

    // Graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    tracing::info!("Shutting down...");

    // Save final state
    tracing::info!("Saving catalog");
    store.save().await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}
