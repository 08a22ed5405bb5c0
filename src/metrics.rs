//! Prometheus metrics

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Setup Prometheus metrics exporter
/// Returns a handle that can be used to retrieve metrics
pub fn setup_metrics() -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    tracing::info!("Prometheus metrics exporter installed");

    Ok(handle)
}

/// Record a scanned file by outcome (skipped, updated, errored)
pub fn record_scan_item(outcome: &'static str) {
    metrics::counter!("model_catalog_scan_items_total", "outcome" => outcome).increment(1);
}

/// Record a registry lookup by result
pub fn record_registry_request(result: &'static str) {
    metrics::counter!("model_catalog_registry_requests_total", "result" => result).increment(1);
}

/// Record a preview image request by result (cached, downloaded, failed)
pub fn record_image_download(result: &'static str) {
    metrics::counter!("model_catalog_image_downloads_total", "result" => result).increment(1);
}

/// Record records dropped because their file disappeared
pub fn record_reconciled(count: usize) {
    metrics::counter!("model_catalog_records_reconciled_total").increment(count as u64);
}

/// Update catalog size gauge
pub fn update_catalog_size(count: usize) {
    metrics::gauge!("model_catalog_records").set(count as f64);
}
