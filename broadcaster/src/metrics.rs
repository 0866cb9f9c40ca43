//! Prometheus metrics
//!
//! Installs the global recorder, describes every metric the broadcaster
//! records and serves them on the internal listener.
//!
//! Naming:
//! - `webhook_`: dispatch work queue
//! - `cache_`: resource inventory cache
//! - `http_`: webhook listener

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::api::health;

/// Install the Prometheus recorder. Fails if a recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(handle)
}

/// Router for the internal listener: `/metrics` and `/health`
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        )
        .route("/health", get(health::health_check))
}

fn register_metrics() {
    // =========================================================================
    // Work queue
    // =========================================================================

    describe_gauge!("webhook_depth", "Current depth of the webhook workqueue");
    describe_counter!("webhook_adds_total", "Total number of adds handled by the workqueue");
    describe_counter!("webhook_retries_total", "Total number of retries handled by the workqueue");
    describe_histogram!(
        "webhook_queue_latency_seconds",
        "How long an item stays in the workqueue before being processed"
    );
    describe_histogram!(
        "webhook_work_duration_seconds",
        "How long processing an item from the workqueue takes"
    );
    describe_counter!("webhook_success_total", "Items dispatched successfully");
    describe_counter!("webhook_errors_total", "Items dropped after exhausting their retries");
    describe_counter!(
        "webhook_dropped_total",
        "Queued or retry-pending items discarded at shutdown"
    );

    // =========================================================================
    // Resource cache
    // =========================================================================

    describe_gauge!("cache_pipelines", "Pipelines currently held in the resource cache");
    describe_counter!("cache_updates_total", "Completed resource cache refreshes");
    describe_counter!(
        "cache_update_errors_total",
        "Cluster or team refresh failures that kept stale entries"
    );

    // =========================================================================
    // HTTP
    // =========================================================================

    describe_counter!(
        "http_requests_total",
        "Webhook requests by status code and method (labels: code, method)"
    );
}
