//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the daemon:
//! - HTTP request metrics (latency, counts)
//! - Scheduler state (collected dynamically)
//! - Every core metric (cycles, actions, backend failures, sweeps)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "queuewarden_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("queuewarden_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Whether the reconciliation loop is running (0 or 1).
pub static SCHEDULER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "queuewarden_scheduler_running",
        "Whether the reconciliation loop is running",
    )
    .unwrap()
});

/// Result of the last connectivity check (0 or 1).
pub static SCHEDULER_ONLINE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "queuewarden_scheduler_online",
        "Whether the last connectivity check succeeded",
    )
    .unwrap()
});

/// Downloads already handed off for import, across backends.
pub static SENT_TO_SCAN: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "queuewarden_sent_to_scan",
        "Completed downloads handed to a backend and not yet forgotten",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    let mut metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // HTTP
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        // Scheduler
        Box::new(SCHEDULER_RUNNING.clone()),
        Box::new(SCHEDULER_ONLINE.clone()),
        Box::new(SENT_TO_SCAN.clone()),
    ];
    // Core metrics (cycles, actions, backends, sweeps)
    metrics.extend(queuewarden_core::metrics::all_metrics());

    for metric in metrics {
        if let Err(e) = registry.register(metric) {
            warn!(error = %e, "Failed to register metric");
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the scheduler gauges reflect the latest tick.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.scheduler().status().await;
    SCHEDULER_RUNNING.set(i64::from(status.running));
    SCHEDULER_ONLINE.set(i64::from(status.online));
    SENT_TO_SCAN.set(status.backends.iter().map(|b| b.sent_to_scan as i64).sum());
}
