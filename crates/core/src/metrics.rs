//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Reconciliation cycles (results, duration)
//! - Actions applied to the torrent client
//! - Backend requests and import hand-offs
//! - Completed folder sweeps

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Cycle Metrics
// =============================================================================

/// Reconciliation cycles total by result.
pub static CYCLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("queuewarden_cycles_total", "Total reconciliation cycles"),
        &["result"], // "ok", "error", "panic", "offline"
    )
    .unwrap()
});

/// Cycle duration in seconds.
pub static CYCLE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "queuewarden_cycle_duration_seconds",
            "Duration of one reconciliation cycle",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
    )
    .unwrap()
});

/// Torrents seen in the last cycle.
pub static TORRENTS_SEEN: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "queuewarden_torrents_seen",
        "Torrents listed by the client in the last cycle",
    )
    .unwrap()
});

// =============================================================================
// Action Metrics
// =============================================================================

/// Actions applied by kind.
pub static ACTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("queuewarden_actions_total", "Total actions applied"),
        &["action"], // "pause", "delete", "delete_exempt", "recheck", "resume", "exclude_files"
    )
    .unwrap()
});

/// Import scans posted to backends.
pub static IMPORTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("queuewarden_imports_total", "Import scans posted"),
        &["backend"],
    )
    .unwrap()
});

/// Re-searches requested from backends.
pub static RESEARCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("queuewarden_researches_total", "Re-searches requested"),
        &["backend"],
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// Failed backend requests.
pub static BACKEND_REQUEST_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "queuewarden_backend_request_failures_total",
            "Failed backend requests",
        ),
        &["backend", "operation"],
    )
    .unwrap()
});

/// Failed torrent client requests.
pub static CLIENT_REQUEST_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "queuewarden_client_request_failures_total",
            "Failed torrent client requests",
        ),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Cleanup Metrics
// =============================================================================

/// Files deleted by the completed folder sweep.
pub static FILES_SWEPT: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "queuewarden_files_swept_total",
        "Files deleted from completed folders",
    )
    .unwrap()
});

/// Empty folders removed by the sweep.
pub static FOLDERS_PRUNED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "queuewarden_folders_pruned_total",
        "Empty folders removed from completed folders",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Cycles
        Box::new(CYCLES_TOTAL.clone()),
        Box::new(CYCLE_DURATION.clone()),
        Box::new(TORRENTS_SEEN.clone()),
        // Actions
        Box::new(ACTIONS_TOTAL.clone()),
        Box::new(IMPORTS_TOTAL.clone()),
        Box::new(RESEARCHES_TOTAL.clone()),
        // External services
        Box::new(BACKEND_REQUEST_FAILURES.clone()),
        Box::new(CLIENT_REQUEST_FAILURES.clone()),
        // Cleanup
        Box::new(FILES_SWEPT.clone()),
        Box::new(FOLDERS_PRUNED.clone()),
    ]
}
