//! Drives reconciliation cycles on a fixed interval.
//!
//! Each tick checks connectivity (network ping plus torrent client liveness),
//! fires due backend maintenance commands without awaiting them, and runs one
//! [`ReconciliationCycle`]. Errors and panics inside a cycle are caught and
//! logged; the loop keeps going until shutdown, which is only observed while
//! sleeping between ticks.

mod connectivity;

pub use connectivity::{ConnectivityCheck, HttpConnectivity, PING_TIMEOUT};

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::{Backend, BackendStatus};
use crate::config::SettingsConfig;
use crate::metrics;
use crate::reconcile::{CycleReport, ReconciliationCycle};

/// Sleep intervals for the loop.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub loop_sleep: Duration,
    pub no_internet_sleep: Duration,
}

impl From<&SettingsConfig> for SchedulerConfig {
    fn from(settings: &SettingsConfig) -> Self {
        Self {
            loop_sleep: Duration::from_secs(settings.loop_sleep_secs),
            no_internet_sleep: Duration::from_secs(settings.no_internet_sleep_secs),
        }
    }
}

/// Result of one tick.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    Completed(CycleReport),
    Failed(String),
    Panicked(String),
    Offline,
}

impl TickOutcome {
    fn metric_label(&self) -> &'static str {
        match self {
            TickOutcome::Completed(_) => "ok",
            TickOutcome::Failed(_) => "error",
            TickOutcome::Panicked(_) => "panic",
            TickOutcome::Offline => "offline",
        }
    }
}

/// Scheduler state for the status API.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub online: bool,
    pub cycles_run: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_report: Option<CycleReport>,
    pub last_error: Option<String>,
    pub backends: Vec<BackendStatus>,
}

pub struct Scheduler {
    cycle: Arc<Mutex<ReconciliationCycle>>,
    connectivity: Arc<dyn ConnectivityCheck>,
    config: SchedulerConfig,
    running: Arc<AtomicBool>,
    status: Arc<RwLock<SchedulerStatus>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Scheduler {
    pub fn new(
        cycle: ReconciliationCycle,
        connectivity: Arc<dyn ConnectivityCheck>,
        config: SchedulerConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let status = SchedulerStatus {
            backends: cycle.backend_statuses(),
            ..Default::default()
        };
        Self {
            cycle: Arc::new(Mutex::new(cycle)),
            connectivity,
            config,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(RwLock::new(status)),
            shutdown_tx,
        }
    }

    /// Spawn the loop. Returns None if already running.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return None;
        }

        let cycle = Arc::clone(&self.cycle);
        let connectivity = Arc::clone(&self.connectivity);
        let running = Arc::clone(&self.running);
        let status = Arc::clone(&self.status);
        let config = self.config;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        Some(tokio::spawn(async move {
            info!("Reconciliation loop started");
            loop {
                let outcome = Self::tick(&cycle, connectivity.as_ref(), &status).await;
                let sleep = match outcome {
                    TickOutcome::Offline => config.no_internet_sleep,
                    _ => config.loop_sleep,
                };

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Reconciliation loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(sleep) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                    }
                }
            }
            running.store(false, Ordering::SeqCst);
            info!("Reconciliation loop stopped");
        }))
    }

    /// Signal the loop to stop after its current cycle.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("Scheduler not running");
            return;
        }
        info!("Stopping reconciliation loop");
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub async fn status(&self) -> SchedulerStatus {
        let mut status = self.status.read().await.clone();
        status.running = self.is_running();
        status
    }

    /// Run a single tick now, outside the loop.
    pub async fn run_once(&self) -> TickOutcome {
        Self::tick(&self.cycle, self.connectivity.as_ref(), &self.status).await
    }

    async fn tick(
        cycle: &Mutex<ReconciliationCycle>,
        connectivity: &dyn ConnectivityCheck,
        status: &RwLock<SchedulerStatus>,
    ) -> TickOutcome {
        let now = Utc::now();
        let mut cycle = cycle.lock().await;

        let online = connectivity.is_online().await && Self::client_alive(&cycle).await;
        let outcome = if online {
            fire_maintenance(cycle.backends_mut(), now);
            match AssertUnwindSafe(cycle.run(now)).catch_unwind().await {
                Ok(Ok(report)) => {
                    debug!(
                        torrents = report.torrents_seen,
                        duration_ms = report.duration_ms,
                        "Cycle completed"
                    );
                    TickOutcome::Completed(report)
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Cycle failed");
                    TickOutcome::Failed(e.to_string())
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(panic = %message, "Cycle panicked");
                    TickOutcome::Panicked(message)
                }
            }
        } else {
            warn!("No connectivity, skipping cycle");
            TickOutcome::Offline
        };

        metrics::CYCLES_TOTAL
            .with_label_values(&[outcome.metric_label()])
            .inc();

        let mut status = status.write().await;
        status.online = online;
        status.last_tick_at = Some(now);
        status.backends = cycle.backend_statuses();
        match &outcome {
            TickOutcome::Completed(report) => {
                status.cycles_run += 1;
                status.last_report = Some(report.clone());
                status.last_error = if report.failed_operations.is_empty() {
                    None
                } else {
                    Some(format!(
                        "Client operations failed: {}",
                        report.failed_operations.join(", ")
                    ))
                };
            }
            TickOutcome::Failed(message) | TickOutcome::Panicked(message) => {
                status.cycles_run += 1;
                status.last_error = Some(message.clone());
            }
            TickOutcome::Offline => {}
        }

        outcome
    }

    async fn client_alive(cycle: &ReconciliationCycle) -> bool {
        match cycle.client().app_version().await {
            Ok(version) => {
                debug!(client = cycle.client().name(), %version, "Torrent client reachable");
                true
            }
            Err(e) => {
                warn!(client = cycle.client().name(), error = %e, "Torrent client unreachable");
                false
            }
        }
    }
}

/// Spawn every due maintenance command without awaiting it.
pub fn fire_maintenance(backends: &mut [Backend], now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();
    for backend in backends {
        for command in backend.due_maintenance(now) {
            let manager = Arc::clone(backend.manager());
            let name = backend.name().to_string();
            handles.push(tokio::spawn(async move {
                match manager.post_maintenance(command).await {
                    Ok(()) => debug!(backend = %name, command = command.as_str(), "Posted maintenance command"),
                    Err(e) => {
                        metrics::BACKEND_REQUEST_FAILURES
                            .with_label_values(&[name.as_str(), "maintenance"])
                            .inc();
                        warn!(
                            backend = %name,
                            command = command.as_str(),
                            error = %e,
                            "Maintenance command failed"
                        );
                    }
                }
            }));
        }
    }
    handles
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(42);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn test_scheduler_config_from_settings() {
        let settings = SettingsConfig::default();
        let config = SchedulerConfig::from(&settings);
        assert_eq!(config.loop_sleep, Duration::from_secs(5));
        assert_eq!(config.no_internet_sleep, Duration::from_secs(60));
    }
}
