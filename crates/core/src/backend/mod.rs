//! Request manager (Radarr/Sonarr) integration.
//!
//! A [`Backend`] wraps one configured request manager together with the state
//! the reconciliation loop keeps for it: the queue snapshot of the current
//! cycle, the hashes already handed off for import, and the maintenance
//! timers.

mod queue;
mod servarr;
mod timer;
mod types;

pub use queue::QueueSnapshot;
pub use servarr::ServarrClient;
pub use timer::MaintenanceTimer;
pub use types::*;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{BackendConfig, BackendKind, ImportMode};
use crate::metrics;
use crate::torrent_client::canonical_hash;

/// Page size used when fetching a backend queue.
pub const QUEUE_PAGE_SIZE: u32 = 10_000;

/// One managed request manager and its per-run state.
pub struct Backend {
    config: BackendConfig,
    manager: Arc<dyn RequestManager>,
    completed_folder: PathBuf,
    snapshot: QueueSnapshot,
    sent_to_scan: HashSet<String>,
    refresh_timer: MaintenanceTimer,
    rss_timer: MaintenanceTimer,
}

/// Point-in-time view of a backend for the status API.
#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub kind: BackendKind,
    pub category: String,
    pub queue_entries: usize,
    pub sent_to_scan: usize,
    pub last_refresh_downloads: Option<DateTime<Utc>>,
    pub last_rss_sync: Option<DateTime<Utc>>,
}

impl Backend {
    /// Create a backend whose completed downloads live in
    /// `completed_root/<category>`.
    pub fn new(
        config: BackendConfig,
        manager: Arc<dyn RequestManager>,
        completed_root: &Path,
    ) -> Self {
        let completed_folder = completed_root.join(&config.category);
        let refresh_timer = MaintenanceTimer::from_minutes(config.refresh_downloads_minutes);
        let rss_timer = MaintenanceTimer::from_minutes(config.rss_sync_minutes);
        Self {
            config,
            manager,
            completed_folder,
            snapshot: QueueSnapshot::default(),
            sent_to_scan: HashSet::new(),
            refresh_timer,
            rss_timer,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn kind(&self) -> BackendKind {
        self.config.kind
    }

    pub fn category(&self) -> &str {
        &self.config.category
    }

    pub fn research_enabled(&self) -> bool {
        self.config.research
    }

    pub fn import_mode(&self) -> ImportMode {
        self.config.import_mode
    }

    pub fn completed_folder(&self) -> &Path {
        &self.completed_folder
    }

    pub fn manager(&self) -> &Arc<dyn RequestManager> {
        &self.manager
    }

    pub fn snapshot(&self) -> &QueueSnapshot {
        &self.snapshot
    }

    /// Rebuild the queue snapshot. On failure the backend is treated as
    /// having an empty queue until the next refresh.
    pub async fn refresh_queue(&mut self) -> Result<usize, BackendError> {
        match self.manager.get_queue(QUEUE_PAGE_SIZE).await {
            Ok(entries) => {
                self.snapshot = QueueSnapshot::from_entries(self.config.kind, &entries);
                debug!(
                    backend = %self.config.name,
                    entries = self.snapshot.len(),
                    "Refreshed backend queue"
                );
                Ok(self.snapshot.len())
            }
            Err(e) => {
                self.snapshot = QueueSnapshot::default();
                metrics::BACKEND_REQUEST_FAILURES
                    .with_label_values(&[self.config.name.as_str(), "get_queue"])
                    .inc();
                warn!(backend = %self.config.name, error = %e, "Failed to refresh backend queue");
                Err(e)
            }
        }
    }

    pub fn is_sent_to_scan(&self, hash: &str) -> bool {
        self.sent_to_scan.contains(&canonical_hash(hash))
    }

    pub fn mark_sent_to_scan(&mut self, hash: &str) {
        self.sent_to_scan.insert(canonical_hash(hash));
    }

    /// Forget every hand-off; called once the completed folder is empty.
    pub fn clear_sent_to_scan(&mut self) {
        self.sent_to_scan.clear();
    }

    pub fn sent_to_scan(&self) -> &HashSet<String> {
        &self.sent_to_scan
    }

    /// Maintenance commands due at `now`. Each timer is marked fired.
    pub fn due_maintenance(&mut self, now: DateTime<Utc>) -> Vec<MaintenanceCommand> {
        let mut due = Vec::new();
        if self.refresh_timer.try_fire(now) {
            due.push(MaintenanceCommand::RefreshMonitoredDownloads);
        }
        if self.rss_timer.try_fire(now) {
            due.push(MaintenanceCommand::RssSync);
        }
        due
    }

    pub fn status(&self) -> BackendStatus {
        BackendStatus {
            name: self.config.name.clone(),
            kind: self.config.kind,
            category: self.config.category.clone(),
            queue_entries: self.snapshot.len(),
            sent_to_scan: self.sent_to_scan.len(),
            last_refresh_downloads: self.refresh_timer.last_fired(),
            last_rss_sync: self.rss_timer.last_fired(),
        }
    }
}
