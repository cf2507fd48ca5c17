//! One reconciliation pass over the torrent client.
//!
//! A cycle lists every torrent, refreshes each backend's queue snapshot,
//! classifies every download, executes the resulting [`ActionSet`] and, when
//! enabled, sweeps the completed folders. Steps run strictly in that order.

mod action_set;
mod executor;
mod sweep;

pub use action_set::{ActionSet, ImportRequest};
pub use executor::{resolve_content_path, ActionExecutor, ExecutionReport, PathRetry};
pub use sweep::{sweep_completed_folder, SweepReport};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendStatus};
use crate::classifier::{classify, Action, ClassifyContext, Thresholds};
use crate::config::SettingsConfig;
use crate::filter::ContentFilter;
use crate::metrics;
use crate::torrent_client::{TorrentClient, TorrentClientError, TorrentFilters, TorrentInfo};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Torrent client error: {0}")]
    Client(#[from] TorrentClientError),
}

/// Summary of one cycle, exposed on the status API.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub torrents_seen: usize,
    pub backends_unreachable: usize,
    pub paused: usize,
    pub deleted: usize,
    pub deleted_exempt: usize,
    pub rechecked: usize,
    pub resumed: usize,
    pub files_excluded: usize,
    pub imported: usize,
    pub researched: usize,
    pub files_swept: usize,
    pub folders_pruned: usize,
    /// Client bulk operations that failed; the rest of the cycle still ran.
    pub failed_operations: Vec<String>,
}

/// Owns the per-run state (backends) and drives one pass at a time.
pub struct ReconciliationCycle {
    client: Arc<dyn TorrentClient>,
    backends: Vec<Backend>,
    filter: Arc<ContentFilter>,
    settings: SettingsConfig,
    executor: ActionExecutor,
}

impl ReconciliationCycle {
    pub fn new(
        client: Arc<dyn TorrentClient>,
        backends: Vec<Backend>,
        filter: Arc<ContentFilter>,
        settings: SettingsConfig,
    ) -> Self {
        let executor = ActionExecutor::new(Arc::clone(&client), PathRetry::default());
        Self {
            client,
            backends,
            filter,
            settings,
            executor,
        }
    }

    /// Override the content path retry policy.
    pub fn with_path_retry(mut self, retry: PathRetry) -> Self {
        self.executor = ActionExecutor::new(Arc::clone(&self.client), retry);
        self
    }

    pub fn client(&self) -> &Arc<dyn TorrentClient> {
        &self.client
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    pub fn backends_mut(&mut self) -> &mut [Backend] {
        &mut self.backends
    }

    pub fn backend_statuses(&self) -> Vec<BackendStatus> {
        self.backends.iter().map(Backend::status).collect()
    }

    /// Run one full pass. Only a failed torrent listing aborts it; every
    /// later failure is logged and recorded in the report.
    pub async fn run(&mut self, now: DateTime<Utc>) -> Result<CycleReport, CycleError> {
        let started = std::time::Instant::now();
        let mut report = CycleReport {
            started_at: Some(now),
            ..Default::default()
        };

        let mut torrents = self
            .client
            .list_torrents(&TorrentFilters::default())
            .await
            .map_err(|e| {
                metrics::CLIENT_REQUEST_FAILURES
                    .with_label_values(&["list_torrents"])
                    .inc();
                e
            })?;
        report.torrents_seen = torrents.len();
        metrics::TORRENTS_SEEN.set(torrents.len() as i64);

        for backend in &mut self.backends {
            if backend.refresh_queue().await.is_err() {
                report.backends_unreachable += 1;
            }
        }

        self.load_files(&mut torrents).await;

        let mut set = ActionSet::new();
        {
            let ctx = ClassifyContext::new(
                now,
                Thresholds::from(&self.settings),
                &self.settings.failed_category,
                &self.backends,
                &self.filter,
            );
            for torrent in &torrents {
                let decision = classify(torrent, &ctx);
                log_decision(torrent, decision.rule, &decision.action);
                set.record(torrent, decision.action);
            }
        }

        let execution = self.executor.execute(&mut set, &mut self.backends).await;
        report.paused = execution.paused;
        report.deleted = execution.deleted;
        report.deleted_exempt = execution.deleted_exempt;
        report.rechecked = execution.rechecked;
        report.resumed = execution.resumed;
        report.files_excluded = execution.files_excluded;
        report.imported = execution.imported;
        report.researched = execution.researched;
        report.failed_operations = execution
            .failed_operations
            .iter()
            .map(|op| op.to_string())
            .collect();

        if self.settings.auto_delete {
            for backend in &mut self.backends {
                let swept = sweep_completed_folder(backend.completed_folder(), &self.filter).await;
                report.files_swept += swept.files_removed;
                report.folders_pruned += swept.folders_removed;
                if swept.folder_empty && !backend.sent_to_scan().is_empty() {
                    debug!(backend = %backend.name(), "Completed folder empty, forgetting imports");
                    backend.clear_sent_to_scan();
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        metrics::CYCLE_DURATION.observe(started.elapsed().as_secs_f64());
        Ok(report)
    }

    /// File lists are only needed by the content filter rule.
    async fn load_files(&self, torrents: &mut [TorrentInfo]) {
        for torrent in torrents.iter_mut() {
            let managed = self
                .backends
                .iter()
                .any(|b| b.category() == torrent.category());
            if !managed || !torrent.state.is_downloading() {
                continue;
            }
            match self.client.torrent_files(&torrent.hash).await {
                Ok(files) => torrent.files = files,
                Err(e) => {
                    metrics::CLIENT_REQUEST_FAILURES
                        .with_label_values(&["torrent_files"])
                        .inc();
                    warn!(hash = %torrent.hash, error = %e, "Failed to load torrent files");
                }
            }
        }
    }
}

fn log_decision(torrent: &TorrentInfo, rule: &str, action: &Action) {
    let progress = (torrent.progress * 10000.0).round() / 100.0;
    match action {
        Action::None => debug!(
            hash = %torrent.hash,
            category = torrent.category(),
            state = torrent.state.as_str(),
            progress,
            rule,
            name = %torrent.name,
            "Leaving torrent as is"
        ),
        Action::Pause => info!(
            hash = %torrent.hash,
            category = torrent.category(),
            state = torrent.state.as_str(),
            name = %torrent.name,
            "Pausing uploading torrent"
        ),
        Action::Delete(reason) => info!(
            hash = %torrent.hash,
            category = torrent.category(),
            reason = reason.as_str(),
            progress,
            eta_secs = ?torrent.eta_secs,
            availability = torrent.availability,
            rule,
            name = %torrent.name,
            "Deleting torrent"
        ),
        Action::Recheck => info!(
            hash = %torrent.hash,
            category = torrent.category(),
            name = %torrent.name,
            "Rechecking errored torrent"
        ),
        Action::FilterFiles { exclude, resume } => debug!(
            hash = %torrent.hash,
            category = torrent.category(),
            excluded = exclude.len(),
            resume,
            name = %torrent.name,
            "Filtering torrent files"
        ),
        Action::Import { category } => info!(
            hash = %torrent.hash,
            category = %category,
            name = %torrent.name,
            "Queueing completed torrent for import"
        ),
    }
}
