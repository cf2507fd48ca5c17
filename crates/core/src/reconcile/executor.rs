//! Applies an [`ActionSet`] to the torrent client and notifies backends.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::backend::Backend;
use crate::metrics;
use crate::torrent_client::{TorrentClient, TorrentClientError};

use super::ActionSet;

/// Bounded retry for content paths that are still being moved into place.
#[derive(Debug, Clone, Copy)]
pub struct PathRetry {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PathRetry {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(100),
        }
    }
}

/// Directory to hand to a backend for `content_path`: the path itself for a
/// folder, its parent for a single file. None if it never appears.
pub async fn resolve_content_path(content_path: &Path, retry: PathRetry) -> Option<PathBuf> {
    for attempt in 0..=retry.attempts {
        if let Ok(metadata) = tokio::fs::metadata(content_path).await {
            if metadata.is_file() {
                return content_path.parent().map(Path::to_path_buf);
            }
            return Some(content_path.to_path_buf());
        }
        if attempt < retry.attempts {
            trace!(
                path = %content_path.display(),
                attempt = attempt + 1,
                max = retry.attempts,
                "Content path does not exist yet"
            );
            tokio::time::sleep(retry.interval).await;
        }
    }
    None
}

/// Counts of what one execution did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub paused: usize,
    pub imported: usize,
    pub deleted: usize,
    pub deleted_exempt: usize,
    pub queue_entries_removed: usize,
    pub researched: usize,
    pub rechecked: usize,
    pub files_excluded: usize,
    pub resumed: usize,
    /// Bulk client operations that failed this run.
    pub failed_operations: Vec<&'static str>,
}

impl ExecutionReport {
    fn client_failure(&mut self, operation: &'static str, count: usize, e: TorrentClientError) {
        metrics::CLIENT_REQUEST_FAILURES
            .with_label_values(&[operation])
            .inc();
        error!(operation, count, error = %e, "Torrent client bulk operation failed");
        self.failed_operations.push(operation);
    }
}

pub struct ActionExecutor {
    client: Arc<dyn TorrentClient>,
    path_retry: PathRetry,
}

fn hash_list(set: &BTreeSet<String>) -> Vec<String> {
    set.iter().cloned().collect()
}

impl ActionExecutor {
    pub fn new(client: Arc<dyn TorrentClient>, path_retry: PathRetry) -> Self {
        Self { client, path_retry }
    }

    /// Apply every bulk action, in order: pause, import, backend removal and
    /// re-search, client delete, recheck, file exclusion, resume.
    ///
    /// Every step is best effort: a failed client or backend call is logged,
    /// counted and recorded in the report, and the remaining steps still run.
    pub async fn execute(&self, set: &mut ActionSet, backends: &mut [Backend]) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        if !set.to_pause.is_empty() {
            match self.client.pause(&hash_list(&set.to_pause)).await {
                Ok(()) => {
                    report.paused = set.to_pause.len();
                    metrics::ACTIONS_TOTAL
                        .with_label_values(&["pause"])
                        .inc_by(report.paused as u64);
                    info!(count = report.paused, "Paused uploading torrents");
                }
                Err(e) => report.client_failure("pause", set.to_pause.len(), e),
            }
        }

        report.imported = self.hand_off_imports(set, backends).await;

        let doomed = set.doomed();
        if !doomed.is_empty() {
            let (removed, researched) = self.notify_backends(&doomed, set, backends).await;
            report.queue_entries_removed = removed;
            report.researched = researched;

            match self.client.delete(&hash_list(&doomed), true).await {
                Ok(()) => {
                    report.deleted = set.to_delete.len();
                    report.deleted_exempt = set.to_delete_exempt.len();
                    metrics::ACTIONS_TOTAL
                        .with_label_values(&["delete"])
                        .inc_by(report.deleted as u64);
                    metrics::ACTIONS_TOTAL
                        .with_label_values(&["delete_exempt"])
                        .inc_by(report.deleted_exempt as u64);
                    info!(
                        count = doomed.len(),
                        exempt = report.deleted_exempt,
                        "Deleted torrents and their files"
                    );
                }
                Err(e) => report.client_failure("delete", doomed.len(), e),
            }
        }

        if !set.to_recheck.is_empty() {
            match self.client.recheck(&hash_list(&set.to_recheck)).await {
                Ok(()) => {
                    report.rechecked = set.to_recheck.len();
                    metrics::ACTIONS_TOTAL
                        .with_label_values(&["recheck"])
                        .inc_by(report.rechecked as u64);
                    info!(count = report.rechecked, "Rechecked errored torrents");
                }
                Err(e) => report.client_failure("recheck", set.to_recheck.len(), e),
            }
        }

        for (hash, file_ids) in &set.file_exclusions {
            match self.client.set_file_priority(hash, file_ids, 0).await {
                Ok(()) => {
                    report.files_excluded += file_ids.len();
                    metrics::ACTIONS_TOTAL
                        .with_label_values(&["exclude_files"])
                        .inc();
                    debug!(hash = %hash, files = file_ids.len(), "Excluded files from download");
                }
                Err(e) => {
                    metrics::CLIENT_REQUEST_FAILURES
                        .with_label_values(&["set_file_priority"])
                        .inc();
                    warn!(hash = %hash, error = %e, "Failed to exclude files");
                }
            }
        }

        if !set.to_resume.is_empty() {
            match self.client.resume(&hash_list(&set.to_resume)).await {
                Ok(()) => {
                    report.resumed = set.to_resume.len();
                    metrics::ACTIONS_TOTAL
                        .with_label_values(&["resume"])
                        .inc_by(report.resumed as u64);
                    info!(count = report.resumed, "Resumed paused downloads");
                }
                Err(e) => report.client_failure("resume", set.to_resume.len(), e),
            }
        }

        report
    }

    /// Post import scans. Downloads whose path never materialises are moved
    /// to the blocklist-exempt delete bucket.
    async fn hand_off_imports(&self, set: &mut ActionSet, backends: &mut [Backend]) -> usize {
        let imports = std::mem::take(&mut set.imports);
        let mut imported = 0;

        for (category, requests) in imports {
            let Some(backend) = backends.iter_mut().find(|b| b.category() == category) else {
                warn!(category = %category, "No backend owns category, skipping imports");
                continue;
            };

            for request in requests {
                if backend.is_sent_to_scan(&request.hash) {
                    continue;
                }

                let Some(path) = resolve_content_path(&request.content_path, self.path_retry).await
                else {
                    info!(
                        hash = %request.hash,
                        category = %category,
                        name = %request.name,
                        "Deleting torrent whose content path never appeared"
                    );
                    set.to_delete_exempt.insert(request.hash);
                    continue;
                };

                let result = backend
                    .manager()
                    .post_import_scan(&path, &request.hash, backend.import_mode())
                    .await;
                match result {
                    Ok(()) => {
                        info!(
                            backend = %backend.name(),
                            hash = %request.hash,
                            path = %path.display(),
                            "Posted import scan"
                        );
                        backend.mark_sent_to_scan(&request.hash);
                        metrics::IMPORTS_TOTAL
                            .with_label_values(&[backend.name()])
                            .inc();
                        imported += 1;
                    }
                    Err(e) => {
                        metrics::BACKEND_REQUEST_FAILURES
                            .with_label_values(&[backend.name(), "import_scan"])
                            .inc();
                        error!(
                            backend = %backend.name(),
                            hash = %request.hash,
                            error = %e,
                            "Failed to post import scan"
                        );
                    }
                }
            }
        }

        imported
    }

    /// Remove doomed downloads from every backend queue that tracks them and
    /// ask for a replacement. Returns (entries removed, re-searches posted).
    async fn notify_backends(
        &self,
        doomed: &BTreeSet<String>,
        set: &ActionSet,
        backends: &[Backend],
    ) -> (usize, usize) {
        let mut removed = 0;
        let mut researched = 0;

        for backend in backends {
            let manager = backend.manager();
            for hash in doomed {
                let Some(entry_id) = backend.snapshot().entry_for(hash) else {
                    continue;
                };
                let blocklist = !set.to_delete_exempt.contains(hash);

                match manager.remove_queue_entry(entry_id, true, blocklist).await {
                    Ok(()) => {
                        removed += 1;
                        debug!(
                            backend = %backend.name(),
                            hash = %hash,
                            entry_id,
                            blocklist,
                            "Removed queue entry"
                        );
                    }
                    Err(e) => {
                        metrics::BACKEND_REQUEST_FAILURES
                            .with_label_values(&[backend.name(), "remove_queue_entry"])
                            .inc();
                        warn!(
                            backend = %backend.name(),
                            hash = %hash,
                            error = %e,
                            "Failed to remove queue entry"
                        );
                    }
                }

                if !backend.research_enabled() {
                    continue;
                }
                let Some(work_item) = backend.snapshot().work_item(entry_id) else {
                    continue;
                };

                let label = match manager.describe_work_item(work_item).await {
                    Ok(label) if !label.is_empty() => label,
                    _ => work_item.to_string(),
                };
                info!(
                    backend = %backend.name(),
                    kind = backend.kind().as_str(),
                    re_search = true,
                    "Re-searching {}",
                    label
                );

                match manager.post_research(work_item).await {
                    Ok(()) => {
                        researched += 1;
                        metrics::RESEARCHES_TOTAL
                            .with_label_values(&[backend.name()])
                            .inc();
                    }
                    Err(e) => {
                        metrics::BACKEND_REQUEST_FAILURES
                            .with_label_values(&[backend.name(), "research"])
                            .inc();
                        error!(
                            backend = %backend.name(),
                            error = %e,
                            "Failed to request re-search"
                        );
                    }
                }
            }
        }

        (removed, researched)
    }
}
