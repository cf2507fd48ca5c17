//! Mock request manager for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backend::{BackendError, MaintenanceCommand, QueueEntry, RequestManager, WorkItemRef};
use crate::config::ImportMode;

/// A recorded backend call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    GetQueue {
        page_size: u32,
    },
    RemoveQueueEntry {
        id: i64,
        remove_from_client: bool,
        blocklist: bool,
    },
    ImportScan {
        path: PathBuf,
        hash: String,
        mode: ImportMode,
    },
    Research(WorkItemRef),
    Maintenance(MaintenanceCommand),
}

/// Mock implementation of the RequestManager trait.
///
/// Serves a configurable queue and records every mutating call.
#[derive(Debug)]
pub struct MockRequestManager {
    queue: Arc<RwLock<Vec<QueueEntry>>>,
    labels: Arc<RwLock<HashMap<WorkItemRef, String>>>,
    calls: Arc<RwLock<Vec<BackendCall>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<BackendError>>>,
}

impl Default for MockRequestManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRequestManager {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(RwLock::new(Vec::new())),
            labels: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Replace the queue served by `get_queue`.
    pub async fn set_queue(&self, entries: Vec<QueueEntry>) {
        *self.queue.write().await = entries;
    }

    /// Label returned by `describe_work_item` for `item`.
    pub async fn set_label(&self, item: WorkItemRef, label: impl Into<String>) {
        self.labels.write().await.insert(item, label.into());
    }

    pub async fn calls(&self) -> Vec<BackendCall> {
        self.calls.read().await.clone()
    }

    pub async fn clear_recorded(&self) {
        self.calls.write().await.clear();
    }

    /// Recorded import scans as (path, hash).
    pub async fn import_scans(&self) -> Vec<(PathBuf, String)> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                BackendCall::ImportScan { path, hash, .. } => Some((path.clone(), hash.clone())),
                _ => None,
            })
            .collect()
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: BackendError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Option<BackendError> {
        self.next_error.write().await.take()
    }

    async fn record(&self, call: BackendCall) -> Result<(), BackendError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.calls.write().await.push(call);
        Ok(())
    }
}

#[async_trait]
impl RequestManager for MockRequestManager {
    async fn get_queue(&self, page_size: u32) -> Result<Vec<QueueEntry>, BackendError> {
        self.record(BackendCall::GetQueue { page_size }).await?;
        Ok(self.queue.read().await.clone())
    }

    async fn remove_queue_entry(
        &self,
        id: i64,
        remove_from_client: bool,
        blocklist: bool,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::RemoveQueueEntry {
            id,
            remove_from_client,
            blocklist,
        })
        .await?;
        self.queue.write().await.retain(|e| e.id != id);
        Ok(())
    }

    async fn post_import_scan(
        &self,
        path: &Path,
        hash: &str,
        mode: ImportMode,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::ImportScan {
            path: path.to_path_buf(),
            hash: hash.to_string(),
            mode,
        })
        .await
    }

    async fn post_research(&self, work_item: &WorkItemRef) -> Result<(), BackendError> {
        self.record(BackendCall::Research(work_item.clone())).await
    }

    async fn post_maintenance(&self, command: MaintenanceCommand) -> Result<(), BackendError> {
        self.record(BackendCall::Maintenance(command)).await
    }

    async fn describe_work_item(&self, work_item: &WorkItemRef) -> Result<String, BackendError> {
        self.labels
            .read()
            .await
            .get(work_item)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(work_item.to_string()))
    }
}
