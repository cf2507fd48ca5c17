//! Types for request manager operations.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ImportMode;

/// Errors that can occur while talking to a request manager.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// The thing a backend will search for again when a download fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "ids", rename_all = "snake_case")]
pub enum WorkItemRef {
    Movie(i64),
    /// Episodes in queue order; one download may satisfy several.
    Episodes(Vec<i64>),
}

impl fmt::Display for WorkItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItemRef::Movie(id) => write!(f, "movie {}", id),
            WorkItemRef::Episodes(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, "episodes {}", ids.join(" "))
            }
        }
    }
}

/// One record of a backend's download queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Queue-entry id, used to remove the entry.
    pub id: i64,
    /// Content hash, canonical upper-case. None for non-torrent downloads.
    pub download_id: Option<String>,
    /// Movie id, for movie backends.
    pub movie_id: Option<i64>,
    /// Episode id, for episode backends.
    pub episode_id: Option<i64>,
}

/// Periodic housekeeping commands understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaintenanceCommand {
    RssSync,
    RefreshMonitoredDownloads,
}

impl MaintenanceCommand {
    /// Command name on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceCommand::RssSync => "RssSync",
            MaintenanceCommand::RefreshMonitoredDownloads => "RefreshMonitoredDownloads",
        }
    }
}

/// A Radarr/Sonarr style request manager.
#[async_trait]
pub trait RequestManager: Send + Sync {
    /// Full download queue, one page of `page_size` records.
    async fn get_queue(&self, page_size: u32) -> Result<Vec<QueueEntry>, BackendError>;

    /// Drop a queue entry, optionally removing it from the client and
    /// blocklisting the release.
    async fn remove_queue_entry(
        &self,
        id: i64,
        remove_from_client: bool,
        blocklist: bool,
    ) -> Result<(), BackendError>;

    /// Ask the backend to import a completed download from `path`.
    async fn post_import_scan(
        &self,
        path: &Path,
        hash: &str,
        mode: ImportMode,
    ) -> Result<(), BackendError>;

    /// Search for a replacement release.
    async fn post_research(&self, work_item: &WorkItemRef) -> Result<(), BackendError>;

    async fn post_maintenance(&self, command: MaintenanceCommand) -> Result<(), BackendError>;

    /// Human readable label for a work item, for logs.
    async fn describe_work_item(&self, work_item: &WorkItemRef) -> Result<String, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_item_display() {
        assert_eq!(WorkItemRef::Movie(42).to_string(), "movie 42");
        assert_eq!(
            WorkItemRef::Episodes(vec![1, 2, 3]).to_string(),
            "episodes 1 2 3"
        );
    }

    #[test]
    fn test_work_item_serialization() {
        let json = serde_json::to_string(&WorkItemRef::Episodes(vec![7, 8])).unwrap();
        assert_eq!(json, r#"{"type":"episodes","ids":[7,8]}"#);
    }

    #[test]
    fn test_maintenance_command_names() {
        assert_eq!(MaintenanceCommand::RssSync.as_str(), "RssSync");
        assert_eq!(
            MaintenanceCommand::RefreshMonitoredDownloads.as_str(),
            "RefreshMonitoredDownloads"
        );
    }
}
