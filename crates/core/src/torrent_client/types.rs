//! Types for torrent client operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during torrent client operations.
#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Canonical form of a content hash: trimmed, upper-case.
pub fn canonical_hash(hash: &str) -> String {
    hash.trim().to_ascii_uppercase()
}

/// Lifecycle state of a torrent, as reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    Error,
    MissingFiles,
    Uploading,
    PausedUpload,
    QueuedUpload,
    StalledUpload,
    CheckingUpload,
    ForcedUpload,
    Allocating,
    Downloading,
    MetadataDownload,
    ForcedMetadataDownload,
    PausedDownload,
    QueuedDownload,
    ForcedDownload,
    StalledDownload,
    CheckingDownload,
    CheckingResumeData,
    Moving,
    Unknown,
}

impl TorrentState {
    /// Returns the string representation for API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentState::Error => "error",
            TorrentState::MissingFiles => "missing_files",
            TorrentState::Uploading => "uploading",
            TorrentState::PausedUpload => "paused_upload",
            TorrentState::QueuedUpload => "queued_upload",
            TorrentState::StalledUpload => "stalled_upload",
            TorrentState::CheckingUpload => "checking_upload",
            TorrentState::ForcedUpload => "forced_upload",
            TorrentState::Allocating => "allocating",
            TorrentState::Downloading => "downloading",
            TorrentState::MetadataDownload => "metadata_download",
            TorrentState::ForcedMetadataDownload => "forced_metadata_download",
            TorrentState::PausedDownload => "paused_download",
            TorrentState::QueuedDownload => "queued_download",
            TorrentState::ForcedDownload => "forced_download",
            TorrentState::StalledDownload => "stalled_download",
            TorrentState::CheckingDownload => "checking_download",
            TorrentState::CheckingResumeData => "checking_resume_data",
            TorrentState::Moving => "moving",
            TorrentState::Unknown => "unknown",
        }
    }

    /// Data is being verified; never interrupted.
    pub fn is_checking(&self) -> bool {
        matches!(
            self,
            TorrentState::CheckingUpload
                | TorrentState::CheckingDownload
                | TorrentState::CheckingResumeData
        )
    }

    /// Torrent is complete and seeding (or waiting to).
    pub fn is_uploading(&self) -> bool {
        matches!(
            self,
            TorrentState::Uploading
                | TorrentState::StalledUpload
                | TorrentState::CheckingUpload
                | TorrentState::QueuedUpload
                | TorrentState::ForcedUpload
        )
    }

    /// Torrent has not completed yet, whether or not it is transferring.
    pub fn is_downloading(&self) -> bool {
        matches!(
            self,
            TorrentState::Downloading
                | TorrentState::MetadataDownload
                | TorrentState::ForcedMetadataDownload
                | TorrentState::StalledDownload
                | TorrentState::CheckingDownload
                | TorrentState::PausedDownload
                | TorrentState::QueuedDownload
                | TorrentState::ForcedDownload
                | TorrentState::Allocating
        )
    }

    /// Downloading and not paused by the user.
    pub fn is_actively_downloading(&self) -> bool {
        self.is_downloading() && *self != TorrentState::PausedDownload
    }
}

/// A single file inside a torrent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentFile {
    /// File index inside the torrent (the id used for priority changes).
    pub index: u32,
    /// Path relative to the torrent root, `/` separated.
    pub name: String,
    /// Download priority (0 = do not download).
    pub priority: u8,
}

impl TorrentFile {
    /// Whether the file was already excluded from download.
    pub fn is_excluded(&self) -> bool {
        self.priority == 0
    }
}

/// Information about a torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Info hash (canonical upper-case hex).
    pub hash: String,
    /// Torrent name.
    pub name: String,
    /// Current state.
    pub state: TorrentState,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    /// ETA in seconds (None if unbounded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<u64>,
    /// Fraction of the torrent's pieces available from connected peers.
    pub availability: f64,
    /// When the torrent was added.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    /// Bytes still to download.
    pub amount_left: u64,
    /// Total size in bytes.
    pub size_bytes: u64,
    /// Absolute path of the torrent's content (file or root folder).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_path: Option<String>,
    /// Category/label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Files, in torrent order. Empty unless loaded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<TorrentFile>,
}

impl TorrentInfo {
    /// Category, or the empty string when unset.
    pub fn category(&self) -> &str {
        self.category.as_deref().unwrap_or("")
    }

    /// Seconds since the torrent was added (0 when unknown).
    pub fn age_secs(&self, now: DateTime<Utc>) -> u64 {
        self.added_at
            .map(|added| (now - added).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }

    /// Everything downloaded and parked, ready to hand off.
    pub fn is_completed(&self) -> bool {
        self.added_at.is_some()
            && self.amount_left == 0
            && self.state == TorrentState::PausedUpload
            && self.content_path.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Filters for listing torrents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TorrentFilters {
    /// Filter by category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Trait for torrent client backends.
///
/// Bulk operations take the full hash set; an empty slice is a no-op.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Client version, used as a liveness check.
    async fn app_version(&self) -> Result<String, TorrentClientError>;

    /// List all torrents, without their file lists.
    async fn list_torrents(
        &self,
        filters: &TorrentFilters,
    ) -> Result<Vec<TorrentInfo>, TorrentClientError>;

    /// Files of a torrent, in torrent order.
    async fn torrent_files(&self, hash: &str) -> Result<Vec<TorrentFile>, TorrentClientError>;

    /// Pause torrents.
    async fn pause(&self, hashes: &[String]) -> Result<(), TorrentClientError>;

    /// Resume paused torrents.
    async fn resume(&self, hashes: &[String]) -> Result<(), TorrentClientError>;

    /// Remove torrents.
    /// If `delete_files` is true, also delete downloaded files.
    async fn delete(&self, hashes: &[String], delete_files: bool)
        -> Result<(), TorrentClientError>;

    /// Recheck/verify torrent files.
    async fn recheck(&self, hashes: &[String]) -> Result<(), TorrentClientError>;

    /// Set the priority of some files of one torrent.
    async fn set_file_priority(
        &self,
        hash: &str,
        file_ids: &[u32],
        priority: u8,
    ) -> Result<(), TorrentClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn info(state: TorrentState) -> TorrentInfo {
        TorrentInfo {
            hash: "ABC123".to_string(),
            name: "Test Torrent".to_string(),
            state,
            progress: 1.0,
            eta_secs: None,
            availability: 1.0,
            added_at: Some(Utc::now()),
            amount_left: 0,
            size_bytes: 1024,
            content_path: Some("/downloads/radarr/Test".to_string()),
            category: Some("radarr".to_string()),
            files: vec![],
        }
    }

    #[test]
    fn test_canonical_hash() {
        assert_eq!(canonical_hash(" abc123def "), "ABC123DEF");
        assert_eq!(canonical_hash("ABC"), "ABC");
    }

    #[test]
    fn test_state_families() {
        assert!(TorrentState::CheckingResumeData.is_checking());
        assert!(!TorrentState::Downloading.is_checking());

        assert!(TorrentState::StalledUpload.is_uploading());
        assert!(!TorrentState::PausedUpload.is_uploading());

        assert!(TorrentState::PausedDownload.is_downloading());
        assert!(!TorrentState::PausedDownload.is_actively_downloading());
        assert!(TorrentState::StalledDownload.is_actively_downloading());
        assert!(!TorrentState::MissingFiles.is_downloading());
    }

    #[test]
    fn test_torrent_state_serialization() {
        assert_eq!(
            serde_json::to_string(&TorrentState::MissingFiles).unwrap(),
            "\"missing_files\""
        );
        assert_eq!(TorrentState::PausedUpload.as_str(), "paused_upload");
    }

    #[test]
    fn test_age_secs() {
        let now = Utc::now();
        let mut t = info(TorrentState::Downloading);
        t.added_at = Some(now - Duration::seconds(700));
        assert_eq!(t.age_secs(now), 700);

        t.added_at = None;
        assert_eq!(t.age_secs(now), 0);

        t.added_at = Some(now + Duration::seconds(30));
        assert_eq!(t.age_secs(now), 0);
    }

    #[test]
    fn test_is_completed() {
        assert!(info(TorrentState::PausedUpload).is_completed());
        assert!(!info(TorrentState::Uploading).is_completed());

        let mut missing_path = info(TorrentState::PausedUpload);
        missing_path.content_path = Some(String::new());
        assert!(!missing_path.is_completed());

        let mut not_done = info(TorrentState::PausedUpload);
        not_done.amount_left = 10;
        assert!(!not_done.is_completed());
    }

    #[test]
    fn test_file_excluded() {
        let file = TorrentFile {
            index: 0,
            name: "a.mkv".to_string(),
            priority: 0,
        };
        assert!(file.is_excluded());
    }
}
