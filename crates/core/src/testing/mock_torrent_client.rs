//! Mock torrent client for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::torrent_client::{
    canonical_hash, TorrentClient, TorrentClientError, TorrentFile, TorrentFilters, TorrentInfo,
    TorrentState,
};

/// A recorded client call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    Pause(Vec<String>),
    Resume(Vec<String>),
    Delete {
        hashes: Vec<String>,
        delete_files: bool,
    },
    Recheck(Vec<String>),
    SetFilePriority {
        hash: String,
        file_ids: Vec<u32>,
        priority: u8,
    },
}

/// Mock implementation of the TorrentClient trait.
///
/// Provides controllable behavior for testing:
/// - Pre-populate torrents and their file lists
/// - Record every bulk call for assertions
/// - Simulate failures and an unreachable client
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTorrentClient::new();
/// client.add_mock_torrent(fixtures::torrent("ABC", "radarr", TorrentState::Uploading)).await;
///
/// // ... run a cycle ...
///
/// assert_eq!(client.calls().await, vec![ClientCall::Pause(vec!["ABC".into()])]);
/// ```
#[derive(Debug)]
pub struct MockTorrentClient {
    /// Torrents in listing order.
    torrents: Arc<RwLock<Vec<TorrentInfo>>>,
    /// File lists by hash, returned by `torrent_files`.
    files: Arc<RwLock<HashMap<String, Vec<TorrentFile>>>>,
    /// Recorded calls.
    calls: Arc<RwLock<Vec<ClientCall>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<TorrentClientError>>>,
    /// Bulk operations that fail on every call.
    failing: Arc<RwLock<HashSet<&'static str>>>,
    /// Whether `app_version` succeeds.
    reachable: AtomicBool,
}

impl Default for MockTorrentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTorrentClient {
    /// Create a new mock torrent client.
    pub fn new() -> Self {
        Self {
            torrents: Arc::new(RwLock::new(Vec::new())),
            files: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            failing: Arc::new(RwLock::new(HashSet::new())),
            reachable: AtomicBool::new(true),
        }
    }

    /// Pre-populate a torrent. Its `files` become the `torrent_files` answer
    /// and are stripped from the listing, as the real client does.
    pub async fn add_mock_torrent(&self, mut info: TorrentInfo) {
        let files = std::mem::take(&mut info.files);
        self.files.write().await.insert(info.hash.clone(), files);
        self.torrents.write().await.push(info);
    }

    /// Get all recorded calls.
    pub async fn calls(&self) -> Vec<ClientCall> {
        self.calls.read().await.clone()
    }

    /// Clear recorded calls.
    pub async fn clear_recorded(&self) {
        self.calls.write().await.clear();
    }

    /// Hashes passed to delete calls, flattened.
    pub async fn deleted_hashes(&self) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                ClientCall::Delete { hashes, .. } => Some(hashes.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Set the state for a torrent directly.
    pub async fn set_state(&self, hash: &str, state: TorrentState) {
        let mut torrents = self.torrents.write().await;
        if let Some(torrent) = torrents.iter_mut().find(|t| t.hash == hash) {
            torrent.state = state;
        }
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: TorrentClientError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every call of a bulk operation (`"pause"`, `"delete"`, ...) fail.
    pub async fn fail_operation(&self, operation: &'static str) {
        self.failing.write().await.insert(operation);
    }

    /// Control the liveness answer of `app_version`.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Check if a torrent exists.
    pub async fn has_torrent(&self, hash: &str) -> bool {
        self.torrents.read().await.iter().any(|t| t.hash == hash)
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<TorrentClientError> {
        self.next_error.write().await.take()
    }

    async fn record(
        &self,
        operation: &'static str,
        call: ClientCall,
    ) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        if self.failing.read().await.contains(operation) {
            return Err(TorrentClientError::Timeout);
        }
        self.calls.write().await.push(call);
        Ok(())
    }

    async fn update_states(&self, hashes: &[String], update: impl Fn(&mut TorrentInfo)) {
        let mut torrents = self.torrents.write().await;
        for torrent in torrents.iter_mut() {
            if hashes.iter().any(|h| canonical_hash(h) == torrent.hash) {
                update(torrent);
            }
        }
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn app_version(&self) -> Result<String, TorrentClientError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok("v4.6.0".to_string())
        } else {
            Err(TorrentClientError::ConnectionFailed(
                "mock client unreachable".to_string(),
            ))
        }
    }

    async fn list_torrents(
        &self,
        filters: &TorrentFilters,
    ) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let torrents = self.torrents.read().await;
        Ok(torrents
            .iter()
            .filter(|t| {
                filters
                    .category
                    .as_ref()
                    .map_or(true, |c| t.category.as_ref() == Some(c))
            })
            .cloned()
            .collect())
    }

    async fn torrent_files(&self, hash: &str) -> Result<Vec<TorrentFile>, TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.files
            .read()
            .await
            .get(&canonical_hash(hash))
            .cloned()
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }

    async fn pause(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        self.record("pause", ClientCall::Pause(hashes.to_vec())).await?;
        self.update_states(hashes, |t| {
            t.state = if t.state.is_uploading() {
                TorrentState::PausedUpload
            } else {
                TorrentState::PausedDownload
            };
        })
        .await;
        Ok(())
    }

    async fn resume(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        self.record("resume", ClientCall::Resume(hashes.to_vec())).await?;
        self.update_states(hashes, |t| t.state = TorrentState::Downloading)
            .await;
        Ok(())
    }

    async fn delete(
        &self,
        hashes: &[String],
        delete_files: bool,
    ) -> Result<(), TorrentClientError> {
        self.record(
            "delete",
            ClientCall::Delete {
                hashes: hashes.to_vec(),
                delete_files,
            },
        )
        .await?;
        let doomed: Vec<String> = hashes.iter().map(|h| canonical_hash(h)).collect();
        self.torrents
            .write()
            .await
            .retain(|t| !doomed.contains(&t.hash));
        Ok(())
    }

    async fn recheck(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        self.record("recheck", ClientCall::Recheck(hashes.to_vec())).await?;
        self.update_states(hashes, |t| t.state = TorrentState::CheckingDownload)
            .await;
        Ok(())
    }

    async fn set_file_priority(
        &self,
        hash: &str,
        file_ids: &[u32],
        priority: u8,
    ) -> Result<(), TorrentClientError> {
        self.record(
            "set_file_priority",
            ClientCall::SetFilePriority {
                hash: hash.to_string(),
                file_ids: file_ids.to_vec(),
                priority,
            },
        )
        .await?;
        if let Some(files) = self.files.write().await.get_mut(&canonical_hash(hash)) {
            for file in files.iter_mut().filter(|f| file_ids.contains(&f.index)) {
                file.priority = priority;
            }
        }
        Ok(())
    }
}
