//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every external service trait,
//! so whole reconciliation cycles can be driven without a torrent client or
//! request managers.
//!
//! # Example
//!
//! ```rust,ignore
//! use queuewarden_core::testing::{fixtures, MockRequestManager, MockTorrentClient};
//!
//! let client = MockTorrentClient::new();
//! let radarr = MockRequestManager::new();
//!
//! client.add_mock_torrent(fixtures::torrent("ABC", "radarr", TorrentState::MissingFiles)).await;
//! radarr.set_queue(vec![fixtures::movie_entry(1, "ABC", 42)]).await;
//! ```

mod mock_prober;
mod mock_request_manager;
mod mock_torrent_client;

pub use mock_prober::MockProber;
pub use mock_request_manager::{BackendCall, MockRequestManager};
pub use mock_torrent_client::{ClientCall, MockTorrentClient};

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::scheduler::ConnectivityCheck;

/// Connectivity answer controlled by the test.
#[derive(Debug)]
pub struct StaticConnectivity {
    online: AtomicBool,
}

impl StaticConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityCheck for StaticConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{Duration, Utc};

    use crate::backend::QueueEntry;
    use crate::config::{BackendConfig, BackendKind, ImportMode};
    use crate::torrent_client::{TorrentFile, TorrentInfo, TorrentState};

    /// A torrent added an hour ago, half downloaded, with healthy swarm stats.
    pub fn torrent(hash: &str, category: &str, state: TorrentState) -> TorrentInfo {
        TorrentInfo {
            hash: hash.to_string(),
            name: format!("Torrent {}", hash),
            state,
            progress: 0.5,
            eta_secs: Some(600),
            availability: 1.0,
            added_at: Some(Utc::now() - Duration::hours(1)),
            amount_left: 512 * 1024 * 1024,
            size_bytes: 1024 * 1024 * 1024,
            content_path: Some(format!("/downloads/{}/Torrent {}", category, hash)),
            category: Some(category.to_string()),
            files: vec![],
        }
    }

    /// A finished torrent parked in PausedUpload at `content_path`.
    pub fn completed_torrent(hash: &str, category: &str, content_path: &str) -> TorrentInfo {
        TorrentInfo {
            progress: 1.0,
            eta_secs: Some(0),
            amount_left: 0,
            content_path: Some(content_path.to_string()),
            ..torrent(hash, category, TorrentState::PausedUpload)
        }
    }

    /// A wanted file (priority 1).
    pub fn file(index: u32, name: &str) -> TorrentFile {
        TorrentFile {
            index,
            name: name.to_string(),
            priority: 1,
        }
    }

    pub fn backend_config(name: &str, kind: BackendKind, category: &str) -> BackendConfig {
        BackendConfig {
            name: name.to_string(),
            kind,
            url: format!("http://{}.local", name.to_lowercase()),
            api_key: "test-key".to_string(),
            category: category.to_string(),
            managed: true,
            research: true,
            import_mode: ImportMode::Move,
            refresh_downloads_minutes: 1,
            rss_sync_minutes: 15,
            timeout_secs: 30,
        }
    }

    pub fn movie_entry(id: i64, hash: &str, movie_id: i64) -> QueueEntry {
        QueueEntry {
            id,
            download_id: Some(hash.to_string()),
            movie_id: Some(movie_id),
            episode_id: None,
        }
    }

    pub fn episode_entry(id: i64, hash: &str, episode_id: i64) -> QueueEntry {
        QueueEntry {
            id,
            download_id: Some(hash.to_string()),
            movie_id: None,
            episode_id: Some(episode_id),
        }
    }
}
