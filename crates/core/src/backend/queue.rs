//! Per-backend snapshot of the download queue.

use std::collections::HashMap;

use crate::config::BackendKind;
use crate::torrent_client::canonical_hash;

use super::{QueueEntry, WorkItemRef};

/// What a backend expects from which download, rebuilt every cycle.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    entry_by_hash: HashMap<String, i64>,
    work_item_by_entry: HashMap<i64, WorkItemRef>,
}

impl QueueSnapshot {
    /// Build a snapshot from raw queue records.
    ///
    /// Records without a download id are not indexed by hash. For episode
    /// backends the episode ids sharing an entry id are accumulated in queue
    /// order; for movie backends the last record wins.
    pub fn from_entries(kind: BackendKind, entries: &[QueueEntry]) -> Self {
        let mut snapshot = Self::default();

        for entry in entries {
            if let Some(download_id) = entry.download_id.as_deref() {
                if !download_id.is_empty() {
                    snapshot
                        .entry_by_hash
                        .insert(canonical_hash(download_id), entry.id);
                }
            }

            match kind {
                BackendKind::Movie => {
                    if let Some(movie_id) = entry.movie_id {
                        snapshot
                            .work_item_by_entry
                            .insert(entry.id, WorkItemRef::Movie(movie_id));
                    }
                }
                BackendKind::Episode => {
                    if let Some(episode_id) = entry.episode_id {
                        match snapshot
                            .work_item_by_entry
                            .entry(entry.id)
                            .or_insert_with(|| WorkItemRef::Episodes(Vec::new()))
                        {
                            WorkItemRef::Episodes(ids) => ids.push(episode_id),
                            WorkItemRef::Movie(_) => {}
                        }
                    }
                }
            }
        }

        snapshot
    }

    /// Queue-entry id for a content hash.
    pub fn entry_for(&self, hash: &str) -> Option<i64> {
        self.entry_by_hash.get(&canonical_hash(hash)).copied()
    }

    /// Work item behind a queue entry.
    pub fn work_item(&self, entry_id: i64) -> Option<&WorkItemRef> {
        self.work_item_by_entry.get(&entry_id)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.entry_for(hash).is_some()
    }

    /// Number of hashes tracked.
    pub fn len(&self) -> usize {
        self.entry_by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_by_hash.is_empty()
    }
}
