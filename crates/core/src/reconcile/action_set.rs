//! Per-cycle partition of decisions into bulk operations.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::classifier::Action;
use crate::torrent_client::TorrentInfo;

/// A completed download waiting to be handed to its backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub hash: String,
    pub name: String,
    pub content_path: PathBuf,
}

/// Bulk operations for one cycle, keyed by canonical hash.
///
/// Every hash lands in at most one of the delete/pause/recheck/import
/// buckets. A download may be both resumed and have files excluded.
#[derive(Debug, Clone, Default)]
pub struct ActionSet {
    pub to_delete: BTreeSet<String>,
    /// Removed without blocklisting the release upstream.
    pub to_delete_exempt: BTreeSet<String>,
    pub to_pause: BTreeSet<String>,
    pub to_recheck: BTreeSet<String>,
    pub to_resume: BTreeSet<String>,
    pub file_exclusions: BTreeMap<String, Vec<u32>>,
    /// Category -> downloads to import.
    pub imports: BTreeMap<String, Vec<ImportRequest>>,
}

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, torrent: &TorrentInfo, action: Action) {
        let hash = torrent.hash.clone();
        match action {
            Action::None => {}
            Action::Pause => {
                self.to_pause.insert(hash);
            }
            Action::Delete(reason) if reason.is_exempt() => {
                self.to_delete_exempt.insert(hash);
            }
            Action::Delete(_) => {
                self.to_delete.insert(hash);
            }
            Action::Recheck => {
                self.to_recheck.insert(hash);
            }
            Action::FilterFiles { exclude, resume } => {
                if resume {
                    self.to_resume.insert(hash.clone());
                }
                if !exclude.is_empty() {
                    self.file_exclusions.insert(hash, exclude);
                }
            }
            Action::Import { category } => {
                if let Some(path) = torrent.content_path.as_deref() {
                    self.imports.entry(category).or_default().push(ImportRequest {
                        hash,
                        name: torrent.name.clone(),
                        content_path: PathBuf::from(path),
                    });
                }
            }
        }
    }

    /// Every hash to remove from the client, exempt or not.
    pub fn doomed(&self) -> BTreeSet<String> {
        self.to_delete
            .union(&self.to_delete_exempt)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty()
            && self.to_delete_exempt.is_empty()
            && self.to_pause.is_empty()
            && self.to_recheck.is_empty()
            && self.to_resume.is_empty()
            && self.file_exclusions.is_empty()
            && self.imports.is_empty()
    }
}
