//! Per-file content filter.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex_lite::{Regex, RegexBuilder};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::config::FilterConfig;

use super::{MediaProber, ProbeError};

/// File names that are never inspected.
const SYSTEM_ARTIFACTS: [&str; 2] = ["desktop.ini", ".DS_Store"];

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Why a file was excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    Extension,
    Folder,
    Name,
    Unprobeable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileVerdict {
    Allowed,
    Excluded(ExclusionReason),
}

impl FileVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, FileVerdict::Allowed)
    }
}

/// Where the file being judged lives.
#[derive(Debug, Clone, Copy)]
pub enum FilterContext<'a> {
    /// A path relative to the torrent root, possibly not on disk yet.
    InProgress,
    /// A completed file on disk under `root`; ancestors above `root` are not
    /// matched against folder patterns.
    OnDisk { root: &'a Path },
}

/// Decides whether a file may remain in a download.
pub struct ContentFilter {
    extensions: HashSet<String>,
    folder_pattern: Option<Regex>,
    name_pattern: Option<Regex>,
    prober: Option<Arc<dyn MediaProber>>,
    probed_ok: RwLock<HashSet<PathBuf>>,
}

impl ContentFilter {
    pub fn new(
        config: &FilterConfig,
        prober: Option<Arc<dyn MediaProber>>,
    ) -> Result<Self, FilterError> {
        let extensions = config
            .extension_allowlist
            .iter()
            .map(|ext| normalize_extension(ext))
            .filter(|ext| !ext.is_empty())
            .collect();

        Ok(Self {
            extensions,
            folder_pattern: compile_alternation(
                &config.folder_exclusion_patterns,
                true,
                config.case_sensitive_matches,
            )?,
            name_pattern: compile_alternation(
                &config.file_name_exclusion_patterns,
                false,
                config.case_sensitive_matches,
            )?,
            prober,
            probed_ok: RwLock::new(HashSet::new()),
        })
    }

    pub fn has_prober(&self) -> bool {
        self.prober.is_some()
    }

    /// Name based rules only: extension, ancestor folders, file name.
    ///
    /// `path` is relative to the torrent root.
    pub fn check_name(&self, path: &Path) -> FileVerdict {
        let Some(file_name) = path.file_name().and_then(OsStr::to_str) else {
            return FileVerdict::Excluded(ExclusionReason::Name);
        };
        if SYSTEM_ARTIFACTS.contains(&file_name) {
            return FileVerdict::Allowed;
        }

        if !self.extension_allowed(path) {
            return FileVerdict::Excluded(ExclusionReason::Extension);
        }

        if let Some(folder_pattern) = &self.folder_pattern {
            let excluded_folder = path
                .parent()
                .into_iter()
                .flat_map(Path::components)
                .filter_map(|c| c.as_os_str().to_str())
                .any(|name| folder_pattern.is_match(name));
            if excluded_folder {
                return FileVerdict::Excluded(ExclusionReason::Folder);
            }
        }

        if let Some(name_pattern) = &self.name_pattern {
            if name_pattern.is_match(file_name) {
                return FileVerdict::Excluded(ExclusionReason::Name);
            }
        }

        FileVerdict::Allowed
    }

    /// Full verdict for a file. In-progress files are never probed.
    pub async fn is_allowed(&self, path: &Path, context: FilterContext<'_>) -> FileVerdict {
        match context {
            FilterContext::InProgress => self.check_name(path),
            FilterContext::OnDisk { root } => {
                let is_artifact = path
                    .file_name()
                    .and_then(OsStr::to_str)
                    .is_some_and(|name| SYSTEM_ARTIFACTS.contains(&name));
                if is_artifact || path.is_dir() {
                    return FileVerdict::Allowed;
                }

                let relative = path.strip_prefix(root).unwrap_or(path);
                let verdict = self.check_name(relative);
                if !verdict.is_allowed() {
                    return verdict;
                }

                if self.probe(path).await {
                    FileVerdict::Allowed
                } else {
                    FileVerdict::Excluded(ExclusionReason::Unprobeable)
                }
            }
        }
    }

    fn extension_allowed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()))
    }

    /// Successful probes are remembered for the process lifetime.
    async fn probe(&self, path: &Path) -> bool {
        let Some(prober) = &self.prober else {
            return true;
        };

        if self.probed_ok.read().await.contains(path) {
            trace!(path = %path.display(), "File already probed");
            return true;
        }

        match prober.probe(path).await {
            Ok(()) => {
                self.probed_ok.write().await.insert(path.to_path_buf());
                true
            }
            Err(ProbeError::Unavailable { path: binary }) => {
                warn!(binary = %binary.display(), "Prober unavailable, accepting file");
                true
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "File is not probeable");
                false
            }
        }
    }
}

/// Lower-case extension without the leading dot.
fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// One alternation over every pattern. An empty list matches nothing.
fn compile_alternation(
    patterns: &[String],
    anchored: bool,
    case_sensitive: bool,
) -> Result<Option<Regex>, FilterError> {
    let patterns: Vec<&String> = patterns.iter().filter(|p| !p.is_empty()).collect();
    if patterns.is_empty() {
        return Ok(None);
    }

    for pattern in &patterns {
        Regex::new(pattern).map_err(|e| FilterError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
    }

    let body = patterns
        .iter()
        .map(|p| format!("(?:{})", p))
        .collect::<Vec<_>>()
        .join("|");
    let source = if anchored {
        format!("^(?:{})", body)
    } else {
        body
    };

    RegexBuilder::new(&source)
        .case_insensitive(!case_sensitive)
        .build()
        .map(Some)
        .map_err(|e| FilterError::InvalidPattern {
            pattern: source,
            reason: e.to_string(),
        })
}
