//! Completed folder cleanup.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::filter::{ContentFilter, FilterContext};
use crate::metrics;

/// Partial-download files are left for the client to finish.
const PARTIAL_EXTENSION: &str = "parts";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub files_removed: usize,
    pub folders_removed: usize,
    /// The folder held nothing once the sweep finished.
    pub folder_empty: bool,
}

/// Delete files under `folder` that fail the filter, then prune empty
/// directories bottom-up. `folder` itself is kept.
pub async fn sweep_completed_folder(folder: &Path, filter: &ContentFilter) -> SweepReport {
    let mut report = SweepReport::default();
    debug!(folder = %folder.display(), "Sweeping completed folder");

    let mut files = Vec::new();
    let mut directories = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.file_type().is_dir() {
            directories.push(entry);
        } else {
            files.push(entry);
        }
    }

    let context = FilterContext::OnDisk { root: folder };
    for entry in files {
        let path = entry.path();
        if filter.is_allowed(path, context).await.is_allowed() {
            trace!(path = %path.display(), "Keeping allowed file");
            continue;
        }
        if path.extension().is_some_and(|ext| ext == PARTIAL_EXTENSION) {
            continue;
        }

        match fs::remove_file(path) {
            Ok(()) => {
                report.files_removed += 1;
                metrics::FILES_SWEPT.inc();
                debug!(path = %path.display(), "Removed disallowed file");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                debug!(path = %path.display(), "File in use, could not remove");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove file");
            }
        }
    }

    directories.sort_by_key(walkdir::DirEntry::depth);
    directories.reverse();

    for entry in directories {
        let path = entry.path();
        if !is_empty_dir(path) {
            continue;
        }
        match fs::remove_dir(path) {
            Ok(()) => {
                report.folders_removed += 1;
                metrics::FOLDERS_PRUNED.inc();
                trace!(path = %path.display(), "Removed empty folder");
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Failed to remove empty folder");
            }
        }
    }

    report.folder_empty = is_empty_dir(folder);
    report
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::testing::MockProber;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn filter_with(prober: Option<Arc<MockProber>>) -> ContentFilter {
        let config = FilterConfig {
            extension_allowlist: vec![".mkv".into(), ".srt".into(), ".parts".into()],
            folder_exclusion_patterns: vec![],
            file_name_exclusion_patterns: vec![r"\bsample\b".into()],
            case_sensitive_matches: false,
        };
        ContentFilter::new(
            &config,
            prober.map(|p| p as Arc<dyn crate::filter::MediaProber>),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_sweep_removes_disallowed_files() {
        let dir = TempDir::new().unwrap();
        let movie = dir.path().join("Movie");
        fs::create_dir(&movie).unwrap();
        fs::write(movie.join("movie.mkv"), b"x").unwrap();
        fs::write(movie.join("movie.nfo"), b"x").unwrap();
        fs::write(movie.join("movie sample.mkv"), b"x").unwrap();
        fs::write(movie.join("desktop.ini"), b"x").unwrap();

        let report = sweep_completed_folder(dir.path(), &filter_with(None)).await;

        assert_eq!(report.files_removed, 2);
        assert!(movie.join("movie.mkv").exists());
        assert!(movie.join("desktop.ini").exists());
        assert!(!movie.join("movie.nfo").exists());
        assert!(!report.folder_empty);
    }

    #[tokio::test]
    async fn test_sweep_keeps_partial_files() {
        let dir = TempDir::new().unwrap();
        let prober = Arc::new(MockProber::new());
        prober.reject("movie.mkv.parts").await;
        fs::write(dir.path().join("movie.mkv.parts"), b"x").unwrap();

        let report = sweep_completed_folder(dir.path(), &filter_with(Some(prober))).await;

        assert_eq!(report.files_removed, 0);
        assert!(dir.path().join("movie.mkv.parts").exists());
    }

    #[tokio::test]
    async fn test_sweep_removes_unprobeable_media() {
        let dir = TempDir::new().unwrap();
        let prober = Arc::new(MockProber::new());
        prober.reject("broken.mkv").await;
        fs::write(dir.path().join("broken.mkv"), b"x").unwrap();
        fs::write(dir.path().join("fine.mkv"), b"x").unwrap();

        let report = sweep_completed_folder(dir.path(), &filter_with(Some(prober))).await;

        assert_eq!(report.files_removed, 1);
        assert!(!dir.path().join("broken.mkv").exists());
        assert!(dir.path().join("fine.mkv").exists());
    }

    #[tokio::test]
    async fn test_sweep_prunes_nested_empty_folders() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("Show/Season 1/Extras");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("junk.txt"), b"x").unwrap();

        let report = sweep_completed_folder(dir.path(), &filter_with(None)).await;

        assert_eq!(report.files_removed, 1);
        assert_eq!(report.folders_removed, 3);
        assert!(dir.path().exists());
        assert!(report.folder_empty);
    }

    #[tokio::test]
    async fn test_sweep_missing_folder_is_noop() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent");
        let report = sweep_completed_folder(&missing, &filter_with(None)).await;
        assert_eq!(report, SweepReport::default());
    }
}
