//! Per-download decision function.
//!
//! [`classify`] walks an ordered list of named rules and returns the action of
//! the first one that applies. It performs no I/O: file lists must already be
//! loaded on the [`TorrentInfo`] and the content filter is only consulted for
//! its name based rules.

mod rules;
mod types;

pub use types::*;

use crate::torrent_client::TorrentInfo;

/// Decide what to do with one download.
pub fn classify(torrent: &TorrentInfo, ctx: &ClassifyContext<'_>) -> Decision {
    rules::RULES
        .iter()
        .find_map(|rule| {
            (rule.apply)(torrent, ctx).map(|action| Decision {
                rule: rule.name,
                action,
            })
        })
        .unwrap_or(Decision {
            rule: "default",
            action: Action::None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::filter::ContentFilter;
    use crate::torrent_client::{TorrentFile, TorrentState};
    use chrono::{DateTime, Duration, Utc};
    use std::collections::{HashMap, HashSet};

    const OLD: i64 = 3600;
    const YOUNG: i64 = 60;

    struct Fixture {
        now: DateTime<Utc>,
        filter: ContentFilter,
        sent: HashSet<String>,
        empty: HashSet<String>,
    }

    impl Fixture {
        fn new() -> Self {
            let filter = ContentFilter::new(
                &FilterConfig {
                    extension_allowlist: vec![".mkv".into(), ".srt".into()],
                    folder_exclusion_patterns: vec![r"\bextras?\b".into()],
                    file_name_exclusion_patterns: vec![r"\bsample\b".into()],
                    case_sensitive_matches: false,
                },
                None,
            )
            .unwrap();
            Self {
                now: Utc::now(),
                filter,
                sent: HashSet::new(),
                empty: HashSet::new(),
            }
        }

        fn ctx(&self) -> ClassifyContext<'_> {
            let mut routes = HashMap::new();
            routes.insert("radarr", &self.sent);
            routes.insert("sonarr", &self.empty);
            ClassifyContext {
                now: self.now,
                thresholds: Thresholds {
                    ignore_younger_than_secs: 600,
                    max_eta_secs: 18000,
                    max_deletable_percentage: 0.95,
                },
                failed_category: "failed",
                routes,
                filter: &self.filter,
            }
        }

        fn torrent(&self, state: TorrentState, age_secs: i64) -> TorrentInfo {
            TorrentInfo {
                hash: "ABC123".to_string(),
                name: "Some.Movie.2020".to_string(),
                state,
                progress: 0.5,
                eta_secs: Some(100),
                availability: 1.0,
                added_at: Some(self.now - Duration::seconds(age_secs)),
                amount_left: 1024,
                size_bytes: 2048,
                content_path: Some("/downloads/radarr/Some.Movie.2020".to_string()),
                category: Some("radarr".to_string()),
                files: vec![file(0, "Some.Movie.2020/movie.mkv", 1)],
            }
        }
    }

    fn file(index: u32, name: &str, priority: u8) -> TorrentFile {
        TorrentFile {
            index,
            name: name.to_string(),
            priority,
        }
    }

    fn completed(fx: &Fixture) -> TorrentInfo {
        let mut t = fx.torrent(TorrentState::PausedUpload, OLD);
        t.progress = 1.0;
        t.amount_left = 0;
        t
    }

    #[test]
    fn test_failed_category_deletes_regardless_of_state() {
        let fx = Fixture::new();
        for state in [
            TorrentState::CheckingDownload,
            TorrentState::Uploading,
            TorrentState::QueuedDownload,
            TorrentState::Downloading,
        ] {
            let mut t = fx.torrent(state, YOUNG);
            t.category = Some("failed".to_string());
            t.progress = 0.99;
            let decision = classify(&t, &fx.ctx());
            assert_eq!(decision.action, Action::Delete(DeleteReason::FailedCategory));
            assert_eq!(decision.rule, "failed_category");
        }
    }

    #[test]
    fn test_unmanaged_category_untouched() {
        let fx = Fixture::new();
        let mut t = fx.torrent(TorrentState::MissingFiles, OLD);
        t.category = Some("lidarr".to_string());
        assert_eq!(classify(&t, &fx.ctx()).action, Action::None);

        t.category = None;
        assert_eq!(classify(&t, &fx.ctx()).action, Action::None);
    }

    #[test]
    fn test_checking_and_queued_untouched() {
        let fx = Fixture::new();
        for state in [
            TorrentState::CheckingDownload,
            TorrentState::CheckingUpload,
            TorrentState::CheckingResumeData,
            TorrentState::QueuedDownload,
        ] {
            let mut t = fx.torrent(state, OLD);
            t.eta_secs = None;
            t.availability = 0.0;
            assert_eq!(classify(&t, &fx.ctx()).action, Action::None, "{:?}", state);
        }
    }

    #[test]
    fn test_uploading_is_paused() {
        let fx = Fixture::new();
        for state in [
            TorrentState::Uploading,
            TorrentState::StalledUpload,
            TorrentState::QueuedUpload,
            TorrentState::ForcedUpload,
        ] {
            let t = fx.torrent(state, OLD);
            assert_eq!(classify(&t, &fx.ctx()).action, Action::Pause);
        }
    }

    #[test]
    fn test_progress_gate_prevents_deletion() {
        let fx = Fixture::new();
        let mut t = fx.torrent(TorrentState::StalledDownload, OLD);
        t.progress = 0.95;
        t.eta_secs = None;
        t.availability = 0.2;
        let decision = classify(&t, &fx.ctx());
        assert_eq!(decision.action, Action::None);
        assert_eq!(decision.rule, "nearly_complete");
    }

    #[test]
    fn test_too_slow_deleted() {
        let fx = Fixture::new();
        let mut t = fx.torrent(TorrentState::Downloading, OLD);
        t.eta_secs = Some(18001);
        assert_eq!(
            classify(&t, &fx.ctx()).action,
            Action::Delete(DeleteReason::TooSlow)
        );

        t.eta_secs = None;
        assert_eq!(
            classify(&t, &fx.ctx()).action,
            Action::Delete(DeleteReason::TooSlow)
        );
    }

    #[test]
    fn test_too_slow_spares_young_and_paused() {
        let fx = Fixture::new();
        let mut young = fx.torrent(TorrentState::Downloading, YOUNG);
        young.eta_secs = Some(999_999);
        assert_eq!(classify(&young, &fx.ctx()).action, Action::None);

        let mut paused = fx.torrent(TorrentState::PausedDownload, OLD);
        paused.eta_secs = Some(999_999);
        assert_ne!(
            classify(&paused, &fx.ctx()).action,
            Action::Delete(DeleteReason::TooSlow)
        );
    }

    #[test]
    fn test_progress_gate_precedes_staleness() {
        let fx = Fixture::new();
        let mut t = fx.torrent(TorrentState::Downloading, OLD);
        t.progress = 0.97;
        t.eta_secs = Some(50_000);
        t.availability = 0.1;
        assert_eq!(classify(&t, &fx.ctx()).action, Action::None);
    }

    #[test]
    fn test_slow_download_just_past_young_threshold() {
        let fx = Fixture::new();
        let mut t = fx.torrent(TorrentState::Downloading, 700);
        t.eta_secs = Some(20_000);
        let action = classify(&t, &fx.ctx()).action;
        assert_eq!(action, Action::Delete(DeleteReason::TooSlow));
        assert!(!DeleteReason::TooSlow.is_exempt());
    }

    #[test]
    fn test_eta_at_limit_is_kept() {
        let fx = Fixture::new();
        let mut t = fx.torrent(TorrentState::Downloading, OLD);
        t.eta_secs = Some(18000);
        assert_eq!(classify(&t, &fx.ctx()).action, Action::None);
    }

    #[test]
    fn test_missing_files_deleted_without_blocklist() {
        let fx = Fixture::new();
        let t = fx.torrent(TorrentState::MissingFiles, YOUNG);
        let action = classify(&t, &fx.ctx()).action;
        assert_eq!(action, Action::Delete(DeleteReason::MissingFiles));
        assert!(DeleteReason::MissingFiles.is_exempt());
    }

    #[test]
    fn test_error_rechecked() {
        let fx = Fixture::new();
        let t = fx.torrent(TorrentState::Error, YOUNG);
        assert_eq!(classify(&t, &fx.ctx()).action, Action::Recheck);
    }

    #[test]
    fn test_missing_files_and_error_ignore_progress_gate() {
        let fx = Fixture::new();

        let mut missing = fx.torrent(TorrentState::MissingFiles, OLD);
        missing.progress = 0.97;
        let decision = classify(&missing, &fx.ctx());
        assert_eq!(decision.rule, "missing_files");
        assert_eq!(decision.action, Action::Delete(DeleteReason::MissingFiles));

        let mut errored = fx.torrent(TorrentState::Error, OLD);
        errored.progress = 0.97;
        let decision = classify(&errored, &fx.ctx());
        assert_eq!(decision.rule, "errored");
        assert_eq!(decision.action, Action::Recheck);
    }

    #[test]
    fn test_stalled_and_metadata_deleted_when_old() {
        let fx = Fixture::new();
        for state in [TorrentState::StalledDownload, TorrentState::MetadataDownload] {
            let mut old = fx.torrent(state, OLD);
            old.eta_secs = Some(10);
            assert_eq!(
                classify(&old, &fx.ctx()).action,
                Action::Delete(DeleteReason::Stalled)
            );

            let young = fx.torrent(state, YOUNG);
            assert_eq!(classify(&young, &fx.ctx()).action, Action::None);
        }
    }

    #[test]
    fn test_unavailable_deleted_when_old() {
        let fx = Fixture::new();
        let mut t = fx.torrent(TorrentState::PausedDownload, OLD);
        t.availability = 0.5;
        assert_eq!(
            classify(&t, &fx.ctx()).action,
            Action::Delete(DeleteReason::Unavailable)
        );

        let mut young = fx.torrent(TorrentState::PausedDownload, YOUNG);
        young.availability = 0.5;
        assert_ne!(
            classify(&young, &fx.ctx()).action,
            Action::Delete(DeleteReason::Unavailable)
        );
    }

    #[test]
    fn test_filter_excludes_files() {
        let fx = Fixture::new();
        let mut t = fx.torrent(TorrentState::Downloading, YOUNG);
        t.files = vec![
            file(0, "Movie/movie.mkv", 1),
            file(1, "Movie/movie.nfo", 1),
            file(2, "Movie/Extras/bts.mkv", 1),
            file(3, "Movie/movie-sample.mkv", 1),
        ];
        assert_eq!(
            classify(&t, &fx.ctx()).action,
            Action::FilterFiles {
                exclude: vec![1, 2, 3],
                resume: false
            }
        );
    }

    #[test]
    fn test_filter_skips_already_excluded_files() {
        let fx = Fixture::new();
        let mut t = fx.torrent(TorrentState::Downloading, YOUNG);
        t.files = vec![file(0, "Movie/movie.mkv", 1), file(1, "Movie/movie.nfo", 0)];
        assert_eq!(classify(&t, &fx.ctx()).action, Action::None);
    }

    #[test]
    fn test_no_eligible_files_deleted() {
        let fx = Fixture::new();
        let mut t = fx.torrent(TorrentState::Downloading, YOUNG);
        t.files = vec![file(0, "Movie/movie.exe", 1), file(1, "Movie/movie.mkv", 0)];
        assert_eq!(
            classify(&t, &fx.ctx()).action,
            Action::Delete(DeleteReason::NoEligibleFiles)
        );
    }

    #[test]
    fn test_unloaded_file_list_is_not_deleted() {
        let fx = Fixture::new();
        let mut t = fx.torrent(TorrentState::Downloading, YOUNG);
        t.files.clear();
        assert_eq!(classify(&t, &fx.ctx()).action, Action::None);
    }

    #[test]
    fn test_paused_download_resumed() {
        let fx = Fixture::new();
        let t = fx.torrent(TorrentState::PausedDownload, YOUNG);
        assert_eq!(
            classify(&t, &fx.ctx()).action,
            Action::FilterFiles {
                exclude: vec![],
                resume: true
            }
        );
    }

    #[test]
    fn test_completed_imported_to_owning_backend() {
        let fx = Fixture::new();
        let t = completed(&fx);
        let decision = classify(&t, &fx.ctx());
        assert_eq!(
            decision.action,
            Action::Import {
                category: "radarr".to_string()
            }
        );
        assert_eq!(decision.rule, "completed");
    }

    #[test]
    fn test_completed_not_imported_twice() {
        let mut fx = Fixture::new();
        fx.sent.insert("ABC123".to_string());
        let t = completed(&fx);
        let decision = classify(&t, &fx.ctx());
        assert_eq!(decision.action, Action::None);
        assert_eq!(decision.rule, "already_sent_to_scan");
    }

    #[test]
    fn test_sent_to_scan_is_per_backend() {
        let mut fx = Fixture::new();
        fx.sent.insert("ABC123".to_string());
        let mut t = completed(&fx);
        t.category = Some("sonarr".to_string());
        assert_eq!(
            classify(&t, &fx.ctx()).action,
            Action::Import {
                category: "sonarr".to_string()
            }
        );
    }

    #[test]
    fn test_paused_upload_without_path_is_left_alone() {
        let fx = Fixture::new();
        let mut t = completed(&fx);
        t.content_path = None;
        assert_eq!(classify(&t, &fx.ctx()).action, Action::None);
    }
}
