//! Ordered decision rules. The first rule returning an action wins.
//!
//! Missing files and errors are decided before the progress gate, at any
//! progress or age.

use std::path::Path;

use crate::torrent_client::{TorrentInfo, TorrentState};

use super::{Action, ClassifyContext, DeleteReason};

pub(super) struct Rule {
    pub name: &'static str,
    pub apply: fn(&TorrentInfo, &ClassifyContext<'_>) -> Option<Action>,
}

pub(super) const RULES: &[Rule] = &[
    Rule {
        name: "failed_category",
        apply: failed_category,
    },
    Rule {
        name: "unmanaged_category",
        apply: unmanaged_category,
    },
    Rule {
        name: "checking",
        apply: checking,
    },
    Rule {
        name: "queued",
        apply: queued,
    },
    Rule {
        name: "uploading",
        apply: uploading,
    },
    Rule {
        name: "missing_files",
        apply: missing_files,
    },
    Rule {
        name: "errored",
        apply: errored,
    },
    Rule {
        name: "nearly_complete",
        apply: nearly_complete,
    },
    Rule {
        name: "already_sent_to_scan",
        apply: already_sent_to_scan,
    },
    Rule {
        name: "too_slow",
        apply: too_slow,
    },
    Rule {
        name: "stalled",
        apply: stalled,
    },
    Rule {
        name: "downloading",
        apply: downloading,
    },
    Rule {
        name: "completed",
        apply: completed,
    },
];

fn is_old(torrent: &TorrentInfo, ctx: &ClassifyContext<'_>) -> bool {
    torrent.age_secs(ctx.now) > ctx.thresholds.ignore_younger_than_secs
}

fn failed_category(torrent: &TorrentInfo, ctx: &ClassifyContext<'_>) -> Option<Action> {
    (torrent.category() == ctx.failed_category).then_some(Action::Delete(DeleteReason::FailedCategory))
}

fn unmanaged_category(torrent: &TorrentInfo, ctx: &ClassifyContext<'_>) -> Option<Action> {
    (!ctx.is_managed(torrent.category())).then_some(Action::None)
}

fn checking(torrent: &TorrentInfo, _ctx: &ClassifyContext<'_>) -> Option<Action> {
    torrent.state.is_checking().then_some(Action::None)
}

fn queued(torrent: &TorrentInfo, _ctx: &ClassifyContext<'_>) -> Option<Action> {
    (torrent.state == TorrentState::QueuedDownload).then_some(Action::None)
}

fn uploading(torrent: &TorrentInfo, _ctx: &ClassifyContext<'_>) -> Option<Action> {
    torrent.state.is_uploading().then_some(Action::Pause)
}

/// Completed downloads pass through so they can reach the import rule.
fn nearly_complete(torrent: &TorrentInfo, ctx: &ClassifyContext<'_>) -> Option<Action> {
    (torrent.progress >= ctx.thresholds.max_deletable_percentage && !torrent.is_completed())
        .then_some(Action::None)
}

fn already_sent_to_scan(torrent: &TorrentInfo, ctx: &ClassifyContext<'_>) -> Option<Action> {
    ctx.is_sent_to_scan(torrent.category(), &torrent.hash)
        .then_some(Action::None)
}

fn too_slow(torrent: &TorrentInfo, ctx: &ClassifyContext<'_>) -> Option<Action> {
    let eta_exceeded = torrent
        .eta_secs
        .map_or(true, |eta| eta > ctx.thresholds.max_eta_secs);
    (torrent.state.is_actively_downloading() && is_old(torrent, ctx) && eta_exceeded)
        .then_some(Action::Delete(DeleteReason::TooSlow))
}

fn missing_files(torrent: &TorrentInfo, _ctx: &ClassifyContext<'_>) -> Option<Action> {
    (torrent.state == TorrentState::MissingFiles)
        .then_some(Action::Delete(DeleteReason::MissingFiles))
}

fn errored(torrent: &TorrentInfo, _ctx: &ClassifyContext<'_>) -> Option<Action> {
    (torrent.state == TorrentState::Error).then_some(Action::Recheck)
}

fn stalled(torrent: &TorrentInfo, ctx: &ClassifyContext<'_>) -> Option<Action> {
    let stuck = matches!(
        torrent.state,
        TorrentState::MetadataDownload | TorrentState::StalledDownload
    );
    (stuck && is_old(torrent, ctx)).then_some(Action::Delete(DeleteReason::Stalled))
}

/// Availability check, then the per-file content filter.
fn downloading(torrent: &TorrentInfo, ctx: &ClassifyContext<'_>) -> Option<Action> {
    if !torrent.state.is_downloading() {
        return None;
    }

    if is_old(torrent, ctx) && torrent.availability < 1.0 {
        return Some(Action::Delete(DeleteReason::Unavailable));
    }

    let mut eligible = 0usize;
    let mut exclude = Vec::new();
    for file in torrent.files.iter().filter(|f| !f.is_excluded()) {
        if ctx.filter.check_name(Path::new(&file.name)).is_allowed() {
            eligible += 1;
        } else {
            exclude.push(file.index);
        }
    }

    // An unloaded file list is not evidence of an empty torrent.
    if !torrent.files.is_empty() && eligible == 0 {
        return Some(Action::Delete(DeleteReason::NoEligibleFiles));
    }

    let resume = torrent.state == TorrentState::PausedDownload;
    if exclude.is_empty() && !resume {
        return Some(Action::None);
    }
    Some(Action::FilterFiles { exclude, resume })
}

fn completed(torrent: &TorrentInfo, _ctx: &ClassifyContext<'_>) -> Option<Action> {
    torrent.is_completed().then(|| Action::Import {
        category: torrent.category().to_string(),
    })
}
