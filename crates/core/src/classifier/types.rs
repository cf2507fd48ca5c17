//! Decision types produced by the classifier.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::Backend;
use crate::config::SettingsConfig;
use crate::filter::ContentFilter;

/// Why a download is being removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteReason {
    /// The user moved it to the failed category.
    FailedCategory,
    /// Actively downloading with an ETA above the limit.
    TooSlow,
    /// Data files vanished from disk.
    MissingFiles,
    /// Stuck fetching metadata or stalled without peers.
    Stalled,
    /// Not every piece is available from the swarm.
    Unavailable,
    /// Every file was excluded by the content filter.
    NoEligibleFiles,
    /// The content path never appeared on disk.
    PathUnresolved,
}

impl DeleteReason {
    /// Removed without blocklisting the release.
    pub fn is_exempt(&self) -> bool {
        matches!(self, DeleteReason::MissingFiles | DeleteReason::PathUnresolved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteReason::FailedCategory => "failed_category",
            DeleteReason::TooSlow => "too_slow",
            DeleteReason::MissingFiles => "missing_files",
            DeleteReason::Stalled => "stalled",
            DeleteReason::Unavailable => "unavailable",
            DeleteReason::NoEligibleFiles => "no_eligible_files",
            DeleteReason::PathUnresolved => "path_unresolved",
        }
    }
}

/// What to do with one download this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Pause,
    Delete(DeleteReason),
    Recheck,
    /// Set the listed files to priority 0 and/or resume the download.
    FilterFiles { exclude: Vec<u32>, resume: bool },
    /// Hand the completed download to the backend owning `category`.
    Import { category: String },
}

/// An action together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub rule: &'static str,
    pub action: Action,
}

/// Numeric thresholds used by the rules.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub ignore_younger_than_secs: u64,
    pub max_eta_secs: u64,
    pub max_deletable_percentage: f64,
}

impl From<&SettingsConfig> for Thresholds {
    fn from(settings: &SettingsConfig) -> Self {
        Self {
            ignore_younger_than_secs: settings.ignore_younger_than_secs,
            max_eta_secs: settings.max_eta_secs,
            max_deletable_percentage: settings.max_deletable_percentage,
        }
    }
}

/// Everything a rule may look at besides the download itself.
pub struct ClassifyContext<'a> {
    pub now: DateTime<Utc>,
    pub thresholds: Thresholds,
    pub failed_category: &'a str,
    /// Managed category -> hashes already handed off to its backend.
    pub routes: HashMap<&'a str, &'a HashSet<String>>,
    pub filter: &'a ContentFilter,
}

impl<'a> ClassifyContext<'a> {
    pub fn new(
        now: DateTime<Utc>,
        thresholds: Thresholds,
        failed_category: &'a str,
        backends: &'a [Backend],
        filter: &'a ContentFilter,
    ) -> Self {
        let routes = backends
            .iter()
            .map(|b| (b.category(), b.sent_to_scan()))
            .collect();
        Self {
            now,
            thresholds,
            failed_category,
            routes,
            filter,
        }
    }

    pub fn is_managed(&self, category: &str) -> bool {
        self.routes.contains_key(category)
    }

    /// Whether `hash` was already handed off to the backend owning `category`.
    pub fn is_sent_to_scan(&self, category: &str, hash: &str) -> bool {
        self.routes
            .get(category)
            .is_some_and(|sent| sent.contains(hash))
    }
}
