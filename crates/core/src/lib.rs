pub mod backend;
pub mod classifier;
pub mod config;
pub mod filter;
pub mod metrics;
pub mod reconcile;
pub mod scheduler;
pub mod testing;
pub mod torrent_client;

pub use backend::{
    Backend, BackendError, BackendStatus, MaintenanceCommand, QueueEntry, RequestManager,
    ServarrClient, WorkItemRef,
};
pub use classifier::{classify, Action, ClassifyContext, Decision, DeleteReason, Thresholds};
pub use config::{
    load_config, load_config_from_str, validate_config, BackendConfig, BackendKind, Config,
    ConfigError, ImportMode, SanitizedConfig,
};
pub use filter::{ContentFilter, FfprobeProber, FilterContext, MediaProber, ProbeError};
pub use reconcile::{CycleError, CycleReport, ReconciliationCycle};
pub use scheduler::{
    ConnectivityCheck, HttpConnectivity, Scheduler, SchedulerConfig, SchedulerStatus, TickOutcome,
};
pub use torrent_client::{QBittorrentClient, TorrentClient, TorrentClientError, TorrentInfo};
