//! Scheduler integration tests: connectivity gating, maintenance commands,
//! and failure isolation between ticks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use queuewarden_core::{
    backend::{BackendError, MaintenanceCommand, QueueEntry, RequestManager, WorkItemRef},
    config::{FilterConfig, ImportMode, SettingsConfig},
    testing::{fixtures, BackendCall, MockRequestManager, MockTorrentClient, StaticConnectivity},
    torrent_client::TorrentState,
    Backend, BackendKind, ContentFilter, ReconciliationCycle, Scheduler, SchedulerConfig,
    TickOutcome, TorrentClient, TorrentClientError,
};

/// Request manager whose queue fetch panics.
struct PanickingManager;

#[async_trait]
impl RequestManager for PanickingManager {
    async fn get_queue(&self, _page_size: u32) -> Result<Vec<QueueEntry>, BackendError> {
        panic!("queue endpoint exploded");
    }

    async fn remove_queue_entry(
        &self,
        _id: i64,
        _remove_from_client: bool,
        _blocklist: bool,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn post_import_scan(
        &self,
        _path: &std::path::Path,
        _hash: &str,
        _mode: ImportMode,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn post_research(&self, _work_item: &WorkItemRef) -> Result<(), BackendError> {
        Ok(())
    }

    async fn post_maintenance(&self, _command: MaintenanceCommand) -> Result<(), BackendError> {
        Ok(())
    }

    async fn describe_work_item(&self, work_item: &WorkItemRef) -> Result<String, BackendError> {
        Ok(work_item.to_string())
    }
}

struct TestHarness {
    client: Arc<MockTorrentClient>,
    radarr: Arc<MockRequestManager>,
    connectivity: Arc<StaticConnectivity>,
    _temp_dir: TempDir,
    scheduler: Scheduler,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_manager(None)
    }

    fn with_manager(manager: Option<Arc<dyn RequestManager>>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let client = Arc::new(MockTorrentClient::new());
        let radarr = Arc::new(MockRequestManager::new());
        let connectivity = Arc::new(StaticConnectivity::new(true));

        let manager = manager.unwrap_or_else(|| radarr.clone() as Arc<dyn RequestManager>);
        let backends = vec![Backend::new(
            fixtures::backend_config("Radarr", BackendKind::Movie, "radarr"),
            manager,
            temp_dir.path(),
        )];
        let filter = Arc::new(ContentFilter::new(&FilterConfig::default(), None).unwrap());
        let settings = SettingsConfig {
            completed_download_folder: temp_dir.path().to_path_buf(),
            ..Default::default()
        };
        let cycle = ReconciliationCycle::new(
            client.clone() as Arc<dyn TorrentClient>,
            backends,
            filter,
            settings,
        );
        let scheduler = Scheduler::new(
            cycle,
            connectivity.clone(),
            SchedulerConfig {
                loop_sleep: Duration::from_millis(10),
                no_internet_sleep: Duration::from_millis(20),
            },
        );

        Self {
            client,
            radarr,
            connectivity,
            _temp_dir: temp_dir,
            scheduler,
        }
    }
}

#[tokio::test]
async fn test_offline_network_skips_cycle() {
    let harness = TestHarness::new();
    harness.connectivity.set_online(false);
    harness
        .client
        .add_mock_torrent(fixtures::torrent("A1", "failed", TorrentState::Downloading))
        .await;

    let outcome = harness.scheduler.run_once().await;

    assert!(matches!(outcome, TickOutcome::Offline));
    assert!(harness.client.calls().await.is_empty());
    assert!(harness.radarr.calls().await.is_empty());
    let status = harness.scheduler.status().await;
    assert!(!status.online);
    assert_eq!(status.cycles_run, 0);
}

#[tokio::test]
async fn test_unreachable_client_skips_cycle() {
    let harness = TestHarness::new();
    harness.client.set_reachable(false);

    let outcome = harness.scheduler.run_once().await;

    assert!(matches!(outcome, TickOutcome::Offline));
    assert!(harness.radarr.calls().await.is_empty());
}

#[tokio::test]
async fn test_online_tick_fires_maintenance_and_runs_cycle() {
    let harness = TestHarness::new();
    harness
        .client
        .add_mock_torrent(fixtures::torrent("A2", "radarr", TorrentState::Uploading))
        .await;

    let outcome = harness.scheduler.run_once().await;
    let TickOutcome::Completed(report) = outcome else {
        panic!("expected a completed cycle, got {:?}", outcome);
    };
    assert_eq!(report.paused, 1);

    // Maintenance commands are spawned, not awaited.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let calls = harness.radarr.calls().await;
    assert!(calls.contains(&BackendCall::Maintenance(
        MaintenanceCommand::RefreshMonitoredDownloads
    )));
    assert!(calls.contains(&BackendCall::Maintenance(MaintenanceCommand::RssSync)));

    let status = harness.scheduler.status().await;
    assert!(status.online);
    assert_eq!(status.cycles_run, 1);
    assert!(status.last_report.is_some());
    assert!(status.backends[0].last_rss_sync.is_some());
}

#[tokio::test]
async fn test_maintenance_not_repeated_before_interval() {
    let harness = TestHarness::new();

    harness.scheduler.run_once().await;
    harness.scheduler.run_once().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let rss_syncs = harness
        .radarr
        .calls()
        .await
        .into_iter()
        .filter(|c| *c == BackendCall::Maintenance(MaintenanceCommand::RssSync))
        .count();
    assert_eq!(rss_syncs, 1);
}

#[tokio::test]
async fn test_cycle_error_is_caught() {
    let harness = TestHarness::new();
    harness
        .client
        .set_next_error(TorrentClientError::ApiError("HTTP 500".into()))
        .await;

    let outcome = harness.scheduler.run_once().await;
    assert!(matches!(outcome, TickOutcome::Failed(_)));
    assert!(harness.scheduler.status().await.last_error.is_some());

    // The next tick recovers.
    let outcome = harness.scheduler.run_once().await;
    assert!(matches!(outcome, TickOutcome::Completed(_)));
    assert!(harness.scheduler.status().await.last_error.is_none());
}

#[tokio::test]
async fn test_failed_bulk_operation_completes_with_error() {
    let harness = TestHarness::new();
    harness
        .client
        .add_mock_torrent(fixtures::torrent("U1", "radarr", TorrentState::Uploading))
        .await;
    harness.client.fail_operation("pause").await;

    let outcome = harness.scheduler.run_once().await;

    let TickOutcome::Completed(report) = outcome else {
        panic!("expected a completed tick, got {:?}", outcome);
    };
    assert_eq!(report.failed_operations, vec!["pause".to_string()]);
    let status = harness.scheduler.status().await;
    assert_eq!(status.cycles_run, 1);
    assert!(status.last_error.unwrap().contains("pause"));
}

#[tokio::test]
async fn test_cycle_panic_is_caught() {
    let harness = TestHarness::with_manager(Some(Arc::new(PanickingManager)));

    let outcome = harness.scheduler.run_once().await;

    let TickOutcome::Panicked(message) = outcome else {
        panic!("expected a panicked cycle, got {:?}", outcome);
    };
    assert!(message.contains("queue endpoint exploded"));
    assert_eq!(harness.scheduler.status().await.cycles_run, 1);
}

#[tokio::test]
async fn test_start_and_stop() {
    let harness = TestHarness::new();

    let handle = harness.scheduler.start().expect("scheduler should start");
    assert!(harness.scheduler.is_running());
    assert!(harness.scheduler.start().is_none());

    tokio::time::sleep(Duration::from_millis(50)).await;
    harness.scheduler.stop();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop should stop")
        .unwrap();
    assert!(!harness.scheduler.is_running());
    assert!(harness.scheduler.status().await.cycles_run >= 1);
}
