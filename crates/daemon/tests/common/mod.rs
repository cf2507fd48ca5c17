//! Common test utilities for API testing with mocks.
//!
//! Builds an in-process router over a scheduler whose torrent client and
//! request manager are mocks, so no qBittorrent or backend is needed.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use queuewarden::api::create_router;
use queuewarden::state::AppState;
use queuewarden_core::{
    load_config_from_str,
    testing::{MockRequestManager, MockTorrentClient, StaticConnectivity},
    Backend, Config, ContentFilter, ReconciliationCycle, Scheduler, SchedulerConfig,
    TorrentClient,
};

/// Re-export fixtures for test convenience
pub use queuewarden_core::testing::fixtures;

pub struct TestFixture {
    pub router: Router,
    pub scheduler: Arc<Scheduler>,
    pub torrent_client: Arc<MockTorrentClient>,
    pub radarr: Arc<MockRequestManager>,
    pub _temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = test_config(&temp_dir);

        let torrent_client = Arc::new(MockTorrentClient::new());
        let radarr = Arc::new(MockRequestManager::new());

        let backends = config
            .managed_backends()
            .map(|b| {
                Backend::new(
                    b.clone(),
                    radarr.clone(),
                    &config.settings.completed_download_folder,
                )
            })
            .collect();
        let filter =
            Arc::new(ContentFilter::new(&config.filter, None).expect("Failed to build filter"));
        let cycle = ReconciliationCycle::new(
            torrent_client.clone() as Arc<dyn TorrentClient>,
            backends,
            filter,
            config.settings.clone(),
        );
        let scheduler = Arc::new(Scheduler::new(
            cycle,
            Arc::new(StaticConnectivity::new(true)),
            SchedulerConfig::from(&config.settings),
        ));

        let state = Arc::new(AppState::new(config, Arc::clone(&scheduler)));
        let router = create_router(state);

        Self {
            router,
            scheduler,
            torrent_client,
            radarr,
            _temp_dir: temp_dir,
        }
    }

    /// Send a GET request to the test router.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body, text }
    }
}

fn test_config(temp_dir: &TempDir) -> Config {
    let toml = format!(
        r#"
[settings]
completed_download_folder = "{}"
ping_urls = []

[qbittorrent]
url = "http://127.0.0.1:8080"
username = "admin"
password = "secret"

[[backends]]
name = "Radarr"
kind = "movie"
url = "http://127.0.0.1:7878"
api_key = "radarr-key"
category = "radarr"
"#,
        temp_dir.path().display()
    );
    load_config_from_str(&toml).expect("Failed to parse test config")
}
