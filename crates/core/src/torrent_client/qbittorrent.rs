//! qBittorrent torrent client implementation (Web API v2).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::QBittorrentConfig;

use super::{
    canonical_hash, TorrentClient, TorrentClientError, TorrentFile, TorrentFilters, TorrentInfo,
    TorrentState,
};

/// qBittorrent reports this ETA when the download will never finish.
const QB_INFINITE_ETA: i64 = 8_640_000;

/// qBittorrent client implementation.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Session marker (the cookie itself lives in the client's jar).
    session: Arc<RwLock<Option<String>>>,
}

impl QBittorrentClient {
    /// Create a new qBittorrent client.
    pub fn new(config: QBittorrentConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| TorrentClientError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Login and store session cookie.
    async fn login(&self) -> Result<(), TorrentClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());

        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            let mut session = self.session.write().await;
            *session = Some("authenticated".to_string());
            Ok(())
        } else if body.contains("Fails.") || status == StatusCode::FORBIDDEN {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    /// Ensure we have a valid session, logging in if needed.
    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        let session = self.session.read().await;
        if session.is_some() {
            return Ok(());
        }
        drop(session);
        self.login().await
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response, TorrentClientError> {
        let request = if *method == Method::GET {
            self.client.get(url).query(params)
        } else {
            self.client.post(url).form(params)
        };
        request.send().await.map_err(map_reqwest_error)
    }

    /// Make an authenticated request, re-authenticating once on 403.
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, TorrentClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let mut response = self.send_once(&method, &url, params).await?;

        if response.status() == StatusCode::FORBIDDEN {
            warn!("qBittorrent session expired, re-authenticating");
            {
                let mut session = self.session.write().await;
                *session = None;
            }
            self.login().await?;
            response = self.send_once(&method, &url, params).await?;
        }

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(TorrentClientError::ApiError(format!(
                "HTTP 404: {} not available",
                endpoint
            )));
        }
        if !status.is_success() {
            return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| TorrentClientError::ApiError(e.to_string()))
    }

    /// POST a bulk command; `fallback` is the newer endpoint name (qBittorrent 5
    /// renamed pause/resume to stop/start).
    async fn post_bulk(
        &self,
        endpoint: &str,
        fallback: Option<&str>,
        hashes: &[String],
        extra: &[(&str, &str)],
    ) -> Result<(), TorrentClientError> {
        if hashes.is_empty() {
            return Ok(());
        }
        let joined = join_hashes(hashes);
        let mut params = vec![("hashes", joined.as_str())];
        params.extend_from_slice(extra);

        match self.request(Method::POST, endpoint, &params).await {
            Err(TorrentClientError::ApiError(msg)) if msg.starts_with("HTTP 404") => {
                match fallback {
                    Some(newer) => {
                        debug!(endpoint, newer, "qBittorrent endpoint missing, using newer name");
                        self.request(Method::POST, newer, &params).await.map(|_| ())
                    }
                    None => Err(TorrentClientError::ApiError(msg)),
                }
            }
            other => other.map(|_| ()),
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else if e.is_connect() {
        TorrentClientError::ConnectionFailed(e.to_string())
    } else {
        TorrentClientError::ApiError(e.to_string())
    }
}

/// qBittorrent expects lower-case hashes joined with `|`.
fn join_hashes(hashes: &[String]) -> String {
    hashes
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("|")
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    state: String,
    progress: f64,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    eta: i64,
    #[serde(default)]
    availability: f64,
    #[serde(default)]
    added_on: i64,
    #[serde(default)]
    amount_left: i64,
    #[serde(default)]
    content_path: String,
    #[serde(default)]
    category: String,
}

impl QBTorrentInfo {
    fn into_torrent_info(self) -> TorrentInfo {
        TorrentInfo {
            hash: canonical_hash(&self.hash),
            name: self.name,
            state: parse_qb_state(&self.state),
            progress: self.progress,
            eta_secs: if self.eta >= 0 && self.eta < QB_INFINITE_ETA {
                Some(self.eta as u64)
            } else {
                None
            },
            availability: self.availability,
            added_at: timestamp_to_datetime(self.added_on),
            amount_left: self.amount_left.max(0) as u64,
            size_bytes: self.size.max(0) as u64,
            content_path: if self.content_path.is_empty() {
                None
            } else {
                Some(self.content_path)
            },
            category: if self.category.is_empty() {
                None
            } else {
                Some(self.category)
            },
            files: Vec::new(),
        }
    }
}

/// qBittorrent file entry response.
#[derive(Debug, Deserialize)]
struct QBTorrentFile {
    /// Missing on Web API versions before 2.8.2.
    #[serde(default)]
    index: Option<u32>,
    name: String,
    priority: u8,
}

/// Parse qBittorrent state string to TorrentState.
fn parse_qb_state(state: &str) -> TorrentState {
    match state {
        "error" => TorrentState::Error,
        "missingFiles" => TorrentState::MissingFiles,
        "uploading" => TorrentState::Uploading,
        "pausedUP" | "stoppedUP" => TorrentState::PausedUpload,
        "queuedUP" => TorrentState::QueuedUpload,
        "stalledUP" => TorrentState::StalledUpload,
        "checkingUP" => TorrentState::CheckingUpload,
        "forcedUP" => TorrentState::ForcedUpload,
        "allocating" => TorrentState::Allocating,
        "downloading" => TorrentState::Downloading,
        "metaDL" => TorrentState::MetadataDownload,
        "forcedMetaDL" => TorrentState::ForcedMetadataDownload,
        "pausedDL" | "stoppedDL" => TorrentState::PausedDownload,
        "queuedDL" => TorrentState::QueuedDownload,
        "forcedDL" => TorrentState::ForcedDownload,
        "stalledDL" => TorrentState::StalledDownload,
        "checkingDL" => TorrentState::CheckingDownload,
        "checkingResumeData" => TorrentState::CheckingResumeData,
        "moving" => TorrentState::Moving,
        _ => TorrentState::Unknown,
    }
}

/// Convert Unix timestamp to DateTime<Utc>.
fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn app_version(&self) -> Result<String, TorrentClientError> {
        self.request(Method::GET, "/api/v2/app/version", &[]).await
    }

    async fn list_torrents(
        &self,
        filters: &TorrentFilters,
    ) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        let mut params = vec![("sort", "category"), ("reverse", "true")];
        if let Some(category) = &filters.category {
            params.push(("category", category.as_str()));
        }

        let response = self
            .request(Method::GET, "/api/v2/torrents/info", &params)
            .await?;
        let torrents: Vec<QBTorrentInfo> = serde_json::from_str(&response).map_err(|e| {
            TorrentClientError::ApiError(format!("Failed to parse response: {}", e))
        })?;

        Ok(torrents
            .into_iter()
            .map(QBTorrentInfo::into_torrent_info)
            .collect())
    }

    async fn torrent_files(&self, hash: &str) -> Result<Vec<TorrentFile>, TorrentClientError> {
        let hash_lower = hash.to_ascii_lowercase();
        let response = self
            .request(
                Method::GET,
                "/api/v2/torrents/files",
                &[("hash", hash_lower.as_str())],
            )
            .await
            .map_err(|e| match e {
                TorrentClientError::ApiError(msg) if msg.starts_with("HTTP 404") => {
                    TorrentClientError::TorrentNotFound(hash.to_string())
                }
                other => other,
            })?;

        let files: Vec<QBTorrentFile> = serde_json::from_str(&response).map_err(|e| {
            TorrentClientError::ApiError(format!("Failed to parse response: {}", e))
        })?;

        Ok(files
            .into_iter()
            .enumerate()
            .map(|(position, f)| TorrentFile {
                index: f.index.unwrap_or(position as u32),
                name: f.name,
                priority: f.priority,
            })
            .collect())
    }

    async fn pause(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        self.post_bulk(
            "/api/v2/torrents/pause",
            Some("/api/v2/torrents/stop"),
            hashes,
            &[],
        )
        .await
    }

    async fn resume(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        self.post_bulk(
            "/api/v2/torrents/resume",
            Some("/api/v2/torrents/start"),
            hashes,
            &[],
        )
        .await
    }

    async fn delete(
        &self,
        hashes: &[String],
        delete_files: bool,
    ) -> Result<(), TorrentClientError> {
        let delete_str = if delete_files { "true" } else { "false" };
        self.post_bulk(
            "/api/v2/torrents/delete",
            None,
            hashes,
            &[("deleteFiles", delete_str)],
        )
        .await
    }

    async fn recheck(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        self.post_bulk("/api/v2/torrents/recheck", None, hashes, &[])
            .await
    }

    async fn set_file_priority(
        &self,
        hash: &str,
        file_ids: &[u32],
        priority: u8,
    ) -> Result<(), TorrentClientError> {
        if file_ids.is_empty() {
            return Ok(());
        }
        let hash_lower = hash.to_ascii_lowercase();
        let ids = file_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join("|");
        let priority = priority.to_string();

        self.request(
            Method::POST,
            "/api/v2/torrents/filePrio",
            &[
                ("hash", hash_lower.as_str()),
                ("id", ids.as_str()),
                ("priority", priority.as_str()),
            ],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_qb_state_download_family() {
        assert_eq!(parse_qb_state("downloading"), TorrentState::Downloading);
        assert_eq!(parse_qb_state("forcedDL"), TorrentState::ForcedDownload);
        assert_eq!(parse_qb_state("metaDL"), TorrentState::MetadataDownload);
        assert_eq!(parse_qb_state("stalledDL"), TorrentState::StalledDownload);
        assert_eq!(parse_qb_state("queuedDL"), TorrentState::QueuedDownload);
    }

    #[test]
    fn test_parse_qb_state_paused_and_stopped() {
        assert_eq!(parse_qb_state("pausedDL"), TorrentState::PausedDownload);
        assert_eq!(parse_qb_state("stoppedDL"), TorrentState::PausedDownload);
        assert_eq!(parse_qb_state("pausedUP"), TorrentState::PausedUpload);
        assert_eq!(parse_qb_state("stoppedUP"), TorrentState::PausedUpload);
    }

    #[test]
    fn test_parse_qb_state_anomalies() {
        assert_eq!(parse_qb_state("error"), TorrentState::Error);
        assert_eq!(parse_qb_state("missingFiles"), TorrentState::MissingFiles);
        assert_eq!(
            parse_qb_state("checkingResumeData"),
            TorrentState::CheckingResumeData
        );
        assert_eq!(parse_qb_state("something_else"), TorrentState::Unknown);
    }

    #[test]
    fn test_timestamp_to_datetime() {
        let dt = timestamp_to_datetime(1703980800).unwrap();
        assert_eq!(dt.year(), 2023);
        assert!(timestamp_to_datetime(-1).is_none());
        assert!(timestamp_to_datetime(0).is_none());
    }

    #[test]
    fn test_join_hashes_lowercases() {
        let hashes = vec!["ABC".to_string(), "Def".to_string()];
        assert_eq!(join_hashes(&hashes), "abc|def");
    }

    #[test]
    fn test_qb_torrent_info_conversion() {
        let raw = r#"{
            "hash": "abc123",
            "name": "Some.Movie.2020.1080p",
            "state": "downloading",
            "progress": 0.5,
            "size": 1000000,
            "eta": 8640000,
            "availability": 0.75,
            "added_on": 1703980800,
            "amount_left": 500000,
            "content_path": "/downloads/radarr/Some.Movie.2020.1080p",
            "category": "radarr",
            "num_seeds": 4
        }"#;
        let qb_info: QBTorrentInfo = serde_json::from_str(raw).unwrap();

        let info = qb_info.into_torrent_info();
        assert_eq!(info.hash, "ABC123");
        assert_eq!(info.state, TorrentState::Downloading);
        assert_eq!(info.eta_secs, None);
        assert!((info.availability - 0.75).abs() < 0.001);
        assert_eq!(info.amount_left, 500000);
        assert_eq!(info.category.as_deref(), Some("radarr"));
        assert!(info.files.is_empty());
    }

    #[test]
    fn test_qb_torrent_info_empty_fields() {
        let raw = r#"{
            "hash": "abc",
            "name": "x",
            "state": "pausedUP",
            "progress": 1.0,
            "eta": 0,
            "content_path": "",
            "category": ""
        }"#;
        let info = serde_json::from_str::<QBTorrentInfo>(raw)
            .unwrap()
            .into_torrent_info();
        assert_eq!(info.eta_secs, Some(0));
        assert!(info.content_path.is_none());
        assert!(info.category.is_none());
        assert!(info.added_at.is_none());
    }

    #[test]
    fn test_qb_file_without_index() {
        let raw = r#"[{"name": "a/b.mkv", "priority": 1}]"#;
        let files: Vec<QBTorrentFile> = serde_json::from_str(raw).unwrap();
        assert_eq!(files[0].index, None);
    }
}
