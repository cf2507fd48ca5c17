//! Servarr (Radarr/Sonarr) v3 API client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{BackendConfig, BackendKind, ImportMode};
use crate::torrent_client::canonical_hash;

use super::{BackendError, MaintenanceCommand, QueueEntry, RequestManager, WorkItemRef};

/// Servarr API client for one configured backend.
pub struct ServarrClient {
    client: Client,
    kind: BackendKind,
    base_url: String,
    api_key: String,
}

impl ServarrClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| BackendError::ConnectionFailed(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            kind: config.kind,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/api/v3{}", self.base_url, path))
            .header("X-Api-Key", &self.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(response.url().path().to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        self.send(self.request(Method::GET, path))
            .await?
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    async fn post_command(&self, body: Value) -> Result<(), BackendError> {
        debug!(command = %body["name"], "Posting backend command");
        self.send(self.request(Method::POST, "/command").json(&body))
            .await?;
        Ok(())
    }
}

fn map_reqwest_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else if e.is_connect() {
        BackendError::ConnectionFailed(e.to_string())
    } else {
        BackendError::ApiError(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct QueuePage {
    #[serde(default)]
    records: Vec<QueueRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueRecord {
    id: i64,
    #[serde(default)]
    download_id: Option<String>,
    #[serde(default)]
    movie_id: Option<i64>,
    #[serde(default)]
    episode_id: Option<i64>,
    #[serde(default)]
    episode: Option<IdOnly>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: i64,
}

impl From<QueueRecord> for QueueEntry {
    fn from(record: QueueRecord) -> Self {
        QueueEntry {
            id: record.id,
            download_id: record.download_id.map(|h| canonical_hash(&h)),
            movie_id: record.movie_id,
            episode_id: record.episode_id.or(record.episode.map(|e| e.id)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MovieResource {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    tmdb_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeResource {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    season_number: Option<i32>,
    #[serde(default)]
    episode_number: Option<i32>,
    #[serde(default)]
    absolute_episode_number: Option<i32>,
    #[serde(default)]
    series: Option<SeriesResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeriesResource {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    tvdb_id: Option<i64>,
}

fn movie_label(movie_id: i64, movie: &MovieResource) -> String {
    match &movie.title {
        Some(title) => format!(
            "{} ({}) [tmdbId={}|id={}]",
            title,
            movie.year.unwrap_or_default(),
            movie.tmdb_id.unwrap_or_default(),
            movie_id
        ),
        None => movie_id.to_string(),
    }
}

fn episode_label(ids: &[i64], episode: &EpisodeResource) -> String {
    let ids_str = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let Some(title) = &episode.title else {
        return ids_str;
    };

    let (series_title, year, tvdb_id) = episode
        .series
        .as_ref()
        .map(|s| (s.title.clone().unwrap_or_default(), s.year, s.tvdb_id))
        .unwrap_or_default();
    let absolute = episode
        .absolute_episode_number
        .map(|n| format!(" ({:04})", n))
        .unwrap_or_default();

    format!(
        "{} ({}) - S{:02}E{:03}{} - {} [tvdbId={}|id={}]",
        series_title,
        year.unwrap_or_default(),
        episode.season_number.unwrap_or_default(),
        episode.episode_number.unwrap_or_default(),
        absolute,
        title,
        tvdb_id.unwrap_or_default(),
        ids_str
    )
}

#[async_trait]
impl RequestManager for ServarrClient {
    async fn get_queue(&self, page_size: u32) -> Result<Vec<QueueEntry>, BackendError> {
        let path = format!("/queue?page=1&pageSize={}", page_size);
        let page: QueuePage = self.get_json(&path).await?;
        Ok(page.records.into_iter().map(QueueEntry::from).collect())
    }

    async fn remove_queue_entry(
        &self,
        id: i64,
        remove_from_client: bool,
        blocklist: bool,
    ) -> Result<(), BackendError> {
        let request = self.request(Method::DELETE, &format!("/queue/{}", id)).query(&[
            ("removeFromClient", remove_from_client),
            ("blocklist", blocklist),
        ]);
        self.send(request).await?;
        Ok(())
    }

    async fn post_import_scan(
        &self,
        path: &Path,
        hash: &str,
        mode: ImportMode,
    ) -> Result<(), BackendError> {
        let name = match self.kind {
            BackendKind::Movie => "DownloadedMoviesScan",
            BackendKind::Episode => "DownloadedEpisodesScan",
        };
        self.post_command(json!({
            "name": name,
            "path": path.to_string_lossy(),
            "downloadClientId": canonical_hash(hash),
            "importMode": mode.as_api_str(),
        }))
        .await
    }

    async fn post_research(&self, work_item: &WorkItemRef) -> Result<(), BackendError> {
        let body = match work_item {
            WorkItemRef::Movie(id) => json!({ "name": "MoviesSearch", "movieIds": [id] }),
            WorkItemRef::Episodes(ids) => json!({ "name": "EpisodeSearch", "episodeIds": ids }),
        };
        self.post_command(body).await
    }

    async fn post_maintenance(&self, command: MaintenanceCommand) -> Result<(), BackendError> {
        self.post_command(json!({ "name": command.as_str() })).await
    }

    async fn describe_work_item(&self, work_item: &WorkItemRef) -> Result<String, BackendError> {
        match work_item {
            WorkItemRef::Movie(id) => {
                let movie: MovieResource = self.get_json(&format!("/movie/{}", id)).await?;
                Ok(movie_label(*id, &movie))
            }
            WorkItemRef::Episodes(ids) => {
                let Some(first) = ids.first() else {
                    return Ok(String::new());
                };
                let episode: EpisodeResource =
                    self.get_json(&format!("/episode/{}", first)).await?;
                Ok(episode_label(ids, &episode))
            }
        }
    }
}
