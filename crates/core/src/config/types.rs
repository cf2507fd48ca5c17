use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub prober: ProberConfig,
    pub qbittorrent: QBittorrentConfig,
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Backends that should be instantiated.
    pub fn managed_backends(&self) -> impl Iterator<Item = &BackendConfig> {
        self.backends.iter().filter(|b| b.managed)
    }
}

/// Reconciliation loop settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettingsConfig {
    /// Torrents put in this category are deleted and reported as failed.
    #[serde(default = "default_failed_category")]
    pub failed_category: String,
    /// Parent of every backend's completed download folder.
    #[serde(default = "default_completed_folder")]
    pub completed_download_folder: PathBuf,
    /// Seconds to sleep between cycles.
    #[serde(default = "default_loop_sleep")]
    pub loop_sleep_secs: u64,
    /// Seconds to sleep when connectivity is unavailable.
    #[serde(default = "default_no_internet_sleep")]
    pub no_internet_sleep_secs: u64,
    /// Torrents younger than this are never considered stale or slow.
    #[serde(default = "default_ignore_younger_than")]
    pub ignore_younger_than_secs: u64,
    /// Downloads with an ETA above this are deleted as too slow.
    #[serde(default = "default_max_eta")]
    pub max_eta_secs: u64,
    /// Downloads at or beyond this progress are never discarded (0.0 - 1.0).
    #[serde(default = "default_max_deletable")]
    pub max_deletable_percentage: f64,
    /// Sweep completed folders after every cycle.
    #[serde(default)]
    pub auto_delete: bool,
    /// URLs pinged to decide whether the network is up.
    #[serde(default = "default_ping_urls")]
    pub ping_urls: Vec<String>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            failed_category: default_failed_category(),
            completed_download_folder: default_completed_folder(),
            loop_sleep_secs: default_loop_sleep(),
            no_internet_sleep_secs: default_no_internet_sleep(),
            ignore_younger_than_secs: default_ignore_younger_than(),
            max_eta_secs: default_max_eta(),
            max_deletable_percentage: default_max_deletable(),
            auto_delete: false,
            ping_urls: default_ping_urls(),
        }
    }
}

fn default_failed_category() -> String {
    "failed".to_string()
}

fn default_completed_folder() -> PathBuf {
    PathBuf::from("/downloads")
}

fn default_loop_sleep() -> u64 {
    5
}

fn default_no_internet_sleep() -> u64 {
    60
}

fn default_ignore_younger_than() -> u64 {
    600
}

fn default_max_eta() -> u64 {
    18000 // 5 hours
}

fn default_max_deletable() -> f64 {
    0.95
}

fn default_ping_urls() -> Vec<String> {
    vec![
        "https://one.one.one.one".to_string(),
        "https://dns.google".to_string(),
    ]
}

/// Per-file content filter configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Extensions allowed to stay in a download (with or without leading dot).
    #[serde(default = "default_extension_allowlist")]
    pub extension_allowlist: Vec<String>,
    /// Patterns matched against every ancestor folder name.
    #[serde(default = "default_folder_exclusions")]
    pub folder_exclusion_patterns: Vec<String>,
    /// Patterns searched for in the file name.
    #[serde(default = "default_file_name_exclusions")]
    pub file_name_exclusion_patterns: Vec<String>,
    #[serde(default)]
    pub case_sensitive_matches: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            extension_allowlist: default_extension_allowlist(),
            folder_exclusion_patterns: default_folder_exclusions(),
            file_name_exclusion_patterns: default_file_name_exclusions(),
            case_sensitive_matches: false,
        }
    }
}

fn default_extension_allowlist() -> Vec<String> {
    [".mp4", ".mkv", ".sub", ".ass", ".srt", ".!qB", ".parts"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_folder_exclusions() -> Vec<String> {
    [r"\bextras?\b", r"\bfeaturettes?\b", r"\bsamples?\b", r"\bsoundtrack\b"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_file_name_exclusions() -> Vec<String> {
    [r"\bncop\d+?\b", r"\bnced\d+?\b", r"\bsample\b", r"\btrailer\b"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Media integrity prober configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProberConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_probe_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_probe_timeout() -> u64 {
    30
}

/// qBittorrent client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// Web UI URL (e.g., "http://localhost:8080")
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Kind of work item a backend tracks.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// One download satisfies one movie (Radarr).
    Movie,
    /// One download may satisfy several episodes (Sonarr).
    Episode,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Movie => "movie",
            BackendKind::Episode => "episode",
        }
    }
}

/// How a backend brings a completed download into its library.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    Auto,
    Copy,
    #[default]
    Move,
    Hardlink,
}

impl ImportMode {
    /// Value expected by the backend's import command.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            ImportMode::Auto => "Auto",
            ImportMode::Copy => "Copy",
            ImportMode::Move => "Move",
            ImportMode::Hardlink => "HardLink",
        }
    }
}

/// A request manager (Radarr/Sonarr style) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Display name used in logs (e.g., "Radarr-4K").
    pub name: String,
    pub kind: BackendKind,
    pub url: String,
    pub api_key: String,
    /// Category applied by this backend to its torrents.
    pub category: String,
    #[serde(default = "default_true")]
    pub managed: bool,
    /// Search for a replacement after a failed download is removed.
    #[serde(default = "default_true")]
    pub research: bool,
    #[serde(default)]
    pub import_mode: ImportMode,
    /// Minutes between RefreshMonitoredDownloads commands (0 = disabled).
    #[serde(default = "default_refresh_minutes")]
    pub refresh_downloads_minutes: u64,
    /// Minutes between RssSync commands (0 = disabled).
    #[serde(default = "default_rss_minutes")]
    pub rss_sync_minutes: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_refresh_minutes() -> u64 {
    1
}

fn default_rss_minutes() -> u64 {
    15
}

/// Status API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8095
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub settings: SettingsConfig,
    pub filter: FilterConfig,
    pub prober: ProberConfig,
    pub qbittorrent: SanitizedQBittorrentConfig,
    pub backends: Vec<SanitizedBackendConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedQBittorrentConfig {
    pub url: String,
    pub username: String,
    pub password_configured: bool,
}

/// Sanitized backend config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedBackendConfig {
    pub name: String,
    pub kind: BackendKind,
    pub url: String,
    pub category: String,
    pub managed: bool,
    pub research: bool,
    pub import_mode: ImportMode,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            settings: config.settings.clone(),
            filter: config.filter.clone(),
            prober: config.prober.clone(),
            qbittorrent: SanitizedQBittorrentConfig {
                url: config.qbittorrent.url.clone(),
                username: config.qbittorrent.username.clone(),
                password_configured: !config.qbittorrent.password.is_empty(),
            },
            backends: config
                .backends
                .iter()
                .map(|b| SanitizedBackendConfig {
                    name: b.name.clone(),
                    kind: b.kind,
                    url: b.url.clone(),
                    category: b.category.clone(),
                    managed: b.managed,
                    research: b.research,
                    import_mode: b.import_mode,
                    api_key_configured: !b.api_key.is_empty(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[qbittorrent]
url = "http://localhost:8080"
"#;

    #[test]
    fn test_deserialize_minimal_config() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.qbittorrent.url, "http://localhost:8080");
        assert_eq!(config.qbittorrent.timeout_secs, 30);
        assert_eq!(config.settings.failed_category, "failed");
        assert_eq!(config.settings.max_eta_secs, 18000);
        assert_eq!(config.settings.ignore_younger_than_secs, 600);
        assert!((config.settings.max_deletable_percentage - 0.95).abs() < f64::EPSILON);
        assert!(!config.settings.auto_delete);
        assert!(config.backends.is_empty());
        assert!(!config.server.enabled);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_deserialize_missing_qbittorrent_fails() {
        let toml = r#"
[settings]
failed_category = "failed"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_backends() {
        let toml = r#"
[qbittorrent]
url = "http://localhost:8080"

[[backends]]
name = "Radarr"
kind = "movie"
url = "http://localhost:7878"
api_key = "abc"
category = "radarr"
import_mode = "hardlink"
rss_sync_minutes = 0

[[backends]]
name = "Sonarr"
kind = "episode"
url = "http://localhost:8989"
api_key = "def"
category = "sonarr"
managed = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.backends.len(), 2);

        let radarr = &config.backends[0];
        assert_eq!(radarr.kind, BackendKind::Movie);
        assert_eq!(radarr.import_mode, ImportMode::Hardlink);
        assert_eq!(radarr.rss_sync_minutes, 0);
        assert_eq!(radarr.refresh_downloads_minutes, 1);
        assert!(radarr.research);

        let sonarr = &config.backends[1];
        assert_eq!(sonarr.kind, BackendKind::Episode);
        assert_eq!(sonarr.import_mode, ImportMode::Move);

        let managed: Vec<_> = config.managed_backends().map(|b| b.name.as_str()).collect();
        assert_eq!(managed, vec!["Radarr"]);
    }

    #[test]
    fn test_import_mode_api_strings() {
        assert_eq!(ImportMode::Move.as_api_str(), "Move");
        assert_eq!(ImportMode::Copy.as_api_str(), "Copy");
        assert_eq!(ImportMode::Hardlink.as_api_str(), "HardLink");
        assert_eq!(ImportMode::Auto.as_api_str(), "Auto");
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let toml = r#"
[qbittorrent]
url = "http://localhost:8080"
username = "admin"
password = "hunter2"

[[backends]]
name = "Radarr"
kind = "movie"
url = "http://localhost:7878"
api_key = "secret-key"
category = "radarr"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);

        assert!(sanitized.qbittorrent.password_configured);
        assert!(sanitized.backends[0].api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("secret-key"));
    }
}
