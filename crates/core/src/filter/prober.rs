//! Media integrity probing via ffprobe.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::trace;

use crate::config::ProberConfig;

/// Errors that can occur while probing a file.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe binary is missing; callers treat every file as acceptable.
    #[error("Prober not available at path: {path}")]
    Unavailable { path: PathBuf },

    /// The file is not well-formed media.
    #[error("Invalid media: {0}")]
    Invalid(String),

    #[error("Probe returned no output")]
    NoOutput,

    #[error("Probe timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Oracle answering "is this file well-formed media".
#[async_trait]
pub trait MediaProber: Send + Sync {
    fn name(&self) -> &str;

    async fn probe(&self, path: &Path) -> Result<(), ProbeError>;
}

/// ffprobe-backed prober.
pub struct FfprobeProber {
    config: ProberConfig,
}

impl FfprobeProber {
    pub fn new(config: ProberConfig) -> Self {
        Self { config }
    }

    /// Check the binary can be executed.
    pub async fn validate(&self) -> Result<(), ProbeError> {
        Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| self.map_spawn_error(e))?;
        Ok(())
    }

    fn map_spawn_error(&self, e: std::io::Error) -> ProbeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProbeError::Unavailable {
                path: self.config.ffprobe_path.clone(),
            }
        } else {
            ProbeError::Io(e)
        }
    }
}

/// ffprobe prints `{}` for inputs it cannot make sense of.
fn has_probe_output(stdout: &str) -> bool {
    match serde_json::from_str::<serde_json::Value>(stdout) {
        Ok(serde_json::Value::Object(map)) => !map.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    fn name(&self) -> &str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> Result<(), ProbeError> {
        let command = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .kill_on_drop(true)
            .output();

        let output = timeout(Duration::from_secs(self.config.timeout_secs), command)
            .await
            .map_err(|_| ProbeError::Timeout {
                timeout_secs: self.config.timeout_secs,
            })?
            .map_err(|e| self.map_spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            trace!(path = %path.display(), %stderr, "Probe returned an error");
            return Err(ProbeError::Invalid(stderr.trim().to_string()));
        }

        if !has_probe_output(&String::from_utf8_lossy(&output.stdout)) {
            return Err(ProbeError::NoOutput);
        }
        Ok(())
    }
}
