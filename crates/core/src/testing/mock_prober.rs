//! Mock media prober for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::filter::{MediaProber, ProbeError};

/// Accepts every file except those whose name was rejected.
#[derive(Debug, Default)]
pub struct MockProber {
    rejected: Arc<RwLock<HashSet<String>>>,
    unavailable: Arc<RwLock<bool>>,
    probes: AtomicUsize,
}

impl MockProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail probes of files named `file_name`.
    pub async fn reject(&self, file_name: &str) {
        self.rejected.write().await.insert(file_name.to_string());
    }

    /// Behave as if the probe binary were missing.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    /// Number of probe calls made.
    pub async fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProber for MockProber {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<(), ProbeError> {
        self.probes.fetch_add(1, Ordering::SeqCst);

        if *self.unavailable.read().await {
            return Err(ProbeError::Unavailable {
                path: PathBuf::from("mock-ffprobe"),
            });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.rejected.read().await.contains(&name) {
            return Err(ProbeError::Invalid(format!(
                "Invalid data found when processing input: {}",
                name
            )));
        }
        Ok(())
    }
}
