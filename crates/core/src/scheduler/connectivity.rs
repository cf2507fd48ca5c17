//! Network connectivity probe.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

/// Timeout for a single ping.
pub const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Answers "is the network up".
#[async_trait]
pub trait ConnectivityCheck: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Pings one URL per check, rotating through the configured list.
pub struct HttpConnectivity {
    client: Client,
    urls: Vec<String>,
    next: AtomicUsize,
}

impl HttpConnectivity {
    pub fn new(urls: Vec<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(PING_TIMEOUT).build()?;
        Ok(Self {
            client,
            urls,
            next: AtomicUsize::new(0),
        })
    }

    fn next_url(&self) -> Option<&str> {
        if self.urls.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.urls.len();
        Some(self.urls[index].as_str())
    }
}

#[async_trait]
impl ConnectivityCheck for HttpConnectivity {
    async fn is_online(&self) -> bool {
        // Nothing to ping: assume online.
        let Some(url) = self.next_url() else {
            return true;
        };

        match self.client.head(url).send().await {
            Ok(_) => {
                debug!(url, "Connectivity check succeeded");
                true
            }
            Err(e) => {
                warn!(url, error = %e, "Connectivity check failed");
                false
            }
        }
    }
}
