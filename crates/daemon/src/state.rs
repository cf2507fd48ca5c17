use std::sync::Arc;

use queuewarden_core::{Config, SanitizedConfig, Scheduler};

/// Shared application state
pub struct AppState {
    config: Config,
    scheduler: Arc<Scheduler>,
}

impl AppState {
    pub fn new(config: Config, scheduler: Arc<Scheduler>) -> Self {
        Self { config, scheduler }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn scheduler(&self) -> &Scheduler {
        self.scheduler.as_ref()
    }
}
