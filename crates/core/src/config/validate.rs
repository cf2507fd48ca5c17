use std::collections::HashSet;

use regex_lite::Regex;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Thresholds are within range
/// - Backend categories are unique and distinct from the failed category
/// - Backend URLs are set
/// - Exclusion patterns compile
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let settings = &config.settings;

    if !(0.0..=1.0).contains(&settings.max_deletable_percentage) {
        return Err(ConfigError::ValidationError(format!(
            "settings.max_deletable_percentage must be within 0.0..=1.0, got {}",
            settings.max_deletable_percentage
        )));
    }

    if settings.loop_sleep_secs == 0 {
        return Err(ConfigError::ValidationError(
            "settings.loop_sleep_secs cannot be 0".to_string(),
        ));
    }

    if settings.failed_category.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "settings.failed_category cannot be empty".to_string(),
        ));
    }

    if config.qbittorrent.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "qbittorrent.url cannot be empty".to_string(),
        ));
    }

    let mut categories = HashSet::new();
    for backend in config.managed_backends() {
        if backend.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "backend '{}' has an empty url",
                backend.name
            )));
        }
        if backend.category == settings.failed_category {
            return Err(ConfigError::ValidationError(format!(
                "backend '{}' uses the failed category '{}'",
                backend.name, backend.category
            )));
        }
        if !categories.insert(backend.category.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "category '{}' is used by more than one backend",
                backend.category
            )));
        }
    }

    let patterns = config
        .filter
        .folder_exclusion_patterns
        .iter()
        .chain(config.filter.file_name_exclusion_patterns.iter());
    for pattern in patterns {
        if let Err(e) = Regex::new(pattern) {
            return Err(ConfigError::ValidationError(format!(
                "invalid exclusion pattern '{}': {}",
                pattern, e
            )));
        }
    }

    Ok(())
}
