//! Configuration validation rules.

use super::schema::Config;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    let url = config.endpoint.url.trim();
    if url.is_empty() {
        errors.push("endpoint.url must not be empty".to_string());
    } else if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push("endpoint.url must start with http:// or https://".to_string());
    }
    if config.endpoint.timeout_secs == 0 {
        errors.push("endpoint.timeout_secs must be > 0".to_string());
    }

    if config.storage.dir.trim().is_empty() {
        errors.push("storage.dir must not be empty".to_string());
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        errors.push(format!(
            "logging.level must be one of {}",
            LOG_LEVELS.join(", ")
        ));
    }
    if !matches!(config.logging.format.to_ascii_lowercase().as_str(), "text" | "json") {
        errors.push("logging.format must be text or json".to_string());
    }
    if config.logging.dir.trim().is_empty() {
        errors.push("logging.dir must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
