//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for parley
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote endpoint configuration
    #[serde(default)]
    pub endpoint: EndpointConfig,
    /// Session storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote message-generation endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// URL receiving `{"message": ...}` POST requests
    #[serde(default = "default_endpoint_url")]
    pub url: String,
    /// Upper bound on a single request, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint_url() -> String {
    "http://localhost:8000/".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_endpoint_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Where sessions are stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the session blob
    #[serde(default = "default_storage_dir")]
    pub dir: String,
    /// Maximum blob size in bytes, 0 for unbounded
    #[serde(default = "default_capacity_bytes")]
    pub capacity_bytes: usize,
}

fn default_storage_dir() -> String {
    "~/.parley/data".to_string()
}

fn default_capacity_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            capacity_bytes: default_capacity_bytes(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Days to keep rotated log files
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "~/.parley/logs".to_string()
}

fn default_retention_days() -> u64 {
    7
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            retention_days: default_retention_days(),
            overrides: HashMap::new(),
        }
    }
}
