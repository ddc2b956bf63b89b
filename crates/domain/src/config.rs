//! Configuration management

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub retry: RetrySettings,
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
    #[serde(skip_serializing)]
    pub encryption_key: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "bookline.db".to_string(), pool_size: 8, encryption_key: None }
    }
}

/// Outbound HTTP configuration shared by all backend adapters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Per-backend base URL overrides keyed by backend kind (`"ghl"`,
    /// `"hubspot"`, ...). Used for staging hosts and local mocks.
    pub base_urls: HashMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 10, base_urls: HashMap::new() }
    }
}

/// Retry settings applied to remote reads. Remote writes are never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_attempts: 2, initial_delay_ms: 200 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
