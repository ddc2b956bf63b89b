//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Read a `.env` file if one is present, then try environment variables
//! 2. If `BOOKLINE_DB_PATH` is unset, fall back to a config file
//! 3. Probe several paths for config files
//! 4. JSON and TOML are both accepted
//!
//! ## Environment Variables
//! - `BOOKLINE_DB_PATH`: Database file path (required for env loading)
//! - `BOOKLINE_DB_POOL_SIZE`: Connection pool size
//! - `BOOKLINE_DB_ENCRYPTION_KEY`: SQLCipher key
//! - `BOOKLINE_HTTP_TIMEOUT_SECS`: Per-request timeout for backend calls
//! - `BOOKLINE_RETRY_MAX_ATTEMPTS`: Attempts per remote read
//! - `BOOKLINE_LOG_LEVEL`: Default tracing filter
//! - `BOOKLINE_LOG_JSON`: Emit JSON log lines (true/false)
//!
//! Variables other than `BOOKLINE_DB_PATH` fall back to the defaults in
//! [`Config`] when unset.
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./bookline.json` or `./bookline.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use bookline_domain::{BooklineError, Config, DatabaseConfig, HttpConfig, LoggingConfig, Result, RetrySettings};

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `BooklineError::Config` if neither the environment nor any
/// config file yields a valid configuration.
pub fn load() -> Result<Config> {
    dotenvy::dotenv().ok();

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `BooklineError::Config` if `BOOKLINE_DB_PATH` is missing or any
/// variable holds an unparseable value.
pub fn load_from_env() -> Result<Config> {
    let defaults = Config::default();

    let path = env_var("BOOKLINE_DB_PATH")?;
    let pool_size = env_parse("BOOKLINE_DB_POOL_SIZE", defaults.database.pool_size)?;
    let encryption_key = std::env::var("BOOKLINE_DB_ENCRYPTION_KEY").ok().filter(|key| !key.is_empty());

    let timeout_secs = env_parse("BOOKLINE_HTTP_TIMEOUT_SECS", defaults.http.timeout_secs)?;
    let max_attempts = env_parse("BOOKLINE_RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts)?;

    let level = std::env::var("BOOKLINE_LOG_LEVEL").unwrap_or(defaults.logging.level);
    let json = env_bool("BOOKLINE_LOG_JSON", defaults.logging.json);

    let config = Config {
        database: DatabaseConfig { path, pool_size, encryption_key },
        http: HttpConfig { timeout_secs, base_urls: defaults.http.base_urls },
        retry: RetrySettings { max_attempts, initial_delay_ms: defaults.retry.initial_delay_ms },
        logging: LoggingConfig { level, json },
    };
    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations via
/// [`find_config_path`]. The format is chosen by file extension.
///
/// # Errors
/// Returns `BooklineError::Config` if the file is missing, unreadable, or
/// does not parse.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(BooklineError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => find_config_path().ok_or_else(|| {
            BooklineError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| BooklineError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    validate(&config)?;
    Ok(config)
}

/// Parse configuration from string content, picking the format from the
/// extension of `path` (`.json` when there is none).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| BooklineError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| BooklineError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(BooklineError::Config(format!("Unsupported config format: {}", extension))),
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.database.pool_size == 0 {
        return Err(BooklineError::Config("database.pool_size must be at least 1".into()));
    }
    if config.http.timeout_secs == 0 {
        return Err(BooklineError::Config("http.timeout_secs must be at least 1".into()));
    }
    if config.retry.max_attempts == 0 {
        return Err(BooklineError::Config("retry.max_attempts must be at least 1".into()));
    }
    for key in config.http.base_urls.keys() {
        key.parse::<bookline_domain::BackendKind>()
            .map_err(|_| BooklineError::Config(format!("http.base_urls has unknown backend `{key}`")))?;
    }
    Ok(())
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
#[must_use]
pub fn find_config_path() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("bookline.json"),
            cwd.join("bookline.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
            cwd.join("../../config.json"),
            cwd.join("../../config.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("bookline.json"),
                exe_dir.join("bookline.toml"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| BooklineError::Config(format!("Missing required environment variable: {}", key)))
}

/// Parse an optional variable, using `default` when it is unset.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| BooklineError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
