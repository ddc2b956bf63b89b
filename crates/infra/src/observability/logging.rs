//! Global `tracing` subscriber initialisation
//!
//! `RUST_LOG` wins when set. Otherwise the configured level is used as the
//! filter directive, so both `"debug"` and `"bookline_core=debug,warn"` work.

use bookline_domain::{BooklineError, LoggingConfig, Result};
use tracing_subscriber::EnvFilter;

/// Filter for `config`, preferring `RUST_LOG` from the environment.
///
/// # Errors
/// Returns `BooklineError::Config` when the configured level is not a valid
/// filter directive.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directive = if config.level.trim().is_empty() { "info" } else { config.level.trim() };
    EnvFilter::try_new(directive)
        .map_err(|e| BooklineError::Config(format!("Invalid log level `{}`: {}", config.level, e)))
}

/// Install the global subscriber. Returns `false` when one was already
/// installed, in which case nothing changes.
///
/// # Errors
/// Returns `BooklineError::Config` for an invalid level.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool> {
    let filter = build_filter(config)?;

    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(false)
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::debug!(level = %config.level, json = config.json, "tracing initialised");
    }
    Ok(installed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn logging(level: &str) -> LoggingConfig {
        LoggingConfig { level: level.to_string(), json: false }
    }

    #[test]
    fn accepts_plain_levels_and_directives() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert!(build_filter(&logging("debug")).is_ok());
        assert!(build_filter(&logging("bookline_core=trace,warn")).is_ok());
        assert!(build_filter(&logging("")).is_ok());
    }

    #[test]
    fn rejects_malformed_directive() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert!(matches!(build_filter(&logging("bookline=loud")), Err(BooklineError::Config(_))));
    }

    #[test]
    fn second_initialisation_is_a_no_op() {
        let config = logging("info");
        init_tracing(&config).unwrap();
        assert!(!init_tracing(&config).unwrap());
    }
}
