//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Bookline
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum BooklineError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested backend has no usable credentials or does not offer
    /// the requested capability.
    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Network failure, timeout, or 5xx from a remote backend.
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// A non-cancelled appointment already occupies the requested slot.
    #[error("Slot conflict: {0}")]
    SlotConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint other than the slot index was violated.
    #[error("Duplicate value: {0}")]
    Duplicate(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BooklineError {
    /// Whether this error came from a remote backend rather than a business
    /// rule. Remote failures degrade to local behaviour instead of surfacing.
    #[must_use]
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            Self::Auth(_) | Self::RateLimited(_) | Self::RemoteUnavailable(_) | Self::NotConfigured(_)
        )
    }

    /// Whether a read that failed with this error may be attempted again.
    #[must_use]
    pub fn is_retryable_read(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::RemoteUnavailable(_))
    }

    /// Stable label suitable for structured logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::NotConfigured(_) => "not_configured",
            Self::Auth(_) => "auth_failure",
            Self::RateLimited(_) => "rate_limited",
            Self::Validation(_) => "validation",
            Self::RemoteUnavailable(_) => "remote_unavailable",
            Self::SlotConflict(_) => "slot_conflict",
            Self::NotFound(_) => "not_found",
            Self::Duplicate(_) => "duplicate",
            Self::Internal(_) => "internal",
        }
    }

    /// Caller-facing message. Never exposes infrastructure detail.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::SlotConflict(_) => {
                "That time is no longer available. Please choose another time.".to_string()
            }
            Self::Validation(detail) => format!("Please check the details: {detail}"),
            Self::NotFound(_) => "We could not find that booking.".to_string(),
            _ => "We could not complete the booking right now. Please try again shortly."
                .to_string(),
        }
    }
}

/// Result type alias for Bookline operations
pub type Result<T> = std::result::Result<T, BooklineError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn remote_failures_are_classified() {
        assert!(BooklineError::Auth("401".into()).is_remote_failure());
        assert!(BooklineError::NotConfigured("ghl".into()).is_remote_failure());
        assert!(!BooklineError::SlotConflict("10:00".into()).is_remote_failure());
        assert!(!BooklineError::Validation("phone".into()).is_remote_failure());
    }

    #[test]
    fn only_transient_reads_are_retryable() {
        assert!(BooklineError::RateLimited("429".into()).is_retryable_read());
        assert!(BooklineError::RemoteUnavailable("timeout".into()).is_retryable_read());
        assert!(!BooklineError::Auth("403".into()).is_retryable_read());
    }

    #[test]
    fn user_message_hides_infrastructure_detail() {
        let err = BooklineError::Database("sqlite failure: disk I/O error".into());
        assert!(!err.user_message().contains("sqlite"));

        let conflict = BooklineError::SlotConflict("2025-07-01 10:00".into());
        assert!(conflict.user_message().contains("no longer available"));
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_string(&BooklineError::SlotConflict("x".into())).unwrap();
        assert_eq!(json, r#"{"type":"SlotConflict","message":"x"}"#);
    }
}
