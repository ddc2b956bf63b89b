//! Modular common utilities shared across Bookline crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `runtime`: async resilience helpers (retry with backoff)
//! - `platform`: pooled SQLite storage
//! - `sqlcipher`: encrypted storage on top of `platform`

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod storage;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use resilience::{
    Backoff, Jitter, RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryPolicy, RetryResult,
};
#[cfg(feature = "platform")]
pub use storage::{
    HealthStatus, SqliteConnection, SqlitePool, SqlitePoolConfig, StorageError, StorageResult,
};
