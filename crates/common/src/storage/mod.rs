//! Storage primitives for pooled SQLite databases
//!
//! This module provides an r2d2 connection pool over SQLite with per-connection
//! pragmas applied on checkout, optional SQLCipher keying, and a thin
//! connection wrapper that maps driver errors into [`StorageError`].

pub mod config;
pub mod connection;
pub mod error;
pub mod pool;
pub mod pragmas;

// Re-export commonly used types
pub use config::SqlitePoolConfig;
pub use connection::{SqliteConnection, SqliteStatement};
pub use error::{StorageError, StorageResult};
pub use pool::{HealthStatus, SqlitePool};
pub use pragmas::apply_connection_pragmas;
