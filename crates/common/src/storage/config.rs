//! SQLite connection pool configuration

use std::fmt;
use std::time::Duration;

/// Pool configuration
#[derive(Clone)]
pub struct SqlitePoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,

    /// How long a checkout waits for a free connection
    pub connection_timeout: Duration,

    /// Busy timeout for SQLite lock contention
    pub busy_timeout: Duration,

    /// Enable WAL journal mode
    pub enable_wal: bool,

    /// Enable foreign key constraints
    pub enable_foreign_keys: bool,

    /// SQLCipher key. Only honoured when built with the `sqlcipher` feature.
    pub encryption_key: Option<String>,
}

impl SqlitePoolConfig {
    #[must_use]
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn with_encryption_key(mut self, key: Option<String>) -> Self {
        self.encryption_key = key.filter(|k| !k.is_empty());
        self
    }
}

impl Default for SqlitePoolConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_millis(5000),
            enable_wal: true,
            enable_foreign_keys: true,
            encryption_key: None,
        }
    }
}

impl fmt::Debug for SqlitePoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlitePoolConfig")
            .field("max_size", &self.max_size)
            .field("connection_timeout", &self.connection_timeout)
            .field("busy_timeout", &self.busy_timeout)
            .field("enable_wal", &self.enable_wal)
            .field("enable_foreign_keys", &self.enable_foreign_keys)
            .field("encrypted", &self.encryption_key.is_some())
            .finish()
    }
}
