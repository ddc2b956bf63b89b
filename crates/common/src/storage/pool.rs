//! SQLite connection pool
//!
//! r2d2-based pooling with pragmas applied as each connection is opened.

use std::path::Path;
use std::time::Instant;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, info, instrument, warn};

use super::config::SqlitePoolConfig;
use super::connection::SqliteConnection;
use super::error::{StorageError, StorageResult};
use super::pragmas::apply_connection_pragmas;

/// Pool health snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub healthy: bool,
    pub connections: usize,
    pub idle_connections: usize,
    pub max_connections: usize,
    pub message: Option<String>,
}

impl HealthStatus {
    #[must_use]
    pub fn healthy(connections: usize, idle_connections: usize, max_connections: usize) -> Self {
        Self { healthy: true, connections, idle_connections, max_connections, message: None }
    }

    #[must_use]
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            connections: 0,
            idle_connections: 0,
            max_connections: 0,
            message: Some(message.into()),
        }
    }
}

/// Pool of SQLite connections
#[derive(Debug, Clone)]
pub struct SqlitePool {
    pool: Pool<SqliteConnectionManager>,
    config: SqlitePoolConfig,
}

impl SqlitePool {
    /// Create a new pool and verify a first connection can be opened
    ///
    /// # Errors
    /// Returns an error if the file can't be opened, the key is wrong, or
    /// the pool can't be built.
    #[instrument(skip(config), fields(db_path = ?path, pool_size = config.max_size))]
    pub fn new(path: &Path, config: SqlitePoolConfig) -> StorageResult<Self> {
        info!("Creating SQLite connection pool");

        if config.max_size == 0 {
            return Err(StorageError::InvalidConfig("pool size must be at least 1".to_string()));
        }

        let init_config = config.clone();
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            apply_connection_pragmas(conn, &init_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        });

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| {
                warn!("Failed to create connection pool: {}", e);
                classify_open_error(&e.to_string())
            })?;

        debug!("SQLite pool created with {} connections", config.max_size);

        Ok(Self { pool, config })
    }

    /// Check out a connection
    ///
    /// # Errors
    /// Returns `StorageError::Timeout` when no connection frees up within the
    /// configured timeout, or `StorageError::R2d2` for other pool failures.
    #[instrument(skip(self), fields(pool_size = self.config.max_size))]
    pub fn get_connection(&self) -> StorageResult<SqliteConnection> {
        let start = Instant::now();

        match self.pool.get() {
            Ok(conn) => {
                debug!("Connection acquired in {}ms", start.elapsed().as_millis());
                Ok(SqliteConnection::new(conn))
            }
            Err(e) => {
                let err_str = e.to_string().to_lowercase();
                if err_str.contains("timed out") || err_str.contains("timeout") {
                    warn!("Connection timeout after {:?}", self.config.connection_timeout);
                    Err(StorageError::Timeout(self.config.connection_timeout.as_secs()))
                } else {
                    warn!("Connection error: {}", e);
                    Err(StorageError::Connection(format!("Failed to get connection: {}", e)))
                }
            }
        }
    }

    #[must_use]
    pub fn health_check(&self) -> HealthStatus {
        let state = self.pool.state();
        match self.pool.get() {
            Ok(conn) => match conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)) {
                Ok(_) => HealthStatus::healthy(
                    state.connections as usize,
                    state.idle_connections as usize,
                    self.config.max_size as usize,
                ),
                Err(e) => HealthStatus::unhealthy(format!("Probe query failed: {}", e)),
            },
            Err(e) => HealthStatus::unhealthy(format!("Pool unhealthy: {}", e)),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SqlitePoolConfig {
        &self.config
    }
}

fn classify_open_error(message: &str) -> StorageError {
    let lower = message.to_lowercase();
    if lower.contains("file is not a database")
        || lower.contains("file is encrypted")
        || lower.contains("wrong encryption key")
        || lower.contains("notadb")
    {
        StorageError::WrongKeyOrNotEncrypted
    } else {
        StorageError::Connection(format!("Failed to create pool: {}", message))
    }
}
