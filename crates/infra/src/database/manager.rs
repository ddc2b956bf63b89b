//! Database connection manager backed by the shared SQLite pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bookline_common::storage::{HealthStatus, SqliteConnection, SqlitePool, SqlitePoolConfig};
use bookline_domain::{BooklineError, DatabaseConfig, Result};
use rusqlite::params;
use tracing::info;

use crate::errors::InfraError;

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Database manager that wraps a [`SqlitePool`].
pub struct DbManager {
    pool: Arc<SqlitePool>,
    path: PathBuf,
}

impl DbManager {
    /// Open (or create) the database at `db_path`.
    ///
    /// `encryption_key` is applied as `PRAGMA key` on every connection and
    /// requires the `sqlcipher` feature of `bookline-common`.
    ///
    /// # Errors
    /// Returns `BooklineError::Database` if the pool cannot be created.
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: u32, encryption_key: Option<&str>) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();

        let config = SqlitePoolConfig::default()
            .with_max_size(pool_size)
            .with_encryption_key(encryption_key.map(str::to_owned));

        let pool = SqlitePool::new(&path, config).map_err(|e| BooklineError::from(InfraError::from(e)))?;

        info!(
            db_path = %path.display(),
            max_connections = pool.config().max_size,
            "sqlite pool initialised"
        );

        Ok(Self { pool: Arc::new(pool), path })
    }

    /// Build from the application database settings.
    ///
    /// # Errors
    /// Returns `BooklineError::Database` if the pool cannot be created.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::new(&config.path, config.pool_size, config.encryption_key.as_deref())
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<SqlitePool> {
        &self.pool
    }

    /// Acquire a connection from the pool.
    ///
    /// # Errors
    /// Returns `BooklineError::Database` if the pool is exhausted.
    pub fn get_connection(&self) -> Result<SqliteConnection> {
        self.pool.get_connection().map_err(|e| InfraError::from(e).into())
    }

    /// Ensure the full schema exists on the current database. Safe to run
    /// on every start.
    ///
    /// # Errors
    /// Returns `BooklineError::Database` if the schema fails to apply.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        create_schema(&conn)?;
        info!(version = SCHEMA_VERSION, "database schema ready");
        Ok(())
    }

    /// Return the configured database path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire a connection and run a trivial query.
    ///
    /// # Errors
    /// Returns `BooklineError::Database` if the check query fails.
    pub fn health_check(&self) -> Result<()> {
        let status: HealthStatus = self.pool.health_check();
        if status.healthy {
            Ok(())
        } else {
            Err(BooklineError::Database(
                status.message.unwrap_or_else(|| "database health check failed".to_string()),
            ))
        }
    }
}

fn create_schema(conn: &SqliteConnection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL).map_err(map_sql_error)?;
    conn.inner()
        .execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, CAST(strftime('%s','now') AS INTEGER))",
            params![SCHEMA_VERSION],
        )
        .map_err(map_sql_error)?;
    Ok(())
}

fn map_sql_error(err: rusqlite::Error) -> BooklineError {
    BooklineError::from(InfraError::from(err))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn migrations_create_schema_version() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = DbManager::new(temp_dir.path().join("test.db"), 4, None).expect("manager created");
        manager.run_migrations().expect("migrations run");

        let conn = manager.get_connection().expect("connection acquired");
        let version: i32 =
            conn.query_row("SELECT version FROM schema_version", &[], |row| row.get(0)).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn migrations_are_idempotent() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = DbManager::new(temp_dir.path().join("test.db"), 2, None).expect("manager created");
        manager.run_migrations().expect("first run");
        manager.run_migrations().expect("second run");

        let conn = manager.get_connection().expect("connection acquired");
        let rows: i64 =
            conn.query_row("SELECT COUNT(*) FROM schema_version", &[], |row| row.get(0)).unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn health_check_succeeds_for_valid_database() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = DbManager::new(temp_dir.path().join("test.db"), 4, None).expect("manager created");
        manager.run_migrations().expect("migrations run");

        manager.health_check().expect("health check passed");
    }

    #[test]
    fn zero_pool_size_is_a_config_error() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let result = DbManager::new(temp_dir.path().join("test.db"), 0, None);
        assert!(matches!(result, Err(BooklineError::Config(_))));
    }

    #[cfg(not(feature = "sqlcipher"))]
    #[test]
    fn encryption_key_without_sqlcipher_is_rejected() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let result = DbManager::new(temp_dir.path().join("test.db"), 1, Some("secret"));
        assert!(result.is_err());
    }
}
