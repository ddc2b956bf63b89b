//! Pooled connection wrapper
//!
//! Wraps an r2d2 pooled rusqlite connection and maps driver errors into
//! [`StorageError`]. The connection returns to the pool when dropped.

use std::ops::{Deref, DerefMut};

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection as RusqliteConnection, Row, Statement as RusqliteStatement, ToSql};
use tracing::instrument;

use super::error::{StorageError, StorageResult};

/// Pooled SQLite connection
pub struct SqliteConnection {
    inner: PooledConnection<SqliteConnectionManager>,
}

impl SqliteConnection {
    #[must_use]
    pub fn new(conn: PooledConnection<SqliteConnectionManager>) -> Self {
        Self { inner: conn }
    }

    /// Borrow the underlying rusqlite connection
    #[must_use]
    pub fn inner(&self) -> &RusqliteConnection {
        &self.inner
    }

    /// Execute a statement and return the number of changed rows
    ///
    /// # Errors
    /// Returns `StorageError::Rusqlite` if the statement fails.
    #[instrument(skip(self, params), fields(sql = %sql))]
    pub fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> StorageResult<usize> {
        self.inner.execute(sql, params).map_err(StorageError::from)
    }

    /// Execute a SQL query that returns a single row
    ///
    /// # Errors
    /// Returns `StorageError::Rusqlite` if the query fails or returns no row.
    #[instrument(skip(self, params, f), fields(sql = %sql))]
    pub fn query_row<T, F>(&self, sql: &str, params: &[&dyn ToSql], f: F) -> StorageResult<T>
    where
        F: FnOnce(&Row<'_>) -> Result<T, rusqlite::Error>,
    {
        self.inner.query_row(sql, params, f).map_err(StorageError::from)
    }

    /// Like [`query_row`](Self::query_row) but maps "no rows" to `None`
    ///
    /// # Errors
    /// Returns `StorageError::Rusqlite` if the query fails.
    pub fn query_row_optional<T, F>(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        f: F,
    ) -> StorageResult<Option<T>>
    where
        F: FnOnce(&Row<'_>) -> Result<T, rusqlite::Error>,
    {
        match self.inner.query_row(sql, params, f) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StorageError::from(e)),
        }
    }

    /// Prepare a SQL statement
    ///
    /// # Errors
    /// Returns `StorageError::Rusqlite` if the SQL does not compile.
    #[instrument(skip(self), fields(sql = %sql))]
    pub fn prepare(&self, sql: &str) -> StorageResult<SqliteStatement<'_>> {
        let stmt = self.inner.prepare(sql).map_err(StorageError::from)?;
        Ok(SqliteStatement::new(stmt))
    }
}

impl Deref for SqliteConnection {
    type Target = RusqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for SqliteConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// Prepared statement wrapper
pub struct SqliteStatement<'conn> {
    inner: RusqliteStatement<'conn>,
}

impl<'conn> SqliteStatement<'conn> {
    #[must_use]
    pub fn new(stmt: RusqliteStatement<'conn>) -> Self {
        Self { inner: stmt }
    }

    /// Execute the statement with parameters
    ///
    /// # Errors
    /// Returns `StorageError::Rusqlite` if execution fails.
    pub fn execute(&mut self, params: &[&dyn ToSql]) -> StorageResult<usize> {
        self.inner.execute(params).map_err(StorageError::from)
    }

    /// Query with the statement and map results
    ///
    /// # Errors
    /// Returns `StorageError::Rusqlite` if the query or any row mapping fails.
    pub fn query_map<T, F>(&mut self, params: &[&dyn ToSql], mut f: F) -> StorageResult<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> Result<T, rusqlite::Error>,
    {
        let rows = self.inner.query_map(params, |row| f(row)).map_err(StorageError::from)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::storage::{SqlitePool, SqlitePoolConfig};

    fn pool(dir: &TempDir) -> SqlitePool {
        SqlitePool::new(&dir.path().join("test.db"), SqlitePoolConfig::default()).unwrap()
    }

    #[test]
    fn test_connection_execute_and_query() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool(&temp_dir);
        let conn = pool.get_connection().unwrap();

        conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", &[]).unwrap();
        let changed = conn.execute("INSERT INTO test (name) VALUES (?1)", &[&"Bob"]).unwrap();
        assert_eq!(changed, 1);

        let name: String =
            conn.query_row("SELECT name FROM test WHERE id = ?1", &[&1], |row| row.get(0)).unwrap();
        assert_eq!(name, "Bob");
    }

    #[test]
    fn test_query_row_optional_maps_missing_rows() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool(&temp_dir);
        let conn = pool.get_connection().unwrap();

        conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY)", &[]).unwrap();
        let found: Option<i64> = conn
            .query_row_optional("SELECT id FROM test WHERE id = ?1", &[&42], |row| row.get(0))
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_prepared_query_map() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool(&temp_dir);
        let conn = pool.get_connection().unwrap();

        conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", &[]).unwrap();
        let mut insert = conn.prepare("INSERT INTO test (name) VALUES (?1)").unwrap();
        insert.execute(&[&"Charlie"]).unwrap();
        insert.execute(&[&"Diana"]).unwrap();
        drop(insert);

        let mut select = conn.prepare("SELECT name FROM test ORDER BY id").unwrap();
        let names: Vec<String> = select.query_map(&[], |row| row.get(0)).unwrap();
        assert_eq!(names, vec!["Charlie".to_string(), "Diana".to_string()]);
    }
}
