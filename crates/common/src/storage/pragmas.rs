//! SQLite pragma management
//!
//! Applies per-connection pragmas when the pool opens a connection.

use rusqlite::Connection;

use super::config::SqlitePoolConfig;
use super::error::{StorageError, StorageResult};

/// Apply connection-level pragmas
///
/// Keying (when configured) must come first; every other statement would
/// fail against an encrypted file otherwise.
///
/// # Errors
/// Returns `StorageError::WrongKeyOrNotEncrypted` if the key does not open
/// the database, or the driver error if a pragma is rejected.
pub fn apply_connection_pragmas(conn: &Connection, config: &SqlitePoolConfig) -> StorageResult<()> {
    if let Some(key) = config.encryption_key.as_deref() {
        apply_key(conn, key)?;
    }

    let mut pragma_sql = String::new();

    if config.enable_wal {
        pragma_sql.push_str("PRAGMA journal_mode=WAL;\n");
        pragma_sql.push_str("PRAGMA wal_autocheckpoint=1000;\n");
    }

    pragma_sql.push_str("PRAGMA synchronous=NORMAL;\n");

    if config.enable_foreign_keys {
        pragma_sql.push_str("PRAGMA foreign_keys=ON;\n");
    }

    conn.execute_batch(&pragma_sql)
        .map_err(|e| StorageError::Query(format!("Failed to apply pragmas: {}", e)))?;

    conn.busy_timeout(config.busy_timeout)
        .map_err(|e| StorageError::Query(format!("Failed to set busy timeout: {}", e)))?;

    Ok(())
}

#[cfg(feature = "sqlcipher")]
fn apply_key(conn: &Connection, key: &str) -> StorageResult<()> {
    conn.pragma_update(None, "key", key)
        .map_err(|e| StorageError::Encryption(format!("Failed to apply key: {}", e)))?;
    // Touch the schema so a wrong key fails here rather than on first query.
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
        .map_err(|_| StorageError::WrongKeyOrNotEncrypted)?;
    Ok(())
}

#[cfg(not(feature = "sqlcipher"))]
fn apply_key(_conn: &Connection, _key: &str) -> StorageResult<()> {
    Err(StorageError::Encryption(
        "an encryption key was configured but this build has no SQLCipher support".to_string(),
    ))
}
