//! Conversions from external infrastructure errors into domain errors.

use bookline_common::storage::StorageError;
use bookline_domain::{BackendKind, BooklineError};
use reqwest::{Error as HttpError, StatusCode};
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub BooklineError);

impl From<InfraError> for BooklineError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<BooklineError> for InfraError {
    fn from(value: BooklineError) -> Self {
        InfraError(value)
    }
}

trait IntoBooklineError {
    fn into_bookline(self) -> BooklineError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → BooklineError */
/* -------------------------------------------------------------------------- */

/// SQLITE_CONSTRAINT_UNIQUE and SQLITE_CONSTRAINT_PRIMARYKEY.
const UNIQUE_VIOLATION_CODES: [i32; 2] = [2067, 1555];

impl IntoBooklineError for SqlError {
    fn into_bookline(self) -> BooklineError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => BooklineError::Database("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => {
                        BooklineError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, code) if UNIQUE_VIOLATION_CODES.contains(&code) => {
                        unique_violation(&message)
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        BooklineError::Database("foreign key constraint violation".into())
                    }
                    (ErrorCode::NotADatabase, _) => BooklineError::Database(
                        "database key rejected or file is not a database".into(),
                    ),
                    _ => BooklineError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => BooklineError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                BooklineError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, name, ty) => {
                BooklineError::Database(format!("invalid column type for {name}: {ty}"))
            }
            other => BooklineError::Database(other.to_string()),
        }
    }
}

/// The active-slot index covers the appointment date and time columns, so a
/// violation naming them is a slot conflict. Anything else (confirmation
/// code, external ids) is a plain duplicate carrying the column list.
fn unique_violation(message: &str) -> BooklineError {
    if message.contains("appointment_date") || message.contains("idx_appointments_active_slot") {
        BooklineError::SlotConflict("slot already taken".into())
    } else {
        BooklineError::Duplicate(message.to_string())
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_bookline())
    }
}

/* -------------------------------------------------------------------------- */
/* StorageError → BooklineError */
/* -------------------------------------------------------------------------- */

impl IntoBooklineError for StorageError {
    fn into_bookline(self) -> BooklineError {
        match self {
            StorageError::Rusqlite(err) => err.into_bookline(),
            StorageError::WrongKeyOrNotEncrypted => {
                BooklineError::Database("database key rejected or database not encrypted".into())
            }
            StorageError::Timeout(seconds) => {
                BooklineError::Database(format!("database timeout after {seconds}s"))
            }
            StorageError::InvalidConfig(message) => BooklineError::Config(message),
            other => BooklineError::Database(other.to_string()),
        }
    }
}

impl From<StorageError> for InfraError {
    fn from(value: StorageError) -> Self {
        InfraError(value.into_bookline())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → BooklineError */
/* -------------------------------------------------------------------------- */

impl IntoBooklineError for HttpError {
    fn into_bookline(self) -> BooklineError {
        if self.is_timeout() {
            return BooklineError::RemoteUnavailable("HTTP request timed out".into());
        }

        if self.is_connect() {
            return BooklineError::RemoteUnavailable("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            return classify_status(status, String::new());
        }

        if self.is_decode() {
            return BooklineError::RemoteUnavailable(format!("unexpected response body: {self}"));
        }

        BooklineError::RemoteUnavailable(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_bookline())
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(BooklineError::Internal(format!("JSON encoding failed: {value}")))
    }
}

/// Error for a non-success HTTP response from `kind`. `body` is truncated
/// into the message for diagnostics.
#[must_use]
pub fn status_error(kind: BackendKind, status: StatusCode, body: &str) -> BooklineError {
    let snippet: String = body.chars().take(200).collect();
    let detail = if snippet.is_empty() {
        kind.display_name().to_string()
    } else {
        format!("{}: {}", kind.display_name(), snippet)
    };
    classify_status(status, detail)
}

fn classify_status(status: StatusCode, detail: String) -> BooklineError {
    let code = status.as_u16();
    let mut message = format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));
    if !detail.is_empty() {
        message = format!("{message} ({detail})");
    }

    match code {
        401 | 403 => BooklineError::Auth(message),
        404 => BooklineError::NotFound(message),
        429 => BooklineError::RateLimited(message),
        400..=499 => BooklineError::Validation(message),
        _ => BooklineError::RemoteUnavailable(message),
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
