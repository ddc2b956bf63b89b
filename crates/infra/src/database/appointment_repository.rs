//! SQLite-backed implementation of the `AppointmentRepository` port.
//!
//! The partial unique index `idx_appointments_active_slot` is the only
//! exclusivity gate: two inserts racing for one slot are serialised by
//! SQLite and the loser surfaces as `SlotConflict`. Rows are never deleted;
//! cancellation flips the status and frees the slot for the index.

use std::sync::Arc;

use async_trait::async_trait;
use bookline_common::storage::{SqliteConnection, StorageError};
use bookline_core::AppointmentRepository;
use bookline_domain::{
    Appointment, AppointmentId, BackendKind, BooklineError, CustomerInfo, DateRange, ExternalIds,
    NewAppointment, Result as DomainResult, SyncedFields, TenantId,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Row};
use tokio::task;
use tracing::{debug, instrument};

use super::manager::DbManager;
use crate::errors::InfraError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

const APPOINTMENT_COLUMNS: &str = "id, tenant_id, customer_name, customer_phone, customer_email,
    appointment_date, appointment_time, duration_minutes, purpose, status, source,
    confirmation_code, ghl_id, hubspot_id, vagaro_id, zoho_id, google_id,
    deposit_status, last_synced_at, created_at, updated_at, record_backend";

/// Appointment store over the shared SQLite pool.
pub struct SqliteAppointmentRepository {
    db: Arc<DbManager>,
}

impl SqliteAppointmentRepository {
    #[must_use]
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AppointmentRepository for SqliteAppointmentRepository {
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn active_on_date(&self, tenant_id: &TenantId, date: NaiveDate) -> DomainResult<Vec<Appointment>> {
        let db = Arc::clone(&self.db);
        let tenant = tenant_id.to_string();
        task::spawn_blocking(move || -> DomainResult<Vec<Appointment>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments
                 WHERE tenant_id = ?1 AND appointment_date = ?2 AND status != 'cancelled'
                 ORDER BY appointment_time, id"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_storage_error)?;
            stmt.query_map(params![tenant, format_date(date)], map_appointment).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self, appointment), fields(tenant_id = %appointment.tenant_id, date = %appointment.date, time = %appointment.time))]
    async fn insert(&self, appointment: NewAppointment) -> DomainResult<Appointment> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<Appointment> {
            let conn = db.get_connection()?;
            let now = Utc::now().timestamp();
            let ids = &appointment.external_ids;

            conn.execute(
                "INSERT INTO appointments (
                    tenant_id, customer_name, customer_phone, customer_email,
                    appointment_date, appointment_time, duration_minutes, purpose, status, source,
                    confirmation_code, ghl_id, hubspot_id, vagaro_id, zoho_id, google_id,
                    deposit_status, last_synced_at, created_at, updated_at, record_backend
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?19, ?20)",
                params![
                    appointment.tenant_id.as_str(),
                    appointment.customer.name,
                    appointment.customer.phone,
                    appointment.customer.email,
                    format_date(appointment.date),
                    format_time(appointment.time),
                    appointment.duration_minutes,
                    appointment.purpose,
                    appointment.status.as_str(),
                    appointment.source.as_str(),
                    appointment.confirmation_code,
                    ids.ghl,
                    ids.hubspot,
                    ids.vagaro,
                    ids.zoho,
                    ids.google,
                    appointment.deposit_status.as_str(),
                    appointment.last_synced_at.map(|at| at.timestamp()),
                    now,
                    appointment.record_backend.map(|kind| kind.as_str()),
                ],
            )
            .map_err(map_storage_error)?;

            let id = conn.last_insert_rowid();
            debug!(appointment_id = id, "appointment inserted");
            fetch_by_id(&conn, appointment.tenant_id.as_str(), id)?
                .ok_or_else(|| BooklineError::Internal(format!("appointment {id} vanished after insert")))
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn find_by_id(&self, tenant_id: &TenantId, id: AppointmentId) -> DomainResult<Option<Appointment>> {
        let db = Arc::clone(&self.db);
        let tenant = tenant_id.to_string();
        task::spawn_blocking(move || -> DomainResult<Option<Appointment>> {
            let conn = db.get_connection()?;
            fetch_by_id(&conn, &tenant, id)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, backend = %kind))]
    async fn find_by_external_id(
        &self,
        tenant_id: &TenantId,
        kind: BackendKind,
        external_id: &str,
    ) -> DomainResult<Option<Appointment>> {
        let db = Arc::clone(&self.db);
        let tenant = tenant_id.to_string();
        let external_id = external_id.to_string();
        task::spawn_blocking(move || -> DomainResult<Option<Appointment>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE tenant_id = ?1 AND {} = ?2",
                external_id_column(kind)
            );
            conn.query_row_optional(&sql, params![tenant, external_id], map_appointment)
                .map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self, changes), fields(tenant_id = %tenant_id))]
    async fn apply_remote_changes(
        &self,
        tenant_id: &TenantId,
        id: AppointmentId,
        changes: &SyncedFields,
        synced_at: DateTime<Utc>,
    ) -> DomainResult<Appointment> {
        let db = Arc::clone(&self.db);
        let tenant = tenant_id.to_string();
        let fields = changes.clone();
        task::spawn_blocking(move || -> DomainResult<Appointment> {
            let conn = db.get_connection()?;
            let changed = conn
                .execute(
                    "UPDATE appointments
                     SET appointment_date = ?3, appointment_time = ?4, duration_minutes = ?5,
                         purpose = ?6, status = ?7, last_synced_at = ?8, updated_at = ?9
                     WHERE tenant_id = ?1 AND id = ?2",
                    params![
                        tenant,
                        id,
                        format_date(fields.date),
                        format_time(fields.time),
                        fields.duration_minutes,
                        fields.purpose,
                        fields.status.as_str(),
                        synced_at.timestamp(),
                        Utc::now().timestamp(),
                    ],
                )
                .map_err(map_storage_error)?;
            if changed == 0 {
                return Err(BooklineError::NotFound(format!("appointment {id}")));
            }
            fetch_by_id(&conn, &tenant, id)?
                .ok_or_else(|| BooklineError::NotFound(format!("appointment {id}")))
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, backend = %kind))]
    async fn record_external_id(
        &self,
        tenant_id: &TenantId,
        id: AppointmentId,
        kind: BackendKind,
        external_id: &str,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let tenant = tenant_id.to_string();
        let external_id = external_id.to_string();
        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let sql = format!(
                "UPDATE appointments SET {} = ?3, updated_at = ?4 WHERE tenant_id = ?1 AND id = ?2",
                external_id_column(kind)
            );
            let changed = conn
                .execute(&sql, params![tenant, id, external_id, Utc::now().timestamp()])
                .map_err(map_storage_error)?;
            if changed == 0 {
                return Err(BooklineError::NotFound(format!("appointment {id}")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn cancel(&self, tenant_id: &TenantId, id: AppointmentId) -> DomainResult<Appointment> {
        let db = Arc::clone(&self.db);
        let tenant = tenant_id.to_string();
        task::spawn_blocking(move || -> DomainResult<Appointment> {
            let conn = db.get_connection()?;
            let changed = conn
                .execute(
                    "UPDATE appointments SET status = 'cancelled', updated_at = ?3
                     WHERE tenant_id = ?1 AND id = ?2",
                    params![tenant, id, Utc::now().timestamp()],
                )
                .map_err(map_storage_error)?;
            if changed == 0 {
                return Err(BooklineError::NotFound(format!("appointment {id}")));
            }
            fetch_by_id(&conn, &tenant, id)?
                .ok_or_else(|| BooklineError::NotFound(format!("appointment {id}")))
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn list_range(
        &self,
        tenant_id: &TenantId,
        range: DateRange,
        include_cancelled: bool,
    ) -> DomainResult<Vec<Appointment>> {
        let db = Arc::clone(&self.db);
        let tenant = tenant_id.to_string();
        task::spawn_blocking(move || -> DomainResult<Vec<Appointment>> {
            let conn = db.get_connection()?;
            let status_filter = if include_cancelled { "" } else { "AND status != 'cancelled'" };
            let sql = format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments
                 WHERE tenant_id = ?1 AND appointment_date BETWEEN ?2 AND ?3 {status_filter}
                 ORDER BY appointment_date, appointment_time, id"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_storage_error)?;
            stmt.query_map(params![tenant, format_date(range.start), format_date(range.end)], map_appointment)
                .map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn last_synced_at(&self, tenant_id: &TenantId) -> DomainResult<Option<DateTime<Utc>>> {
        let db = Arc::clone(&self.db);
        let tenant = tenant_id.to_string();
        task::spawn_blocking(move || -> DomainResult<Option<DateTime<Utc>>> {
            let conn = db.get_connection()?;
            let latest: Option<i64> = conn
                .query_row(
                    "SELECT MAX(last_synced_at) FROM appointments WHERE tenant_id = ?1",
                    params![tenant],
                    |row| row.get(0),
                )
                .map_err(map_storage_error)?;
            Ok(latest.and_then(|secs| DateTime::from_timestamp(secs, 0)))
        })
        .await
        .map_err(map_join_error)?
    }
}

fn fetch_by_id(conn: &SqliteConnection, tenant: &str, id: AppointmentId) -> DomainResult<Option<Appointment>> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE tenant_id = ?1 AND id = ?2");
    conn.query_row_optional(&sql, params![tenant, id], map_appointment).map_err(map_storage_error)
}

fn external_id_column(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Ghl => "ghl_id",
        BackendKind::HubSpot => "hubspot_id",
        BackendKind::Vagaro => "vagaro_id",
        BackendKind::Zoho => "zoho_id",
        BackendKind::Google => "google_id",
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn map_appointment(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: row.get(0)?,
        tenant_id: TenantId(row.get(1)?),
        customer: CustomerInfo { name: row.get(2)?, phone: row.get(3)?, email: row.get(4)? },
        date: parse_column(row, 5, |raw| NaiveDate::parse_from_str(raw, DATE_FORMAT))?,
        time: parse_column(row, 6, |raw| NaiveTime::parse_from_str(raw, TIME_FORMAT))?,
        duration_minutes: row.get(7)?,
        purpose: row.get(8)?,
        status: parse_column(row, 9, str::parse)?,
        source: parse_column(row, 10, str::parse)?,
        confirmation_code: row.get(11)?,
        external_ids: ExternalIds {
            ghl: row.get(12)?,
            hubspot: row.get(13)?,
            vagaro: row.get(14)?,
            zoho: row.get(15)?,
            google: row.get(16)?,
        },
        deposit_status: parse_column(row, 17, str::parse)?,
        last_synced_at: row.get::<_, Option<i64>>(18)?.map(|secs| timestamp(18, secs)).transpose()?,
        created_at: timestamp(19, row.get(19)?)?,
        updated_at: timestamp(20, row.get(20)?)?,
        record_backend: row
            .get::<_, Option<String>>(21)?
            .map(|raw| {
                raw.parse::<BackendKind>()
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(21, Type::Text, Box::new(e)))
            })
            .transpose()?,
    })
}

/// Read a TEXT column and parse it, reporting parse failures as conversion
/// errors on that column.
fn parse_column<T, E, F>(row: &Row<'_>, index: usize, parse: F) -> rusqlite::Result<T>
where
    F: FnOnce(&str) -> std::result::Result<T, E>,
    E: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(index)?;
    parse(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn timestamp(index: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(index, secs))
}

fn map_storage_error(err: StorageError) -> BooklineError {
    InfraError::from(err).into()
}

fn map_join_error(err: task::JoinError) -> BooklineError {
    if err.is_cancelled() {
        BooklineError::Internal("blocking appointment repository task cancelled".into())
    } else {
        BooklineError::Internal(format!("blocking appointment repository task failed: {err}"))
    }
}
