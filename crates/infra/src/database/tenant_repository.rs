//! SQLite-backed tenant settings and backend credentials.
//!
//! Implements both the `TenantRepository` and `CredentialStore` ports.
//! Business hours, shadow kinds, and secret bundles are stored as JSON text.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bookline_common::storage::StorageError;
use bookline_core::{CredentialStore, TenantRepository};
use bookline_domain::{
    BackendCredential, BackendKind, BooklineError, BusinessHours, DepositPolicy, Result as DomainResult,
    SystemOfRecord, Tenant, TenantId,
};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Row};
use tokio::task;
use tracing::{debug, info, instrument};

use super::manager::DbManager;
use crate::errors::InfraError;

/// Tenant and credential store over the shared SQLite pool.
pub struct SqliteTenantRepository {
    db: Arc<DbManager>,
}

impl SqliteTenantRepository {
    #[must_use]
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert or replace a tenant's settings. Existing credentials and
    /// appointments are kept.
    ///
    /// # Errors
    /// Returns `BooklineError::Database` if the write fails.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id))]
    pub async fn upsert_tenant(&self, tenant: &Tenant) -> DomainResult<()> {
        tenant.hours.validate()?;
        let hours = serde_json::to_string(&tenant.hours).map_err(InfraError::from)?;
        let shadows = serde_json::to_string(&tenant.shadow_backends).map_err(InfraError::from)?;
        let tenant = tenant.clone();

        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let now = Utc::now().timestamp();
            conn.execute(
                "INSERT INTO tenants (
                    id, business_name, timezone, business_hours, slot_minutes, booking_system,
                    shadow_backends, deposit_required, deposit_amount_cents, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                ON CONFLICT(id) DO UPDATE SET
                    business_name = excluded.business_name,
                    timezone = excluded.timezone,
                    business_hours = excluded.business_hours,
                    slot_minutes = excluded.slot_minutes,
                    booking_system = excluded.booking_system,
                    shadow_backends = excluded.shadow_backends,
                    deposit_required = excluded.deposit_required,
                    deposit_amount_cents = excluded.deposit_amount_cents,
                    updated_at = excluded.updated_at",
                params![
                    tenant.id.as_str(),
                    tenant.business_name,
                    tenant.timezone,
                    hours,
                    tenant.slot_minutes,
                    tenant.booking_system.map(|system| system.as_str()),
                    shadows,
                    tenant.deposit.required,
                    tenant.deposit.amount_cents,
                    now,
                ],
            )
            .map_err(map_storage_error)?;
            info!("tenant saved");
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    /// Store (or replace) the credential for one backend of a tenant.
    ///
    /// # Errors
    /// Returns `BooklineError::Database` if the tenant does not exist or the
    /// write fails.
    #[instrument(skip(self, credential), fields(tenant_id = %credential.tenant_id, backend = %credential.kind))]
    pub async fn save_credential(&self, credential: &BackendCredential) -> DomainResult<()> {
        let secrets = serde_json::to_string(&credential.secrets).map_err(InfraError::from)?;
        let credential = credential.clone();

        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO backend_credentials (tenant_id, kind, secrets, calendar_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(tenant_id, kind) DO UPDATE SET
                    secrets = excluded.secrets,
                    calendar_id = excluded.calendar_id,
                    updated_at = excluded.updated_at",
                params![
                    credential.tenant_id.as_str(),
                    credential.kind.as_str(),
                    secrets,
                    credential.calendar_id,
                    Utc::now().timestamp(),
                ],
            )
            .map_err(map_storage_error)?;
            debug!("credential saved");
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl TenantRepository for SqliteTenantRepository {
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn get_tenant(&self, tenant_id: &TenantId) -> DomainResult<Option<Tenant>> {
        let db = Arc::clone(&self.db);
        let tenant = tenant_id.to_string();
        task::spawn_blocking(move || -> DomainResult<Option<Tenant>> {
            let conn = db.get_connection()?;
            conn.query_row_optional(
                "SELECT id, business_name, timezone, business_hours, slot_minutes, booking_system,
                        shadow_backends, deposit_required, deposit_amount_cents
                 FROM tenants WHERE id = ?1",
                params![tenant],
                map_tenant,
            )
            .map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl CredentialStore for SqliteTenantRepository {
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn credentials_for(&self, tenant_id: &TenantId) -> DomainResult<Vec<BackendCredential>> {
        let db = Arc::clone(&self.db);
        let tenant = tenant_id.to_string();
        task::spawn_blocking(move || -> DomainResult<Vec<BackendCredential>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT tenant_id, kind, secrets, calendar_id FROM backend_credentials
                     WHERE tenant_id = ?1 ORDER BY kind",
                )
                .map_err(map_storage_error)?;
            stmt.query_map(params![tenant], map_credential).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_tenant(row: &Row<'_>) -> rusqlite::Result<Tenant> {
    let hours: BusinessHours = json_column(row, 3)?;
    let shadow_backends: Vec<BackendKind> = json_column(row, 6)?;
    let booking_system = row
        .get::<_, Option<String>>(5)?
        .map(|raw| raw.parse::<SystemOfRecord>())
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(Tenant {
        id: TenantId(row.get(0)?),
        business_name: row.get(1)?,
        timezone: row.get(2)?,
        hours,
        slot_minutes: row.get(4)?,
        booking_system,
        shadow_backends,
        deposit: DepositPolicy { required: row.get(7)?, amount_cents: row.get(8)? },
    })
}

fn map_credential(row: &Row<'_>) -> rusqlite::Result<BackendCredential> {
    let kind = row
        .get::<_, String>(1)?
        .parse::<BackendKind>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    let secrets: BTreeMap<String, String> = json_column(row, 2)?;

    Ok(BackendCredential { tenant_id: TenantId(row.get(0)?), kind, secrets, calendar_id: row.get(3)? })
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, index: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(index)?;
    serde_json::from_str(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn map_storage_error(err: StorageError) -> BooklineError {
    InfraError::from(err).into()
}

fn map_join_error(err: task::JoinError) -> BooklineError {
    if err.is_cancelled() {
        BooklineError::Internal("blocking tenant repository task cancelled".into())
    } else {
        BooklineError::Internal(format!("blocking tenant repository task failed: {err}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::{NaiveTime, Weekday};
    use tempfile::TempDir;

    use super::*;

    fn setup() -> (TempDir, SqliteTenantRepository) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(DbManager::new(dir.path().join("tenants.db"), 2, None).unwrap());
        db.run_migrations().unwrap();
        (dir, SqliteTenantRepository::new(db))
    }

    fn credential(kind: BackendKind) -> BackendCredential {
        let mut secrets = BTreeMap::new();
        secrets.insert("api_key".to_string(), "k-1".to_string());
        BackendCredential { tenant_id: TenantId::from("acme"), kind, secrets, calendar_id: Some("cal".into()) }
    }

    #[tokio::test]
    async fn tenant_round_trips_with_json_columns() {
        let (_dir, repo) = setup();
        let mut tenant = Tenant::new("acme", "Acme Dental", "Europe/London");
        tenant.hours = BusinessHours::uniform(
            NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            &[Weekday::Tue, Weekday::Thu],
        );
        tenant.slot_minutes = 15;
        tenant.booking_system = Some(SystemOfRecord::Remote(BackendKind::Vagaro));
        tenant.shadow_backends = vec![BackendKind::Google];
        tenant.deposit = DepositPolicy { required: true, amount_cents: Some(2500) };

        repo.upsert_tenant(&tenant).await.unwrap();
        let loaded = repo.get_tenant(&tenant.id).await.unwrap().unwrap();
        assert_eq!(loaded, tenant);
    }

    #[tokio::test]
    async fn upsert_replaces_settings() {
        let (_dir, repo) = setup();
        let mut tenant = Tenant::new("acme", "Acme Dental", "America/New_York");
        repo.upsert_tenant(&tenant).await.unwrap();

        tenant.business_name = "Acme Dental & Ortho".into();
        tenant.booking_system = None;
        repo.upsert_tenant(&tenant).await.unwrap();

        let loaded = repo.get_tenant(&tenant.id).await.unwrap().unwrap();
        assert_eq!(loaded.business_name, "Acme Dental & Ortho");
        assert_eq!(loaded.booking_system, None);
    }

    #[tokio::test]
    async fn unknown_tenant_is_none() {
        let (_dir, repo) = setup();
        assert!(repo.get_tenant(&TenantId::from("nobody")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_hours_are_rejected_before_writing() {
        let (_dir, repo) = setup();
        let mut tenant = Tenant::new("acme", "Acme", "America/New_York");
        tenant.hours = BusinessHours::uniform(
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            &[Weekday::Mon],
        );
        assert!(matches!(repo.upsert_tenant(&tenant).await, Err(BooklineError::Config(_))));
    }

    #[tokio::test]
    async fn credentials_are_stored_per_kind() {
        let (_dir, repo) = setup();
        repo.upsert_tenant(&Tenant::new("acme", "Acme", "America/New_York")).await.unwrap();
        repo.save_credential(&credential(BackendKind::Ghl)).await.unwrap();
        repo.save_credential(&credential(BackendKind::Google)).await.unwrap();

        let mut replacement = credential(BackendKind::Ghl);
        replacement.calendar_id = Some("cal-2".into());
        repo.save_credential(&replacement).await.unwrap();

        let stored = repo.credentials_for(&TenantId::from("acme")).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0], replacement);
        assert_eq!(stored[1].kind, BackendKind::Google);

    }

    #[tokio::test]
    async fn credential_for_unknown_tenant_violates_foreign_key() {
        let (_dir, repo) = setup();
        let result = repo.save_credential(&credential(BackendKind::Zoho)).await;
        assert!(matches!(result, Err(BooklineError::Database(_))));
    }
}
