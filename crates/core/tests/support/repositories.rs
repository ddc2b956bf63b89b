//! In-memory repository mocks
//!
//! `MockAppointmentRepository` enforces the same uniqueness rules as the
//! SQLite store: one non-cancelled appointment per (tenant, date, time), one
//! row per confirmation code, one row per external id and backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bookline_core::{AppointmentRepository, CredentialStore, TenantRepository};
use bookline_domain::{
    Appointment, AppointmentId, AppointmentStatus, BackendCredential, BackendKind, BooklineError,
    DateRange, NewAppointment, Result as DomainResult, SyncedFields, Tenant, TenantId,
};
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Default)]
struct Store {
    rows: Vec<Appointment>,
    next_id: AppointmentId,
    writes: usize,
}

/// In-memory mock for `AppointmentRepository`.
#[derive(Default, Clone)]
pub struct MockAppointmentRepository {
    store: Arc<Mutex<Store>>,
}

impl MockAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Appointment> {
        self.store.lock().unwrap().rows.clone()
    }

    /// Number of inserts and updates applied so far.
    pub fn writes(&self) -> usize {
        self.store.lock().unwrap().writes
    }
}

fn slot_taken(rows: &[Appointment], tenant_id: &TenantId, date: NaiveDate, time: chrono::NaiveTime, skip: Option<AppointmentId>) -> bool {
    rows.iter().any(|row| {
        Some(row.id) != skip
            && &row.tenant_id == tenant_id
            && row.date == date
            && row.time == time
            && row.status != AppointmentStatus::Cancelled
    })
}

#[async_trait]
impl AppointmentRepository for MockAppointmentRepository {
    async fn active_on_date(&self, tenant_id: &TenantId, date: NaiveDate) -> DomainResult<Vec<Appointment>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|row| &row.tenant_id == tenant_id && row.date == date && row.status.is_active())
            .cloned()
            .collect())
    }

    async fn insert(&self, appointment: NewAppointment) -> DomainResult<Appointment> {
        let mut store = self.store.lock().unwrap();
        if appointment.status.is_active()
            && slot_taken(&store.rows, &appointment.tenant_id, appointment.date, appointment.time, None)
        {
            return Err(BooklineError::SlotConflict(format!("{} {}", appointment.date, appointment.time)));
        }
        if store.rows.iter().any(|row| row.confirmation_code == appointment.confirmation_code) {
            return Err(BooklineError::Duplicate("appointments.confirmation_code".to_string()));
        }
        for kind in BackendKind::ALL {
            if let Some(external_id) = appointment.external_ids.get(kind) {
                if store.rows.iter().any(|row| {
                    row.tenant_id == appointment.tenant_id && row.external_ids.get(kind) == Some(external_id)
                }) {
                    return Err(BooklineError::Duplicate(format!("appointments.{kind}_id")));
                }
            }
        }

        store.next_id += 1;
        store.writes += 1;
        let now = Utc::now();
        let row = Appointment {
            id: store.next_id,
            tenant_id: appointment.tenant_id,
            customer: appointment.customer,
            date: appointment.date,
            time: appointment.time,
            duration_minutes: appointment.duration_minutes,
            purpose: appointment.purpose,
            status: appointment.status,
            source: appointment.source,
            confirmation_code: appointment.confirmation_code,
            external_ids: appointment.external_ids,
            record_backend: appointment.record_backend,
            deposit_status: appointment.deposit_status,
            last_synced_at: appointment.last_synced_at,
            created_at: now,
            updated_at: now,
        };
        store.rows.push(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, tenant_id: &TenantId, id: AppointmentId) -> DomainResult<Option<Appointment>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .rows
            .iter()
            .find(|row| &row.tenant_id == tenant_id && row.id == id)
            .cloned())
    }

    async fn find_by_external_id(
        &self,
        tenant_id: &TenantId,
        kind: BackendKind,
        external_id: &str,
    ) -> DomainResult<Option<Appointment>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .rows
            .iter()
            .find(|row| &row.tenant_id == tenant_id && row.external_ids.get(kind) == Some(external_id))
            .cloned())
    }

    async fn apply_remote_changes(
        &self,
        tenant_id: &TenantId,
        id: AppointmentId,
        fields: &SyncedFields,
        synced_at: DateTime<Utc>,
    ) -> DomainResult<Appointment> {
        let mut store = self.store.lock().unwrap();
        if fields.status.is_active() && slot_taken(&store.rows, tenant_id, fields.date, fields.time, Some(id)) {
            return Err(BooklineError::SlotConflict(format!("{} {}", fields.date, fields.time)));
        }
        store.writes += 1;
        let row = store
            .rows
            .iter_mut()
            .find(|row| &row.tenant_id == tenant_id && row.id == id)
            .ok_or_else(|| BooklineError::NotFound(format!("appointment {id}")))?;
        row.date = fields.date;
        row.time = fields.time;
        row.duration_minutes = fields.duration_minutes;
        row.purpose = fields.purpose.clone();
        row.status = fields.status;
        row.last_synced_at = Some(synced_at);
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn record_external_id(
        &self,
        tenant_id: &TenantId,
        id: AppointmentId,
        kind: BackendKind,
        external_id: &str,
    ) -> DomainResult<()> {
        let mut store = self.store.lock().unwrap();
        let row = store
            .rows
            .iter_mut()
            .find(|row| &row.tenant_id == tenant_id && row.id == id)
            .ok_or_else(|| BooklineError::NotFound(format!("appointment {id}")))?;
        row.external_ids.set(kind, Some(external_id.to_string()));
        Ok(())
    }

    async fn cancel(&self, tenant_id: &TenantId, id: AppointmentId) -> DomainResult<Appointment> {
        let mut store = self.store.lock().unwrap();
        store.writes += 1;
        let row = store
            .rows
            .iter_mut()
            .find(|row| &row.tenant_id == tenant_id && row.id == id)
            .ok_or_else(|| BooklineError::NotFound(format!("appointment {id}")))?;
        row.status = AppointmentStatus::Cancelled;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn list_range(
        &self,
        tenant_id: &TenantId,
        range: DateRange,
        include_cancelled: bool,
    ) -> DomainResult<Vec<Appointment>> {
        let mut rows: Vec<Appointment> = self
            .store
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|row| &row.tenant_id == tenant_id && range.contains(row.date))
            .filter(|row| include_cancelled || row.status.is_active())
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.date, row.time));
        Ok(rows)
    }

    async fn last_synced_at(&self, tenant_id: &TenantId) -> DomainResult<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|row| &row.tenant_id == tenant_id)
            .filter_map(|row| row.last_synced_at)
            .max())
    }
}

/// In-memory mock for `TenantRepository`.
#[derive(Default, Clone)]
pub struct MockTenantRepository {
    tenants: Arc<Mutex<HashMap<TenantId, Tenant>>>,
}

impl MockTenantRepository {
    pub fn with_tenant(self, tenant: Tenant) -> Self {
        self.tenants.lock().unwrap().insert(tenant.id.clone(), tenant);
        self
    }
}

#[async_trait]
impl TenantRepository for MockTenantRepository {
    async fn get_tenant(&self, tenant_id: &TenantId) -> DomainResult<Option<Tenant>> {
        Ok(self.tenants.lock().unwrap().get(tenant_id).cloned())
    }
}

/// In-memory mock for `CredentialStore`.
#[derive(Default, Clone)]
pub struct MockCredentialStore {
    credentials: Arc<Mutex<Vec<BackendCredential>>>,
}

impl MockCredentialStore {
    pub fn with_credential(self, credential: BackendCredential) -> Self {
        self.credentials.lock().unwrap().push(credential);
        self
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn credentials_for(&self, tenant_id: &TenantId) -> DomainResult<Vec<BackendCredential>> {
        Ok(self
            .credentials
            .lock()
            .unwrap()
            .iter()
            .filter(|credential| &credential.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}
