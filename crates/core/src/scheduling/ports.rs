//! Port interfaces for scheduling
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use std::sync::Arc;

use async_trait::async_trait;
use bookline_domain::{
    Appointment, AppointmentDraft, AppointmentId, BackendCredential, BackendKind, BookingConfig,
    BusyInterval, CustomerInfo, DateRange, NewAppointment, RemoteAppointment, RemoteCustomer,
    Result, SyncedFields, Tenant, TenantId,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Uniform contract implemented by every remote calendar adapter.
///
/// An instance is bound to one tenant: it owns that tenant's credential and
/// timezone and performs all conversion between the tenant's wall-clock time
/// and the backend's native timestamps. Capabilities a backend does not offer
/// return [`BooklineError::NotConfigured`](bookline_domain::BooklineError).
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Free start times on `date`, in tenant local time.
    async fn list_available_slots(&self, date: NaiveDate) -> Result<Vec<NaiveTime>>;

    /// Busy windows overlapping `date`, in tenant local time.
    async fn list_busy_intervals(&self, date: NaiveDate) -> Result<Vec<BusyInterval>>;

    async fn find_or_create_customer(&self, customer: &CustomerInfo) -> Result<RemoteCustomer>;

    /// Create the appointment remotely and return its external id.
    async fn create_appointment(
        &self,
        customer: &RemoteCustomer,
        draft: &AppointmentDraft,
    ) -> Result<String>;

    /// Appointments whose start falls within `range`, translated into the
    /// canonical model.
    async fn list_appointments(&self, range: DateRange) -> Result<Vec<RemoteAppointment>>;

    async fn cancel_appointment(&self, external_id: &str) -> Result<()>;

    /// Whether customer records on this backend must carry an email address.
    fn requires_customer_email(&self) -> bool {
        false
    }

    /// Whether this backend accepts mirrored events when used as a shadow.
    fn supports_event_creation(&self) -> bool {
        true
    }
}

/// Builds tenant-bound backend adapters from a resolved configuration.
pub trait BackendFactory: Send + Sync {
    /// Fails with `NotConfigured` when the tenant has no credential for `kind`.
    fn backend(&self, config: &BookingConfig, kind: BackendKind) -> Result<Arc<dyn CalendarBackend>>;
}

/// Durable local appointment store.
///
/// `insert` is the exclusivity gate: it fails with `SlotConflict` when a
/// non-cancelled appointment already occupies the tenant's (date, time), and
/// with `Duplicate` when the confirmation code is taken.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Non-cancelled appointments on `date`.
    async fn active_on_date(&self, tenant_id: &TenantId, date: NaiveDate) -> Result<Vec<Appointment>>;

    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment>;

    async fn find_by_id(&self, tenant_id: &TenantId, id: AppointmentId) -> Result<Option<Appointment>>;

    async fn find_by_external_id(
        &self,
        tenant_id: &TenantId,
        kind: BackendKind,
        external_id: &str,
    ) -> Result<Option<Appointment>>;

    /// Overwrite reconciled fields and stamp `last_synced_at`.
    async fn apply_remote_changes(
        &self,
        tenant_id: &TenantId,
        id: AppointmentId,
        fields: &SyncedFields,
        synced_at: DateTime<Utc>,
    ) -> Result<Appointment>;

    async fn record_external_id(
        &self,
        tenant_id: &TenantId,
        id: AppointmentId,
        kind: BackendKind,
        external_id: &str,
    ) -> Result<()>;

    /// Transition to `cancelled`. Rows are never deleted.
    async fn cancel(&self, tenant_id: &TenantId, id: AppointmentId) -> Result<Appointment>;

    /// Appointments in `range`, ordered by date then time.
    async fn list_range(
        &self,
        tenant_id: &TenantId,
        range: DateRange,
        include_cancelled: bool,
    ) -> Result<Vec<Appointment>>;

    async fn last_synced_at(&self, tenant_id: &TenantId) -> Result<Option<DateTime<Utc>>>;
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn get_tenant(&self, tenant_id: &TenantId) -> Result<Option<Tenant>>;
}

/// Read access to the opaque credentials stored for a tenant.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn credentials_for(&self, tenant_id: &TenantId) -> Result<Vec<BackendCredential>>;
}
