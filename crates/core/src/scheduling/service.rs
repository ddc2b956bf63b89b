//! Tenant-facing scheduling operations
//!
//! Every call resolves the tenant's booking configuration first and then
//! delegates to the matching service. Nothing is cached between calls.

use std::sync::Arc;

use bookline_domain::{
    Appointment, AppointmentId, AvailabilityReport, BookingConfig, BookingConfirmation,
    BookingRequest, DashboardQuery, DashboardView, DateRange, Result, Slot, SyncReport, TenantId,
};
use chrono::{NaiveDate, NaiveTime};
use tracing::instrument;

use super::availability::AvailabilityAggregator;
use super::booking::BookingOrchestrator;
use super::codes::{CodeGenerator, RandomCodeGenerator};
use super::config_resolver::ConfigResolver;
use super::dashboard::DashboardService;
use super::ports::{AppointmentRepository, BackendFactory, CredentialStore, TenantRepository};
use super::remote::RemoteCallPolicy;
use super::sync::ReconciliationSync;

/// Collaborators the services are assembled from.
struct Parts {
    tenants: Arc<dyn TenantRepository>,
    credentials: Arc<dyn CredentialStore>,
    appointments: Arc<dyn AppointmentRepository>,
    backends: Arc<dyn BackendFactory>,
    policy: RemoteCallPolicy,
    codes: Arc<dyn CodeGenerator>,
}

/// Entry point used by booking front-ends and the sync trigger.
pub struct SchedulingService {
    parts: Parts,
    resolver: ConfigResolver,
    availability: AvailabilityAggregator,
    booking: BookingOrchestrator,
    sync: Arc<ReconciliationSync>,
    dashboard: DashboardService,
}

impl SchedulingService {
    #[must_use]
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        credentials: Arc<dyn CredentialStore>,
        appointments: Arc<dyn AppointmentRepository>,
        backends: Arc<dyn BackendFactory>,
    ) -> Self {
        Self::assemble(Parts {
            tenants,
            credentials,
            appointments,
            backends,
            policy: RemoteCallPolicy::default(),
            codes: Arc::new(RandomCodeGenerator),
        })
    }

    #[must_use]
    pub fn with_policy(self, policy: RemoteCallPolicy) -> Self {
        Self::assemble(Parts { policy, ..self.parts })
    }

    #[must_use]
    pub fn with_code_generator(self, codes: Arc<dyn CodeGenerator>) -> Self {
        Self::assemble(Parts { codes, ..self.parts })
    }

    fn assemble(parts: Parts) -> Self {
        let sync = Arc::new(
            ReconciliationSync::new(Arc::clone(&parts.appointments), Arc::clone(&parts.backends))
                .with_policy(parts.policy.clone())
                .with_code_generator(Arc::clone(&parts.codes)),
        );
        Self {
            resolver: ConfigResolver::new(Arc::clone(&parts.tenants), Arc::clone(&parts.credentials)),
            availability: AvailabilityAggregator::new(
                Arc::clone(&parts.appointments),
                Arc::clone(&parts.backends),
            )
            .with_policy(parts.policy.clone()),
            booking: BookingOrchestrator::new(Arc::clone(&parts.appointments), Arc::clone(&parts.backends))
                .with_policy(parts.policy.clone())
                .with_code_generator(Arc::clone(&parts.codes)),
            dashboard: DashboardService::new(Arc::clone(&parts.appointments), Arc::clone(&sync)),
            sync,
            parts,
        }
    }

    /// Resolved configuration for `tenant_id`.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown tenant.
    pub async fn get_booking_config(&self, tenant_id: &TenantId) -> Result<BookingConfig> {
        self.resolver.get_booking_config(tenant_id).await
    }

    /// Open slots for `date`.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown tenant and storage errors.
    pub async fn get_available_slots(&self, tenant_id: &TenantId, date: NaiveDate) -> Result<Vec<Slot>> {
        let config = self.resolver.get_booking_config(tenant_id).await?;
        self.availability.available_slots(&config, date).await
    }

    /// Slots together with the mode used and any shadow that failed open.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown tenant and storage errors.
    pub async fn availability(&self, tenant_id: &TenantId, date: NaiveDate) -> Result<AvailabilityReport> {
        let config = self.resolver.get_booking_config(tenant_id).await?;
        self.availability.availability(&config, date).await
    }

    /// Whether one slot can still be booked.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown tenant and storage errors.
    pub async fn is_slot_available(
        &self,
        tenant_id: &TenantId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool> {
        let config = self.resolver.get_booking_config(tenant_id).await?;
        self.availability.is_slot_available(&config, date, time).await
    }

    /// Book an appointment through the tenant's system of record.
    ///
    /// # Errors
    /// Returns `Validation`, `SlotConflict`, or `NotFound` for an unknown tenant.
    #[instrument(skip(self, request), fields(tenant_id = %tenant_id))]
    pub async fn book_appointment(
        &self,
        tenant_id: &TenantId,
        request: BookingRequest,
    ) -> Result<BookingConfirmation> {
        let config = self.resolver.get_booking_config(tenant_id).await?;
        self.booking.book(&config, request).await
    }

    /// Cancel an appointment, reopening its slot.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown tenant or appointment.
    pub async fn cancel_appointment(&self, tenant_id: &TenantId, id: AppointmentId) -> Result<Appointment> {
        let config = self.resolver.get_booking_config(tenant_id).await?;
        self.booking.cancel(&config, id).await
    }

    /// Import remote appointments over `range`.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown tenant and storage errors. Backend
    /// failures are collected in the report.
    pub async fn sync_appointments(&self, tenant_id: &TenantId, range: DateRange) -> Result<SyncReport> {
        let config = self.resolver.get_booking_config(tenant_id).await?;
        self.sync.sync(&config, range).await
    }

    /// Active appointments for the dashboard window, optionally refreshed first.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown tenant and storage errors.
    pub async fn get_dashboard_appointments(
        &self,
        tenant_id: &TenantId,
        query: &DashboardQuery,
    ) -> Result<DashboardView> {
        let config = self.resolver.get_booking_config(tenant_id).await?;
        self.dashboard.appointments(&config, query).await
    }
}
