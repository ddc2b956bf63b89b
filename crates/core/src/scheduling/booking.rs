//! Booking orchestration
//!
//! Remote system of record first (best effort, never retried), then the
//! local insert guarded by the store's slot uniqueness, then best-effort
//! mirroring to shadow backends. The confirmation names the remote system
//! only when it accepted the write.

use std::sync::Arc;

use bookline_domain::constants::{
    CONFIRMATION_CODE_MAX_ATTEMPTS, DEFAULT_PURPOSE, MAX_CUSTOMER_NAME_LENGTH,
    PLACEHOLDER_EMAIL_DOMAIN,
};
use bookline_domain::{
    format_date_display, format_time_display, Appointment, AppointmentDraft, AppointmentId,
    AppointmentStatus, BackendKind, BookingConfig, BookingConfirmation, BookingRequest,
    BooklineError, CustomerInfo, DepositStatus, ExternalIds, NewAppointment, Result, SystemOfRecord,
};
use futures::future::join_all;
use tracing::{debug, error, info, instrument, warn};

use super::codes::{CodeGenerator, RandomCodeGenerator};
use super::ports::{AppointmentRepository, BackendFactory, CalendarBackend};
use super::remote::RemoteCallPolicy;
use super::slots;

const MIN_PHONE_DIGITS: usize = 7;

pub struct BookingOrchestrator {
    appointments: Arc<dyn AppointmentRepository>,
    backends: Arc<dyn BackendFactory>,
    codes: Arc<dyn CodeGenerator>,
    policy: RemoteCallPolicy,
}

impl BookingOrchestrator {
    #[must_use]
    pub fn new(appointments: Arc<dyn AppointmentRepository>, backends: Arc<dyn BackendFactory>) -> Self {
        Self {
            appointments,
            backends,
            codes: Arc::new(RandomCodeGenerator),
            policy: RemoteCallPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_code_generator(mut self, codes: Arc<dyn CodeGenerator>) -> Self {
        self.codes = codes;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RemoteCallPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Book `request` for the tenant described by `config`.
    ///
    /// Remote failures never block the local booking. `SlotConflict` and
    /// `Validation` are returned to the caller as is.
    ///
    /// # Errors
    /// Returns `Validation` for bad customer details or times outside business
    /// hours, `SlotConflict` when the slot is already held, and storage errors.
    #[instrument(skip(self, config, request), fields(tenant_id = %config.tenant_id, date = %request.date, time = %request.time))]
    pub async fn book(&self, config: &BookingConfig, request: BookingRequest) -> Result<BookingConfirmation> {
        let customer = normalize_customer(&request.customer)?;
        let duration = request.duration_minutes.unwrap_or(config.slot_minutes);
        if duration == 0 {
            return Err(BooklineError::Validation("duration must be positive".to_string()));
        }
        if !slots::fits_business_hours(&config.hours, request.date, request.time, duration) {
            return Err(BooklineError::Validation(format!(
                "{} at {} is outside business hours",
                format_date_display(request.date),
                format_time_display(request.time)
            )));
        }

        let purpose = request
            .purpose
            .as_deref()
            .map(str::trim)
            .filter(|purpose| !purpose.is_empty())
            .unwrap_or(DEFAULT_PURPOSE)
            .to_string();
        let draft = AppointmentDraft {
            date: request.date,
            time: request.time,
            duration_minutes: duration,
            timezone: config.timezone,
            title: format!("{purpose} - {}", customer.name),
            notes: request.notes.clone(),
            customer: customer.clone(),
        };

        // Remote system of record.
        let mut external_ids = ExternalIds::default();
        let mut record_backend = None;
        let mut remote_external_id = None;
        let mut remote_error = None;
        if let Some(kind) = config.remote_record() {
            match self.write_remote(config, kind, &draft).await {
                Ok(external_id) => {
                    info!(backend = %kind, external_id = %external_id, "remote appointment created");
                    external_ids.set(kind, Some(external_id.clone()));
                    record_backend = Some(kind);
                    remote_external_id = Some(external_id);
                }
                Err(err) => {
                    warn!(
                        backend = %kind,
                        error = %err,
                        error_kind = err.label(),
                        "remote booking failed, continuing with local booking"
                    );
                    remote_error = Some(err.to_string());
                }
            }
        }

        // Local exclusivity gate.
        let deposit_status =
            if config.deposit.required { DepositStatus::Pending } else { DepositStatus::NotRequired };
        let new_appointment = NewAppointment {
            tenant_id: config.tenant_id.clone(),
            customer,
            date: request.date,
            time: request.time,
            duration_minutes: duration,
            purpose: Some(purpose),
            status: AppointmentStatus::Scheduled,
            source: request.source,
            confirmation_code: String::new(),
            external_ids,
            record_backend,
            deposit_status,
            last_synced_at: None,
        };
        let appointment = match insert_with_fresh_code(&*self.appointments, &*self.codes, new_appointment).await {
            Ok(appointment) => appointment,
            Err(BooklineError::SlotConflict(detail)) => {
                if let (Some(kind), Some(external_id)) = (config.remote_record(), &remote_external_id) {
                    error!(
                        backend = %kind,
                        external_id = %external_id,
                        "slot taken locally; remote appointment left for manual reconciliation"
                    );
                }
                return Err(BooklineError::SlotConflict(detail));
            }
            Err(err) => return Err(err),
        };

        let mirrored = self.mirror_to_shadows(config, appointment.id, &draft).await;
        let system = record_backend.map_or(SystemOfRecord::Local, SystemOfRecord::Remote);

        info!(
            appointment_id = appointment.id,
            confirmation_code = %appointment.confirmation_code,
            system = %system,
            "appointment booked"
        );

        Ok(BookingConfirmation {
            appointment_id: appointment.id,
            confirmation_code: appointment.confirmation_code,
            date: appointment.date,
            time: appointment.time,
            display_date: format_date_display(appointment.date),
            display_time: format_time_display(appointment.time),
            system,
            remote_external_id,
            remote_error,
            mirrored,
            deposit_status,
            deposit_amount_cents: config.deposit.required.then_some(config.deposit.amount_cents).flatten(),
        })
    }

    /// Cancel an appointment. Already-cancelled appointments are returned
    /// unchanged; the remote cancel is best effort.
    ///
    /// # Errors
    /// Returns `NotFound` if the appointment does not belong to the tenant.
    #[instrument(skip(self, config), fields(tenant_id = %config.tenant_id))]
    pub async fn cancel(&self, config: &BookingConfig, id: AppointmentId) -> Result<Appointment> {
        let appointment = self
            .appointments
            .find_by_id(&config.tenant_id, id)
            .await?
            .ok_or_else(|| BooklineError::NotFound(format!("appointment {id}")))?;

        if appointment.status == AppointmentStatus::Cancelled {
            debug!(appointment_id = id, "appointment already cancelled");
            return Ok(appointment);
        }

        if let Some(kind) = config.remote_record() {
            if let Some(external_id) = appointment.external_ids.get(kind) {
                let outcome = match self.backends.backend(config, kind) {
                    Ok(backend) => self.policy.write(kind, backend.cancel_appointment(external_id)).await,
                    Err(err) => Err(err),
                };
                if let Err(err) = outcome {
                    warn!(
                        backend = %kind,
                        external_id = %external_id,
                        error = %err,
                        "remote cancel failed, cancelling locally"
                    );
                }
            }
        }

        let cancelled = self.appointments.cancel(&config.tenant_id, id).await?;
        info!(appointment_id = id, "appointment cancelled");
        Ok(cancelled)
    }

    async fn write_remote(
        &self,
        config: &BookingConfig,
        kind: BackendKind,
        draft: &AppointmentDraft,
    ) -> Result<String> {
        let backend = self.backends.backend(config, kind)?;
        let customer = remote_customer_info(&*backend, &draft.customer);
        let remote_customer = self.policy.write(kind, backend.find_or_create_customer(&customer)).await?;
        self.policy.write(kind, backend.create_appointment(&remote_customer, draft)).await
    }

    async fn mirror_to_shadows(
        &self,
        config: &BookingConfig,
        appointment_id: AppointmentId,
        draft: &AppointmentDraft,
    ) -> Vec<BackendKind> {
        let writes = config.shadows.iter().map(|kind| async move {
            let backend = self.backends.backend(config, *kind)?;
            if !backend.supports_event_creation() {
                return Ok(None);
            }
            let customer = remote_customer_info(&*backend, &draft.customer);
            let remote_customer =
                self.policy.write(*kind, backend.find_or_create_customer(&customer)).await?;
            self.policy.write(*kind, backend.create_appointment(&remote_customer, draft)).await.map(Some)
        });
        let outcomes: Vec<Result<Option<String>>> = join_all(writes).await;

        let mut mirrored = Vec::new();
        for (kind, outcome) in config.shadows.iter().copied().zip(outcomes) {
            match outcome {
                Ok(Some(external_id)) => {
                    if let Err(err) = self
                        .appointments
                        .record_external_id(&config.tenant_id, appointment_id, kind, &external_id)
                        .await
                    {
                        warn!(backend = %kind, error = %err, "could not record mirror id");
                    }
                    mirrored.push(kind);
                }
                Ok(None) => debug!(backend = %kind, "backend does not accept mirrored events"),
                Err(err) => warn!(backend = %kind, error = %err, "mirror to shadow backend failed"),
            }
        }
        mirrored
    }
}

/// Insert, regenerating the confirmation code while it collides. Stores
/// report code collisions as `Duplicate` naming the `confirmation_code`
/// column; other duplicates are returned unchanged.
pub(crate) async fn insert_with_fresh_code(
    appointments: &dyn AppointmentRepository,
    codes: &dyn CodeGenerator,
    mut appointment: NewAppointment,
) -> Result<Appointment> {
    for attempt in 1..=CONFIRMATION_CODE_MAX_ATTEMPTS {
        appointment.confirmation_code = codes.generate();
        match appointments.insert(appointment.clone()).await {
            Err(BooklineError::Duplicate(detail)) if detail.contains("confirmation_code") => {
                debug!(attempt, detail = %detail, "confirmation code collision, regenerating");
            }
            other => return other,
        }
    }
    Err(BooklineError::Internal(format!(
        "no unique confirmation code after {CONFIRMATION_CODE_MAX_ATTEMPTS} attempts"
    )))
}

fn normalize_customer(customer: &CustomerInfo) -> Result<CustomerInfo> {
    let name = customer.name.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return Err(BooklineError::Validation("customer name is required".to_string()));
    }
    if name.chars().count() > MAX_CUSTOMER_NAME_LENGTH {
        return Err(BooklineError::Validation(format!(
            "customer name exceeds {MAX_CUSTOMER_NAME_LENGTH} characters"
        )));
    }
    if customer.phone_digits().len() < MIN_PHONE_DIGITS {
        return Err(BooklineError::Validation("a valid phone number is required".to_string()));
    }
    let email = customer
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string);
    if let Some(email) = &email {
        if !email.contains('@') {
            return Err(BooklineError::Validation(format!("{email} is not an email address")));
        }
    }
    Ok(CustomerInfo { name, phone: customer.phone.trim().to_string(), email })
}

/// Customer details as sent to a backend: backends that demand an email get
/// a placeholder derived from the phone number when none was given.
fn remote_customer_info(backend: &dyn CalendarBackend, customer: &CustomerInfo) -> CustomerInfo {
    if customer.email.is_some() || !backend.requires_customer_email() {
        return customer.clone();
    }
    CustomerInfo {
        email: Some(format!("{}@{PLACEHOLDER_EMAIL_DOMAIN}", customer.phone_digits())),
        ..customer.clone()
    }
}
