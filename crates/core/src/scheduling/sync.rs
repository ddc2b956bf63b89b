//! Reconciliation sync
//!
//! Pulls appointments held by each readable backend into the local store.
//! The `(tenant, backend, external id)` triple is the dedup key, so running
//! the same window twice against unchanged remote data writes nothing.
//! Rows held by the listing backend follow it; a match on a purely local or
//! mirrored row is only reported when the two disagree.

use std::sync::Arc;

use bookline_domain::{
    AppointmentSource, BackendKind, BookingConfig, BooklineError, DateRange, DepositStatus,
    ExternalIds, NewAppointment, RemoteAppointment, Result, SyncConflict, SyncFailure, SyncReport,
    SyncedFields,
};
use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use super::booking::insert_with_fresh_code;
use super::codes::{CodeGenerator, RandomCodeGenerator};
use super::ports::{AppointmentRepository, BackendFactory};
use super::remote::RemoteCallPolicy;

pub struct ReconciliationSync {
    appointments: Arc<dyn AppointmentRepository>,
    backends: Arc<dyn BackendFactory>,
    codes: Arc<dyn CodeGenerator>,
    policy: RemoteCallPolicy,
}

impl ReconciliationSync {
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

    /// Reconcile every readable backend over `range`.
    ///
    /// A backend that cannot be listed is recorded in `errors` and the
    /// remaining backends are still processed.
    ///
    /// # Errors
    /// Returns storage errors that are not confined to a single item.
    #[instrument(skip(self, config), fields(tenant_id = %config.tenant_id, start = %range.start, end = %range.end))]
    pub async fn sync(&self, config: &BookingConfig, range: DateRange) -> Result<SyncReport> {
        let kinds = config.readable_backends();
        let fetches = kinds.iter().map(|kind| self.fetch(config, *kind, range));
        let fetched = join_all(fetches).await;

        let mut report = SyncReport::default();
        for (kind, listing) in kinds.iter().copied().zip(fetched) {
            let applied = match listing {
                Ok(remote) => self.apply(config, kind, range, remote, &mut report).await,
                Err(err) => Err(err),
            };
            match applied {
                Ok(()) => debug!(backend = %kind, "backend reconciled"),
                Err(err) => {
                    warn!(backend = %kind, error = %err, error_kind = err.label(), "backend sync failed");
                    report.errors.push(SyncFailure { backend: kind, message: err.to_string() });
                }
            }
        }

        info!(
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            conflicts = report.conflicts.len(),
            errors = report.errors.len(),
            "sync completed"
        );
        Ok(report)
    }

    async fn fetch(
        &self,
        config: &BookingConfig,
        kind: BackendKind,
        range: DateRange,
    ) -> Result<Vec<RemoteAppointment>> {
        let backend = self.backends.backend(config, kind)?;
        self.policy.read(kind, || backend.list_appointments(range)).await
    }

    /// Apply one backend's listing into `report`. Item-level failures are
    /// recorded and skipped; any other storage failure stops this backend.
    async fn apply(
        &self,
        config: &BookingConfig,
        kind: BackendKind,
        range: DateRange,
        remote: Vec<RemoteAppointment>,
        report: &mut SyncReport,
    ) -> Result<()> {
        let synced_at = Utc::now();

        for item in remote.into_iter().filter(|item| range.contains(item.date)) {
            let existing = self
                .appointments
                .find_by_external_id(&config.tenant_id, kind, &item.external_id)
                .await?;
            let incoming = SyncedFields {
                date: item.date,
                time: item.time,
                duration_minutes: item.duration_minutes,
                purpose: item.purpose.clone(),
                status: item.status,
            };

            match existing {
                Some(local) if local.is_held_by(kind) => {
                    if local.synced_fields() == incoming {
                        report.unchanged += 1;
                        continue;
                    }
                    match self
                        .appointments
                        .apply_remote_changes(&config.tenant_id, local.id, &incoming, synced_at)
                        .await
                    {
                        Ok(_) => report.updated += 1,
                        Err(err) if is_item_error(&err) => {
                            record_item_error(report, kind, &item.external_id, &err)
                        }
                        Err(err) => return Err(err),
                    }
                }
                Some(local) => {
                    let drifted = local.date != incoming.date
                        || local.time != incoming.time
                        || local.status.is_active() != incoming.status.is_active();
                    if drifted {
                        warn!(
                            backend = %kind,
                            external_id = %item.external_id,
                            appointment_id = local.id,
                            "remote appointment differs from a local or mirrored one, leaving it"
                        );
                        report.conflicts.push(SyncConflict {
                            backend: kind,
                            external_id: item.external_id.clone(),
                            appointment_id: local.id,
                        });
                    } else {
                        report.unchanged += 1;
                    }
                }
                None => {
                    let new_appointment = NewAppointment {
                        tenant_id: config.tenant_id.clone(),
                        customer: item.customer.clone(),
                        date: item.date,
                        time: item.time,
                        duration_minutes: item.duration_minutes,
                        purpose: item.purpose.clone(),
                        status: item.status,
                        source: AppointmentSource::Sync(kind),
                        confirmation_code: String::new(),
                        external_ids: ExternalIds::only(kind, item.external_id.clone()),
                        record_backend: Some(kind),
                        deposit_status: DepositStatus::NotRequired,
                        last_synced_at: Some(synced_at),
                    };
                    match insert_with_fresh_code(&*self.appointments, &*self.codes, new_appointment).await {
                        Ok(_) => report.created += 1,
                        Err(err) if is_item_error(&err) => {
                            record_item_error(report, kind, &item.external_id, &err)
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
        }

        Ok(())
    }
}

/// Failures confined to one remote item, such as the slot already being held
/// by another local appointment.
fn is_item_error(err: &BooklineError) -> bool {
    matches!(
        err,
        BooklineError::SlotConflict(_) | BooklineError::Duplicate(_) | BooklineError::Validation(_)
    )
}

fn record_item_error(report: &mut SyncReport, kind: BackendKind, external_id: &str, err: &BooklineError) {
    warn!(backend = %kind, external_id = %external_id, error = %err, "remote appointment skipped");
    report.errors.push(SyncFailure { backend: kind, message: format!("{external_id}: {err}") });
}
