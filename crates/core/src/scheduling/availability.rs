//! Availability aggregation
//!
//! Business-hours grid, minus local appointments, intersected with the
//! remote system of record when one is reachable, minus shadow busy time.
//! Backend reads are fanned out concurrently.

use std::sync::Arc;

use bookline_domain::{
    AvailabilityMode, AvailabilityReport, BackendKind, BookingConfig, BusyInterval, Result, Slot,
    SlotSource,
};
use chrono::{NaiveDate, NaiveTime};
use futures::future::join_all;
use tracing::{info, instrument, warn};

use super::ports::{AppointmentRepository, BackendFactory};
use super::remote::RemoteCallPolicy;
use super::slots;

pub struct AvailabilityAggregator {
    appointments: Arc<dyn AppointmentRepository>,
    backends: Arc<dyn BackendFactory>,
    policy: RemoteCallPolicy,
}

impl AvailabilityAggregator {
    #[must_use]
    pub fn new(appointments: Arc<dyn AppointmentRepository>, backends: Arc<dyn BackendFactory>) -> Self {
        Self { appointments, backends, policy: RemoteCallPolicy::default() }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RemoteCallPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bookable slots for `date`, sorted ascending.
    ///
    /// # Errors
    /// Returns storage errors from the appointment repository. Remote failures
    /// degrade the result instead of failing it.
    pub async fn available_slots(&self, config: &BookingConfig, date: NaiveDate) -> Result<Vec<Slot>> {
        Ok(self.availability(config, date).await?.slots)
    }

    /// Slots plus a record of which sources contributed.
    ///
    /// # Errors
    /// Returns storage errors from the appointment repository.
    #[instrument(skip(self, config), fields(tenant_id = %config.tenant_id, date = %date))]
    pub async fn availability(&self, config: &BookingConfig, date: NaiveDate) -> Result<AvailabilityReport> {
        let grid = slots::candidate_grid(&config.hours, config.slot_minutes, date);
        if grid.is_empty() {
            return Ok(AvailabilityReport {
                date,
                mode: AvailabilityMode::LocalOnly,
                slots: Vec::new(),
                failed_shadows: Vec::new(),
            });
        }

        let shadow_reads = config.shadows.iter().map(|kind| self.shadow_busy(config, *kind, date));
        let (local, record, shadows) = tokio::join!(
            self.appointments.active_on_date(&config.tenant_id, date),
            self.record_free_slots(config, date),
            join_all(shadow_reads),
        );

        let mut open = slots::subtract_appointments(grid, date, config.slot_minutes, &local?);

        let (mode, source) = match record {
            None => (AvailabilityMode::LocalOnly, SlotSource::Local),
            Some((kind, Ok(remote_free))) => {
                open = slots::intersect(open, &remote_free);
                (AvailabilityMode::Dual, SlotSource::Dual(kind))
            }
            Some((kind, Err(err))) => {
                warn!(
                    backend = %kind,
                    error = %err,
                    error_kind = err.label(),
                    "system of record unavailable, falling back to local availability"
                );
                (AvailabilityMode::LocalFallback, SlotSource::LocalFallback(kind))
            }
        };

        let mut failed_shadows = Vec::new();
        for (kind, busy) in shadows {
            match busy {
                Ok(busy) => open = slots::subtract_busy(open, date, config.slot_minutes, &busy),
                Err(err) => {
                    warn!(
                        backend = %kind,
                        error = %err,
                        error_kind = err.label(),
                        "shadow busy lookup failed, ignoring it"
                    );
                    failed_shadows.push(kind);
                }
            }
        }

        open.sort();
        open.dedup();
        let slots: Vec<Slot> = open.into_iter().map(|time| Slot::new(date, time, source)).collect();

        info!(count = slots.len(), mode = ?mode, "availability computed");
        Ok(AvailabilityReport { date, mode, slots, failed_shadows })
    }

    /// Whether `time` on `date` is currently bookable.
    ///
    /// # Errors
    /// Returns storage errors from the appointment repository.
    pub async fn is_slot_available(
        &self,
        config: &BookingConfig,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool> {
        let report = self.availability(config, date).await?;
        Ok(report.slots.iter().any(|slot| slot.time == time))
    }

    async fn record_free_slots(
        &self,
        config: &BookingConfig,
        date: NaiveDate,
    ) -> Option<(BackendKind, Result<Vec<NaiveTime>>)> {
        let kind = config.remote_record()?;
        let result = match self.backends.backend(config, kind) {
            Ok(backend) => self.policy.read(kind, || backend.list_available_slots(date)).await,
            Err(err) => Err(err),
        };
        Some((kind, result))
    }

    async fn shadow_busy(
        &self,
        config: &BookingConfig,
        kind: BackendKind,
        date: NaiveDate,
    ) -> (BackendKind, Result<Vec<BusyInterval>>) {
        let result = match self.backends.backend(config, kind) {
            Ok(backend) => self.policy.read(kind, || backend.list_busy_intervals(date)).await,
            Err(err) => Err(err),
        };
        (kind, result)
    }
}
