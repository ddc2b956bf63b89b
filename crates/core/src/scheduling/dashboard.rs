//! Dashboard listing

use std::sync::Arc;

use bookline_domain::constants::{DEFAULT_DASHBOARD_DAYS, MAX_DASHBOARD_DAYS};
use bookline_domain::{BookingConfig, DashboardEntry, DashboardQuery, DashboardView, DateRange, Result};
use chrono::{NaiveDate, Utc};
use tracing::{debug, instrument};

use super::ports::AppointmentRepository;
use super::sync::ReconciliationSync;

pub struct DashboardService {
    appointments: Arc<dyn AppointmentRepository>,
    sync: Arc<ReconciliationSync>,
}

impl DashboardService {
    #[must_use]
    pub fn new(appointments: Arc<dyn AppointmentRepository>, sync: Arc<ReconciliationSync>) -> Self {
        Self { appointments, sync }
    }

    /// Upcoming non-cancelled appointments, each with its source badge.
    ///
    /// With `refresh` set, reconciliation runs first over the same window and
    /// its report is returned alongside. Backend failures during the refresh
    /// land in that report rather than failing the listing.
    ///
    /// # Errors
    /// Returns storage errors. A failed refresh is reported in the view's sync
    /// report, not as an error.
    #[instrument(skip(self, config), fields(tenant_id = %config.tenant_id))]
    pub async fn appointments(&self, config: &BookingConfig, query: &DashboardQuery) -> Result<DashboardView> {
        let range = window(config, query);

        let sync = if query.refresh { Some(self.sync.sync(config, range).await?) } else { None };

        let mut appointments = self.appointments.list_range(&config.tenant_id, range, false).await?;
        appointments.sort_by_key(|appointment| (appointment.date, appointment.time));
        let last_synced_at = self.appointments.last_synced_at(&config.tenant_id).await?;

        debug!(count = appointments.len(), start = %range.start, end = %range.end, "dashboard listed");
        Ok(DashboardView {
            appointments: appointments
                .into_iter()
                .map(|appointment| DashboardEntry { badge: appointment.source.badge(), appointment })
                .collect(),
            last_synced_at,
            sync,
        })
    }
}

fn window(config: &BookingConfig, query: &DashboardQuery) -> DateRange {
    let days = query.days.unwrap_or(DEFAULT_DASHBOARD_DAYS).min(MAX_DASHBOARD_DAYS);
    let from = query.from.unwrap_or_else(|| today_in(config));
    DateRange::forward(from, days)
}

fn today_in(config: &BookingConfig) -> NaiveDate {
    Utc::now().with_timezone(&config.timezone).date_naive()
}
