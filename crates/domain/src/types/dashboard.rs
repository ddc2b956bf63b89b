//! Dashboard listing types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::appointment::{Appointment, SourceBadge};
use super::sync::SyncReport;

/// Parameters of a dashboard listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardQuery {
    /// Window length in days. Defaults to two weeks.
    pub days: Option<u32>,
    /// Run reconciliation before listing.
    pub refresh: bool,
    /// First day of the window. Defaults to today in the tenant's zone.
    pub from: Option<NaiveDate>,
}

/// An appointment annotated with its source badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardEntry {
    pub appointment: Appointment,
    pub badge: SourceBadge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardView {
    pub appointments: Vec<DashboardEntry>,
    /// Most recent reconciliation stamp across the tenant's appointments.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Report of the refresh run, when one was requested.
    pub sync: Option<SyncReport>,
}
