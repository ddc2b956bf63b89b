//! Booking requests, confirmations, and the payloads exchanged with backends

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::appointment::{AppointmentId, AppointmentSource, AppointmentStatus, CustomerInfo, DepositStatus};
use super::backend::BackendKind;
use super::tenant::SystemOfRecord;

/// A booking as requested by a front-end (voice agent, chat, web form).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub customer: CustomerInfo,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub purpose: Option<String>,
    pub notes: Option<String>,
    /// Defaults to the tenant's slot length.
    pub duration_minutes: Option<u32>,
    pub source: AppointmentSource,
}

impl BookingRequest {
    /// Request with no purpose, notes, or duration override.
    #[must_use]
    pub fn new(
        customer: CustomerInfo,
        date: NaiveDate,
        time: NaiveTime,
        source: AppointmentSource,
    ) -> Self {
        Self { customer, date, time, purpose: None, notes: None, duration_minutes: None, source }
    }

    #[must_use]
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }
}

/// Outcome of a successful booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub appointment_id: AppointmentId,
    pub confirmation_code: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub display_date: String,
    pub display_time: String,
    /// System holding the authoritative write: `Local` when the remote write failed.
    pub system: SystemOfRecord,
    /// Id assigned by the remote system of record, when its write succeeded.
    pub remote_external_id: Option<String>,
    /// Why the remote write was skipped, when it failed.
    pub remote_error: Option<String>,
    /// Shadow backends that accepted a mirrored event.
    pub mirrored: Vec<BackendKind>,
    pub deposit_status: DepositStatus,
    /// Amount due when a deposit is pending.
    pub deposit_amount_cents: Option<i64>,
}

/// Customer record handle on a remote backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCustomer {
    pub id: String,
}

/// Everything an adapter needs to write one appointment remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentDraft {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    pub timezone: Tz,
    pub title: String,
    pub notes: Option<String>,
    pub customer: CustomerInfo,
}

/// An appointment as listed by a backend, already translated into the
/// canonical model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAppointment {
    pub external_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    pub purpose: Option<String>,
    pub status: AppointmentStatus,
    pub customer: CustomerInfo,
}
