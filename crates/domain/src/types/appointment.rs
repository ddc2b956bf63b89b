//! Canonical appointment model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::backend::BackendKind;
use super::tenant::TenantId;
use crate::errors::BooklineError;

/// Surrogate key of a stored appointment.
pub type AppointmentId = i64;

// ============================================================================
// Status
// ============================================================================

/// Canonical appointment status. Backend-specific values are translated into
/// this enum by each adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl AppointmentStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::NoShow => "no_show",
        }
    }

    /// Occupies its slot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = BooklineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            "no_show" => Ok(Self::NoShow),
            other => Err(BooklineError::Validation(format!("unknown appointment status: {other}"))),
        }
    }
}

/// Deposit state of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    NotRequired,
    Pending,
    Paid,
}

impl DepositStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRequired => "not_required",
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }
}

impl FromStr for DepositStatus {
    type Err = BooklineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_required" => Ok(Self::NotRequired),
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            other => Err(BooklineError::Validation(format!("unknown deposit status: {other}"))),
        }
    }
}

// ============================================================================
// Source attribution
// ============================================================================

/// Where an appointment originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AppointmentSource {
    Local,
    Voice,
    WhatsApp,
    Online,
    Manual,
    WalkIn,
    /// Imported by reconciliation from this backend.
    Sync(BackendKind),
}

impl AppointmentSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Voice => "voice_booking",
            Self::WhatsApp => "whatsapp",
            Self::Online => "online",
            Self::Manual => "manual",
            Self::WalkIn => "walk_in",
            Self::Sync(kind) => kind.sync_source_tag(),
        }
    }

    /// Display badge for dashboards.
    #[must_use]
    pub fn badge(&self) -> SourceBadge {
        let (label, color, background) = match self {
            Self::Sync(BackendKind::Ghl) => ("GHL", "#10b981", "#d1fae5"),
            Self::Sync(BackendKind::HubSpot) => ("HubSpot", "#ff7a59", "#ffe8e2"),
            Self::Sync(BackendKind::Vagaro) => ("Vagaro", "#8b5cf6", "#ede9fe"),
            Self::Sync(BackendKind::Zoho) => ("Zoho", "#dc2626", "#fee2e2"),
            Self::Sync(BackendKind::Google) => ("Google", "#4285f4", "#e8f0fe"),
            Self::Voice => ("Voice", "#3b82f6", "#dbeafe"),
            Self::WhatsApp => ("WhatsApp", "#25D366", "#dcfce7"),
            Self::Online => ("Online", "#0ea5e9", "#e0f2fe"),
            Self::Manual => ("Manual", "#6b7280", "#f3f4f6"),
            Self::WalkIn => ("Walk-in", "#f59e0b", "#fef3c7"),
            Self::Local => ("Local", "#6b7280", "#f3f4f6"),
        };
        SourceBadge { label: label.to_string(), color: color.to_string(), background: background.to_string() }
    }
}

impl fmt::Display for AppointmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentSource {
    type Err = BooklineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "voice_booking" | "voice" => Ok(Self::Voice),
            "whatsapp" => Ok(Self::WhatsApp),
            "online" => Ok(Self::Online),
            "manual" => Ok(Self::Manual),
            "walk_in" | "walk-in" => Ok(Self::WalkIn),
            other => BackendKind::ALL
                .iter()
                .find(|kind| kind.sync_source_tag() == other)
                .map(|kind| Self::Sync(*kind))
                .ok_or_else(|| {
                    BooklineError::Validation(format!("unknown appointment source: {other}"))
                }),
        }
    }
}

impl TryFrom<String> for AppointmentSource {
    type Error = BooklineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AppointmentSource> for String {
    fn from(value: AppointmentSource) -> Self {
        value.as_str().to_string()
    }
}

/// Label and colours used to render an appointment's origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBadge {
    pub label: String,
    pub color: String,
    pub background: String,
}

// ============================================================================
// Appointment
// ============================================================================

/// Customer contact details as captured by the front-end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

impl CustomerInfo {
    /// Phone number reduced to its digits.
    #[must_use]
    pub fn phone_digits(&self) -> String {
        self.phone.chars().filter(char::is_ascii_digit).collect()
    }
}

/// One nullable external id per backend kind, used as the sync dedup key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIds {
    pub ghl: Option<String>,
    pub hubspot: Option<String>,
    pub vagaro: Option<String>,
    pub zoho: Option<String>,
    pub google: Option<String>,
}

impl ExternalIds {
    #[must_use]
    pub fn get(&self, kind: BackendKind) -> Option<&str> {
        match kind {
            BackendKind::Ghl => self.ghl.as_deref(),
            BackendKind::HubSpot => self.hubspot.as_deref(),
            BackendKind::Vagaro => self.vagaro.as_deref(),
            BackendKind::Zoho => self.zoho.as_deref(),
            BackendKind::Google => self.google.as_deref(),
        }
    }

    pub fn set(&mut self, kind: BackendKind, external_id: Option<String>) {
        let slot = match kind {
            BackendKind::Ghl => &mut self.ghl,
            BackendKind::HubSpot => &mut self.hubspot,
            BackendKind::Vagaro => &mut self.vagaro,
            BackendKind::Zoho => &mut self.zoho,
            BackendKind::Google => &mut self.google,
        };
        *slot = external_id;
    }

    /// Builder-style single id.
    #[must_use]
    pub fn only(kind: BackendKind, external_id: impl Into<String>) -> Self {
        let mut ids = Self::default();
        ids.set(kind, Some(external_id.into()));
        ids
    }
}

/// A stored appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub tenant_id: TenantId,
    pub customer: CustomerInfo,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    pub purpose: Option<String>,
    pub status: AppointmentStatus,
    pub source: AppointmentSource,
    pub confirmation_code: String,
    pub external_ids: ExternalIds,
    /// Backend holding the authoritative copy, if any. Reconciliation from
    /// that backend overwrites the row; other matches leave it alone.
    pub record_backend: Option<BackendKind>,
    pub deposit_status: DepositStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert parameters for a new appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub tenant_id: TenantId,
    pub customer: CustomerInfo,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    pub purpose: Option<String>,
    pub status: AppointmentStatus,
    pub source: AppointmentSource,
    pub confirmation_code: String,
    pub external_ids: ExternalIds,
    pub record_backend: Option<BackendKind>,
    pub deposit_status: DepositStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Fields reconciliation may overwrite on an existing appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedFields {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    pub purpose: Option<String>,
    pub status: AppointmentStatus,
}

impl Appointment {
    /// Whether `kind` holds the authoritative copy of this appointment.
    #[must_use]
    pub fn is_held_by(&self, kind: BackendKind) -> bool {
        self.record_backend == Some(kind)
    }

    /// Current values of the fields reconciliation manages.
    #[must_use]
    pub fn synced_fields(&self) -> SyncedFields {
        SyncedFields {
            date: self.date,
            time: self.time,
            duration_minutes: self.duration_minutes,
            purpose: self.purpose.clone(),
            status: self.status,
        }
    }
}
