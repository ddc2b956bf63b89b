//! Tenant records and the resolved booking configuration

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::backend::{BackendCredential, BackendKind};
use crate::constants::DEFAULT_SLOT_MINUTES;
use crate::errors::BooklineError;

// ============================================================================
// Identity
// ============================================================================

/// Identifier of a tenant (one business account).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Business hours
// ============================================================================

/// Opening window for one weekday. `close` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub day: Weekday,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

/// Weekly opening hours. Weekdays without an entry are closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessHours(pub Vec<DayHours>);

impl BusinessHours {
    /// Same window on every listed weekday.
    #[must_use]
    pub fn uniform(open: NaiveTime, close: NaiveTime, days: &[Weekday]) -> Self {
        Self(days.iter().map(|&day| DayHours { day, open, close }).collect())
    }

    /// Mon-Fri 09:00-17:00, Sat 10:00-14:00, Sun closed.
    #[must_use]
    pub fn standard() -> Self {
        let mut hours = Self::uniform(
            hm(9, 0),
            hm(17, 0),
            &[Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
        );
        hours.0.push(DayHours { day: Weekday::Sat, open: hm(10, 0), close: hm(14, 0) });
        hours
    }

    #[must_use]
    pub fn for_weekday(&self, day: Weekday) -> Option<&DayHours> {
        self.0.iter().find(|entry| entry.day == day)
    }

    /// Reject windows that close before they open or weekdays listed twice.
    ///
    /// # Errors
    /// Returns `BooklineError::Validation` naming the first invalid day.
    pub fn validate(&self) -> Result<(), BooklineError> {
        for (index, entry) in self.0.iter().enumerate() {
            if entry.close <= entry.open {
                return Err(BooklineError::Config(format!(
                    "business hours for {} close at or before opening",
                    entry.day
                )));
            }
            if self.0[..index].iter().any(|earlier| earlier.day == entry.day) {
                return Err(BooklineError::Config(format!(
                    "business hours list {} more than once",
                    entry.day
                )));
            }
        }
        Ok(())
    }
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self::standard()
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

// ============================================================================
// Booking system
// ============================================================================

/// Where the authoritative write for a tenant lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SystemOfRecord {
    Local,
    Remote(BackendKind),
}

impl SystemOfRecord {
    #[must_use]
    pub fn remote(&self) -> Option<BackendKind> {
        match self {
            Self::Local => None,
            Self::Remote(kind) => Some(*kind),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote(kind) => kind.as_str(),
        }
    }
}

impl fmt::Display for SystemOfRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemOfRecord {
    type Err = BooklineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "none" | "" => Ok(Self::Local),
            other => other.parse().map(Self::Remote),
        }
    }
}

impl TryFrom<String> for SystemOfRecord {
    type Error = BooklineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SystemOfRecord> for String {
    fn from(value: SystemOfRecord) -> Self {
        value.as_str().to_string()
    }
}

/// Deposit requirement applied to new bookings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositPolicy {
    pub required: bool,
    pub amount_cents: Option<i64>,
}

// ============================================================================
// Tenant
// ============================================================================

/// A business account as stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub business_name: String,
    /// IANA zone name, validated when the booking config is resolved.
    pub timezone: String,
    pub hours: BusinessHours,
    pub slot_minutes: u32,
    /// Explicit booking-system setting; `None` means "infer from credentials".
    pub booking_system: Option<SystemOfRecord>,
    /// Explicitly configured busy-only backends. Empty means "infer".
    pub shadow_backends: Vec<BackendKind>,
    pub deposit: DepositPolicy,
}

impl Tenant {
    /// New tenant with standard hours, 30-minute slots, and no remote backends.
    #[must_use]
    pub fn new(id: impl Into<TenantId>, business_name: impl Into<String>, timezone: &str) -> Self {
        Self {
            id: id.into(),
            business_name: business_name.into(),
            timezone: timezone.to_string(),
            hours: BusinessHours::standard(),
            slot_minutes: DEFAULT_SLOT_MINUTES,
            booking_system: None,
            shadow_backends: Vec::new(),
            deposit: DepositPolicy::default(),
        }
    }
}

// ============================================================================
// Resolved configuration
// ============================================================================

/// How the system of record was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Explicit,
    Inferred,
    Default,
}

/// Everything the scheduling services need to know about a tenant, resolved
/// and validated once per operation.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    pub tenant_id: TenantId,
    pub business_name: String,
    pub timezone: Tz,
    pub hours: BusinessHours,
    pub slot_minutes: u32,
    pub system_of_record: SystemOfRecord,
    pub system_source: ConfigSource,
    /// Busy-only backends. Never contains the system of record.
    pub shadows: Vec<BackendKind>,
    pub credentials: Vec<BackendCredential>,
    pub deposit: DepositPolicy,
}

impl BookingConfig {
    #[must_use]
    pub fn remote_record(&self) -> Option<BackendKind> {
        self.system_of_record.remote()
    }

    #[must_use]
    pub fn credential(&self, kind: BackendKind) -> Option<&BackendCredential> {
        self.credentials.iter().find(|credential| credential.kind == kind)
    }

    /// Backends whose appointments are pulled by reconciliation: the remote
    /// system of record first, then each shadow.
    #[must_use]
    pub fn readable_backends(&self) -> Vec<BackendKind> {
        let mut kinds: Vec<BackendKind> = self.remote_record().into_iter().collect();
        kinds.extend(self.shadows.iter().copied());
        kinds
    }
}
