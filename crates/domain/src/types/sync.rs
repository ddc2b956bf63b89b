//! Reconciliation windows and reports

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::appointment::AppointmentId;
use super::backend::BackendKind;
use crate::errors::BooklineError;

/// Inclusive date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Inclusive range from `start` to `end`.
    ///
    /// # Errors
    /// Returns `BooklineError::Validation` if `end` precedes `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, BooklineError> {
        if end < start {
            return Err(BooklineError::Validation(format!(
                "date range ends ({end}) before it starts ({start})"
            )));
        }
        Ok(Self { start, end })
    }

    /// `days` days forward from `start`, both ends included.
    #[must_use]
    pub fn forward(start: NaiveDate, days: u32) -> Self {
        Self { start, end: start + Duration::days(i64::from(days)) }
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// One backend that could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub backend: BackendKind,
    pub message: String,
}

/// A remote appointment whose id is already attached to a locally-originated
/// appointment with different details. The local row is left as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub backend: BackendKind,
    pub external_id: String,
    pub appointment_id: AppointmentId,
}

/// Counts from one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub conflicts: Vec<SyncConflict>,
    pub errors: Vec<SyncFailure>,
}

impl SyncReport {
    /// Nothing was written.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0
    }
}
