//! Bookable slots, busy intervals, and display formatting

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use super::backend::BackendKind;
use crate::errors::BooklineError;

/// Which sources were combined to produce a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "backend", rename_all = "snake_case")]
pub enum SlotSource {
    /// Business hours minus local appointments only.
    Local,
    /// Also confirmed free by the remote system of record.
    Dual(BackendKind),
    /// The system of record was unreachable; local view only.
    LocalFallback(BackendKind),
}

/// One bookable start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// e.g. `"Monday, June 2"`
    pub display_date: String,
    /// e.g. `"2:30 PM"`
    pub display_time: String,
    pub source: SlotSource,
    pub available: bool,
}

impl Slot {
    #[must_use]
    pub fn new(date: NaiveDate, time: NaiveTime, source: SlotSource) -> Self {
        Self {
            date,
            time,
            display_date: format_date_display(date),
            display_time: format_time_display(time),
            source,
            available: true,
        }
    }
}

/// A half-open busy window `[start, end)` in the tenant's local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BusyInterval {
    #[must_use]
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// True when `[start, end)` shares any instant with this interval.
    /// Touching endpoints do not overlap.
    #[must_use]
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start < self.end && end > self.start
    }
}

/// Result mode of an availability computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityMode {
    LocalOnly,
    Dual,
    LocalFallback,
}

/// Slots for one date plus a record of which sources contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub date: NaiveDate,
    pub mode: AvailabilityMode,
    pub slots: Vec<Slot>,
    /// Shadow backends whose busy lookup failed and were ignored.
    pub failed_shadows: Vec<BackendKind>,
}

/// Parse `HH:MM` or `HH:MM:SS`.
///
/// # Errors
/// Returns `BooklineError::Validation` if `value` is not a time.
pub fn parse_time(value: &str) -> Result<NaiveTime, BooklineError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| BooklineError::Validation(format!("invalid time: {value}")))
}

/// Parse `YYYY-MM-DD`.
///
/// # Errors
/// Returns `BooklineError::Validation` if `value` is not a date.
pub fn parse_date(value: &str) -> Result<NaiveDate, BooklineError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| BooklineError::Validation(format!("invalid date: {value}")))
}

/// Twelve-hour clock without a leading zero, e.g. `9:00 AM`, `2:30 PM`.
#[must_use]
pub fn format_time_display(time: NaiveTime) -> String {
    let (is_pm, hour) = time.hour12();
    format!("{}:{:02} {}", hour, time.minute(), if is_pm { "PM" } else { "AM" })
}

/// Weekday, month, and day without a leading zero, e.g. `Monday, June 2`.
#[must_use]
pub fn format_date_display(date: NaiveDate) -> String {
    format!("{}, {} {}", date.format("%A"), date.format("%B"), date.day())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn overlap_is_half_open() {
        let busy = BusyInterval::new(at(10, 0), at(11, 0));
        assert!(busy.overlaps(at(10, 30), at(11, 0)));
        assert!(busy.overlaps(at(9, 45), at(10, 15)));
        assert!(!busy.overlaps(at(9, 30), at(10, 0)));
        assert!(!busy.overlaps(at(11, 0), at(11, 30)));
    }

    #[test]
    fn parses_both_time_shapes() {
        assert_eq!(parse_time("09:30").unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(parse_time("14:00:00").unwrap(), NaiveTime::from_hms_opt(14, 0, 0).unwrap());
        assert!(matches!(parse_time("25:00"), Err(BooklineError::Validation(_))));
    }

    #[test]
    fn formats_for_display() {
        assert_eq!(format_time_display(NaiveTime::from_hms_opt(14, 30, 0).unwrap()), "2:30 PM");
        assert_eq!(format_time_display(NaiveTime::from_hms_opt(9, 0, 0).unwrap()), "9:00 AM");
        assert_eq!(format_time_display(NaiveTime::from_hms_opt(12, 0, 0).unwrap()), "12:00 PM");
        assert_eq!(
            format_date_display(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()),
            "Monday, June 2"
        );
    }
}
