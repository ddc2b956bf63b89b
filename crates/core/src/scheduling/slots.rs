//! Pure slot-grid arithmetic
//!
//! Everything here works on tenant wall-clock time. No I/O.

use bookline_domain::{Appointment, BusinessHours, BusyInterval};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Candidate start times for `date`: every `slot_minutes` from opening while
/// the slot still ends at or before closing. Closed days yield nothing.
#[must_use]
pub fn candidate_grid(hours: &BusinessHours, slot_minutes: u32, date: NaiveDate) -> Vec<NaiveTime> {
    let Some(window) = hours.for_weekday(date.weekday()) else {
        return Vec::new();
    };
    if slot_minutes == 0 {
        return Vec::new();
    }

    let step = Duration::minutes(i64::from(slot_minutes));
    let close = date.and_time(window.close);
    let mut cursor = date.and_time(window.open);
    let mut grid = Vec::new();

    while cursor + step <= close {
        grid.push(cursor.time());
        cursor += step;
    }
    grid
}

/// Whether an appointment of `duration_minutes` starting at `time` fits
/// inside the opening window for `date`.
#[must_use]
pub fn fits_business_hours(
    hours: &BusinessHours,
    date: NaiveDate,
    time: NaiveTime,
    duration_minutes: u32,
) -> bool {
    let Some(window) = hours.for_weekday(date.weekday()) else {
        return false;
    };
    let start = date.and_time(time);
    let end = start + Duration::minutes(i64::from(duration_minutes));
    start >= date.and_time(window.open) && end <= date.and_time(window.close)
}

/// `[start, end)` of a slot.
#[must_use]
pub fn slot_window(date: NaiveDate, time: NaiveTime, minutes: u32) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(time);
    (start, start + Duration::minutes(i64::from(minutes)))
}

/// Drop candidates that overlap any active local appointment.
#[must_use]
pub fn subtract_appointments(
    grid: Vec<NaiveTime>,
    date: NaiveDate,
    slot_minutes: u32,
    appointments: &[Appointment],
) -> Vec<NaiveTime> {
    let occupied: Vec<BusyInterval> = appointments
        .iter()
        .filter(|appointment| appointment.status.is_active() && appointment.date == date)
        .map(|appointment| {
            // A zero-length record still blocks its own start time.
            let minutes = appointment.duration_minutes.max(1);
            let (start, end) = slot_window(appointment.date, appointment.time, minutes);
            BusyInterval::new(start, end)
        })
        .collect();

    subtract_busy(grid, date, slot_minutes, &occupied)
}

/// Drop candidates whose `[start, end)` overlaps a busy interval. Abutting
/// boundaries do not count as overlap.
#[must_use]
pub fn subtract_busy(
    grid: Vec<NaiveTime>,
    date: NaiveDate,
    slot_minutes: u32,
    busy: &[BusyInterval],
) -> Vec<NaiveTime> {
    grid.into_iter()
        .filter(|time| {
            let (start, end) = slot_window(date, *time, slot_minutes);
            !busy.iter().any(|interval| interval.overlaps(start, end))
        })
        .collect()
}

/// Keep candidates the remote system of record also reports as free.
#[must_use]
pub fn intersect(grid: Vec<NaiveTime>, remote_free: &[NaiveTime]) -> Vec<NaiveTime> {
    grid.into_iter().filter(|time| remote_free.contains(time)).collect()
}
