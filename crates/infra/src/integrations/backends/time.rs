//! Conversion between tenant wall-clock time and backend timestamps

use bookline_domain::{BooklineError, DateRange, Result};
use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone,
    Utc,
};
use chrono_tz::Tz;

/// Instant of a local wall-clock time in `tz`.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant. Times in a
/// DST gap are moved forward by the gap, the way clocks read after the jump.
///
/// # Errors
/// Returns `Validation` if the wall-clock time does not exist in `tz`.
pub fn to_utc(tz: Tz, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                BooklineError::Validation(format!("{naive} does not exist in timezone {tz}"))
            }),
    }
}

/// Wall-clock time in `tz` of an instant.
#[must_use]
pub fn to_local(tz: Tz, instant: DateTime<Utc>) -> NaiveDateTime {
    instant.with_timezone(&tz).naive_local()
}

/// RFC 3339 rendering with the tenant's offset, second precision.
///
/// # Errors
/// Returns `Validation` if the wall-clock time does not exist in `tz`.
pub fn to_offset_string(tz: Tz, date: NaiveDate, time: NaiveTime) -> Result<String> {
    Ok(to_utc(tz, date, time)?.with_timezone(&tz).to_rfc3339_opts(SecondsFormat::Secs, false))
}

/// RFC 3339 rendering in UTC with a `Z` suffix.
#[must_use]
pub fn to_zulu_string(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a backend timestamp. Accepts RFC 3339 and epoch milliseconds.
///
/// # Errors
/// Returns `RemoteUnavailable` if `value` is not RFC 3339.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(millis) = trimmed.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp_millis(millis) {
            return Ok(dt);
        }
    }
    Err(BooklineError::RemoteUnavailable(format!("unrecognised timestamp from backend: {trimmed}")))
}

/// Half-open UTC window covering the whole local day.
///
/// # Errors
/// Returns `Validation` if midnight does not exist in `tz`.
pub fn day_bounds(tz: Tz, date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let next = date.succ_opt().ok_or_else(|| BooklineError::Validation(format!("date out of range: {date}")))?;
    Ok((to_utc(tz, date, NaiveTime::MIN)?, to_utc(tz, next, NaiveTime::MIN)?))
}

/// Half-open UTC window covering every local day of `range`.
///
/// # Errors
/// Returns `Validation` if midnight does not exist in `tz`.
pub fn range_bounds(tz: Tz, range: DateRange) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let (start, _) = day_bounds(tz, range.start)?;
    let (_, end) = day_bounds(tz, range.end)?;
    Ok((start, end))
}

/// Whole minutes between two instants, never less than one.
#[must_use]
pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>, fallback: u32) -> u32 {
    let minutes = (end - start).num_minutes();
    if minutes <= 0 {
        fallback
    } else {
        u32::try_from(minutes).unwrap_or(fallback)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::Timelike;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn converts_local_to_utc_across_dst() {
        let tz: Tz = "America/New_York".parse().unwrap();

        let winter = to_utc(tz, date(2025, 1, 15), time(10, 0)).unwrap();
        assert_eq!(winter.hour(), 15);

        let summer = to_utc(tz, date(2025, 7, 15), time(10, 0)).unwrap();
        assert_eq!(summer.hour(), 14);
    }

    #[test]
    fn gap_times_move_forward() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // 02:30 does not exist on 2025-03-09.
        let instant = to_utc(tz, date(2025, 3, 9), time(2, 30)).unwrap();
        assert_eq!(to_local(tz, instant).time(), time(3, 30));
    }

    #[test]
    fn ambiguous_times_take_the_earlier_instant() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let instant = to_utc(tz, date(2025, 11, 2), time(1, 30)).unwrap();
        // EDT is still in effect for the first 01:30.
        assert_eq!(instant.hour(), 5);
    }

    #[test]
    fn offset_string_carries_tenant_offset() {
        let tz: Tz = "America/Chicago".parse().unwrap();
        let rendered = to_offset_string(tz, date(2025, 1, 6), time(9, 0)).unwrap();
        assert_eq!(rendered, "2025-01-06T09:00:00-06:00");
    }

    #[test]
    fn parses_rfc3339_and_millis() {
        let a = parse_instant("2025-01-06T15:00:00Z").unwrap();
        let b = parse_instant("2025-01-06T10:00:00-05:00").unwrap();
        let c = parse_instant(&a.timestamp_millis().to_string()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert!(parse_instant("next tuesday").is_err());
    }

    #[test]
    fn day_bounds_follow_local_midnight() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let (start, end) = day_bounds(tz, date(2025, 3, 9)).unwrap();
        assert_eq!(start.hour(), 5);
        // DST starts that day, so the local day is 23 hours long.
        assert_eq!((end - start).num_hours(), 23);
    }

    #[test]
    fn duration_falls_back_when_not_positive() {
        let start = parse_instant("2025-01-06T15:00:00Z").unwrap();
        let end = parse_instant("2025-01-06T15:45:00Z").unwrap();
        assert_eq!(duration_minutes(start, end, 30), 45);
        assert_eq!(duration_minutes(end, start, 30), 30);
    }
}
