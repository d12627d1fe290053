//! Timestamp and calendar-day utilities
//!
//! Streaks and daily totals are computed over the user's local calendar
//! days. Local time is a fixed UTC offset taken from the user's profile.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};

/// Largest accepted offset magnitude (UTC-14:00 .. UTC+14:00)
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Build a fixed offset from minutes east of UTC
///
/// Out-of-range values fall back to UTC.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    if minutes.abs() > MAX_UTC_OFFSET_MINUTES {
        return Utc.fix();
    }
    FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix())
}

/// Calendar date of an instant in the given local offset
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// Whether `later` is exactly the calendar day after `earlier`
pub fn is_next_day(earlier: NaiveDate, later: NaiveDate) -> bool {
    earlier.succ_opt() == Some(later)
}

/// First date of the inclusive `days`-long window ending on `end`
pub fn window_start(end: NaiveDate, days: u32) -> NaiveDate {
    end - Duration::days(i64::from(days.saturating_sub(1)))
}
