//! Query windows for calendar fetches.
//!
//! [`TimeWindow`] is the caller-supplied date range every source is asked
//! to fill.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A time window for querying calendar events.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// # Panics
    ///
    /// Panics if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "TimeWindow start must be <= end");
        Self { start, end }
    }

    /// Creates a time window from a start time and duration.
    pub fn from_duration(start: DateTime<Utc>, duration: Duration) -> Self {
        Self::new(start, start + duration)
    }

    /// Creates a window from the start of today (in `tz`) spanning `days` days.
    ///
    /// Falls back to `now` as the start when local midnight does not exist
    /// (DST gap at midnight).
    pub fn upcoming_days<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz, days: u32) -> Self {
        let today = now.with_timezone(tz).date_naive();
        let start = local_midnight(today, tz).unwrap_or(now);
        Self::from_duration(start, Duration::days(i64::from(days)))
    }

    /// Returns the duration of this time window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn creation() {
        let start = utc(2025, 2, 5, 9, 0, 0);
        let end = utc(2025, 2, 5, 17, 0, 0);
        let window = TimeWindow::new(start, end);
        assert_eq!(window.start, start);
        assert_eq!(window.end, end);
        assert_eq!(window.duration(), Duration::hours(8));
    }

    #[test]
    #[should_panic(expected = "start must be <= end")]
    fn invalid_window() {
        let start = utc(2025, 2, 5, 17, 0, 0);
        let end = utc(2025, 2, 5, 9, 0, 0);
        TimeWindow::new(start, end);
    }

    #[test]
    fn upcoming_days_starts_at_local_midnight() {
        let now = utc(2025, 2, 5, 15, 30, 0);
        let window = TimeWindow::upcoming_days(now, &Utc, 7);
        assert_eq!(window.start, utc(2025, 2, 5, 0, 0, 0));
        assert_eq!(window.end, utc(2025, 2, 12, 0, 0, 0));

        // 01:00 UTC is still the previous day at UTC-5
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let window = TimeWindow::upcoming_days(utc(2025, 2, 5, 1, 0, 0), &tz, 1);
        assert_eq!(window.start, utc(2025, 2, 4, 5, 0, 0));
        assert_eq!(window.duration(), Duration::days(1));
    }

    #[test]
    fn serde_roundtrip() {
        let window = TimeWindow::new(utc(2025, 2, 5, 9, 0, 0), utc(2025, 2, 5, 17, 0, 0));
        let json = serde_json::to_string(&window).unwrap();
        let parsed: TimeWindow = serde_json::from_str(&json).unwrap();
        assert_eq!(window, parsed);
    }
}
