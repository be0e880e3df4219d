//! Time types for calendar queries.
//!
//! This module provides [`TimeWindow`] for defining query ranges and the
//! helpers that place wall-clock values into a display timezone
//! ([`localize`], [`midnight`]).

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Attaches `tz` to a naive wall-clock value without converting it.
///
/// Ambiguous values (DST overlap) resolve to the earlier instant. Values that
/// fall in a DST gap are shifted forward by one hour, which lands them on the
/// first valid wall-clock time after the transition.
///
/// Returns `None` only if the value cannot be placed even after the shift.
pub fn localize(naive: NaiveDateTime, tz: &Tz) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}

/// Returns midnight of `date` in `tz`.
///
/// Where the zone skips midnight (e.g. America/Santiago springs forward at
/// 00:00), this is the first instant of the day instead, 01:00.
pub fn midnight(date: NaiveDate, tz: &Tz) -> Option<DateTime<Tz>> {
    localize(date.and_time(NaiveTime::MIN), tz)
}

/// A time window for querying calendar events.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
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

    /// Creates a window of `days` calendar days beginning at `start`.
    pub fn from_days<Z: TimeZone>(start: &DateTime<Z>, days: u32) -> Self {
        let start = start.with_timezone(&Utc);
        Self::from_duration(start, Duration::days(i64::from(days)))
    }

    /// Creates a window of `days` days beginning at midnight of the day
    /// containing `now` in `tz`.
    ///
    /// Falls back to `now` itself when local midnight does not exist.
    pub fn days_from_midnight(now: DateTime<Utc>, tz: &Tz, days: u32) -> Self {
        let today = now.with_timezone(tz).date_naive();
        match midnight(today, tz) {
            Some(start) => Self::from_days(&start, days),
            None => Self::from_days(&now, days),
        }
    }

    /// Returns the duration of this time window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Checks if a datetime falls within this window.
    ///
    /// Uses half-open interval semantics: `[start, end)`.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.start <= dt && dt < self.end
    }

    /// Checks if a span overlaps this window.
    ///
    /// A span without an end (or with an end not after its start) is treated
    /// as a single instant and must fall inside the window.
    pub fn overlaps(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> bool {
        match end {
            Some(end) if end > start => start < self.end && end > self.start,
            _ => self.contains(start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    mod localize {
        use super::*;

        #[test]
        fn keeps_wall_clock() {
            let tz = chrono_tz::America::New_York;
            let dt = localize(naive(2024, 3, 5, 14, 30), &tz).unwrap();
            assert_eq!(dt.hour(), 14);
            assert_eq!(dt.minute(), 30);
            assert_eq!(dt.with_timezone(&Utc), utc(2024, 3, 5, 19, 30, 0));
        }

        #[test]
        fn dst_gap_moves_forward() {
            // 2024-03-10 02:30 does not exist in New York.
            let tz = chrono_tz::America::New_York;
            let dt = localize(naive(2024, 3, 10, 2, 30), &tz).unwrap();
            assert_eq!(dt.hour(), 3);
            assert_eq!(dt.minute(), 30);
        }

        #[test]
        fn dst_overlap_takes_earliest() {
            // 2024-11-03 01:30 happens twice in New York.
            let tz = chrono_tz::America::New_York;
            let dt = localize(naive(2024, 11, 3, 1, 30), &tz).unwrap();
            assert_eq!(dt.with_timezone(&Utc), utc(2024, 11, 3, 5, 30, 0));
        }

        #[test]
        fn midnight_of_date() {
            let tz = chrono_tz::Europe::Paris;
            let date = NaiveDate::from_ymd_opt(2024, 7, 4).unwrap();
            let dt = midnight(date, &tz).unwrap();
            assert_eq!(dt.date_naive(), date);
            assert_eq!((dt.hour(), dt.minute(), dt.second()), (0, 0, 0));
        }

        #[test]
        fn skipped_midnight_starts_at_first_instant() {
            // Clocks in Santiago jump from 00:00 to 01:00 on 2024-09-08.
            let tz = chrono_tz::America::Santiago;
            let date = NaiveDate::from_ymd_opt(2024, 9, 8).unwrap();
            let dt = midnight(date, &tz).unwrap();
            assert_eq!(dt.date_naive(), date);
            assert_eq!((dt.hour(), dt.minute(), dt.second()), (1, 0, 0));
            assert_eq!(dt.with_timezone(&Utc), utc(2024, 9, 8, 4, 0, 0));
        }
    }

    mod time_window {
        use super::*;

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
            TimeWindow::new(utc(2025, 2, 5, 17, 0, 0), utc(2025, 2, 5, 9, 0, 0));
        }

        #[test]
        fn contains_datetime() {
            let window = TimeWindow::new(utc(2025, 2, 5, 9, 0, 0), utc(2025, 2, 5, 17, 0, 0));

            assert!(window.contains(utc(2025, 2, 5, 10, 0, 0)));
            assert!(window.contains(utc(2025, 2, 5, 9, 0, 0))); // start inclusive
            assert!(!window.contains(utc(2025, 2, 5, 17, 0, 0))); // end exclusive
            assert!(!window.contains(utc(2025, 2, 5, 8, 59, 59)));
        }

        #[test]
        fn overlapping_spans() {
            let window = TimeWindow::new(utc(2025, 2, 5, 9, 0, 0), utc(2025, 2, 5, 17, 0, 0));

            // Starts before, ends inside
            assert!(window.overlaps(utc(2025, 2, 5, 8, 0, 0), Some(utc(2025, 2, 5, 10, 0, 0))));
            // Contains the window
            assert!(window.overlaps(utc(2025, 2, 4, 0, 0, 0), Some(utc(2025, 2, 6, 0, 0, 0))));
            // Ends exactly at window start
            assert!(!window.overlaps(utc(2025, 2, 5, 8, 0, 0), Some(utc(2025, 2, 5, 9, 0, 0))));
            // Starts exactly at window end
            assert!(!window.overlaps(utc(2025, 2, 5, 17, 0, 0), Some(utc(2025, 2, 5, 18, 0, 0))));
            // Instant without end
            assert!(window.overlaps(utc(2025, 2, 5, 12, 0, 0), None));
            assert!(!window.overlaps(utc(2025, 2, 5, 18, 0, 0), None));
        }

        #[test]
        fn days_from_local_midnight() {
            let tz = chrono_tz::America::New_York;
            // 03:00 UTC on the 6th is still the 5th in New York.
            let now = utc(2024, 3, 6, 3, 0, 0);
            let window = TimeWindow::days_from_midnight(now, &tz, 14);

            assert_eq!(window.start, utc(2024, 3, 5, 5, 0, 0));
            assert_eq!(window.duration(), Duration::days(14));
        }

        #[test]
        fn serde_roundtrip() {
            let window = TimeWindow::new(utc(2025, 2, 5, 9, 0, 0), utc(2025, 2, 5, 17, 0, 0));
            let json = serde_json::to_string(&window).unwrap();
            let parsed: TimeWindow = serde_json::from_str(&json).unwrap();
            assert_eq!(window, parsed);
        }
    }
}
