//! Raw event occurrences as they come out of a calendar source.
//!
//! A [`RawEventOccurrence`] is one concrete instance of an event: recurring
//! series are already expanded by the time a source hands them over. Times
//! are kept in whatever shape the source used (pure date, floating
//! wall-clock, or zoned) and only get reconciled by the normalizer.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use famcal_core::{NormalizedEvent, localize, midnight};

/// The time specification of a raw occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventTime {
    /// A pure calendar date (all-day).
    Date(NaiveDate),
    /// A wall-clock datetime with no zone attached.
    Floating(NaiveDateTime),
    /// A datetime in a known zone (UTC included).
    Zoned(DateTime<Tz>),
}

impl RawEventTime {
    /// Creates a zoned time from a UTC datetime.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::Zoned(dt.with_timezone(&Tz::UTC))
    }

    /// Returns true if this is a pure date.
    pub fn is_date(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Places this value in time, attaching `tz` to dates and floating values.
    ///
    /// Dates become midnight in `tz`; zoned values are returned unchanged.
    pub fn resolve(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        match self {
            Self::Date(date) => midnight(*date, tz),
            Self::Floating(naive) => localize(*naive, tz),
            Self::Zoned(dt) => Some(*dt),
        }
    }
}

/// One concrete occurrence of a calendar event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEventOccurrence {
    /// The event UID, when the source exposes one.
    pub uid: Option<String>,
    /// The event title.
    pub summary: Option<String>,
    /// When the occurrence starts.
    pub start: RawEventTime,
    /// When the occurrence ends.
    pub end: Option<RawEventTime>,
    /// The event location.
    pub location: Option<String>,
    /// The event description.
    pub description: Option<String>,
}

impl RawEventOccurrence {
    /// Creates an occurrence with only a start.
    pub fn new(start: RawEventTime) -> Self {
        Self {
            uid: None,
            summary: None,
            start,
            end: None,
            location: None,
            description: None,
        }
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the end.
    pub fn with_end(mut self, end: RawEventTime) -> Self {
        self.end = Some(end);
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns true if the occurrence starts on a pure date.
    pub fn is_all_day(&self) -> bool {
        self.start.is_date()
    }
}

/// Feeds a normalized event back in as a raw occurrence.
///
/// All-day events turn back into pure dates; everything else keeps its
/// zoned instant. Normalizing the result reproduces the original event.
impl From<&NormalizedEvent> for RawEventOccurrence {
    fn from(event: &NormalizedEvent) -> Self {
        let as_raw = |dt: DateTime<Tz>| {
            if event.is_all_day {
                RawEventTime::Date(dt.date_naive())
            } else {
                RawEventTime::Zoned(dt)
            }
        };

        Self {
            uid: None,
            summary: Some(event.summary.clone()),
            start: as_raw(event.start),
            end: event.end.map(as_raw),
            location: Some(event.location.clone()),
            description: Some(event.description.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 4).unwrap()
    }

    #[test]
    fn date_resolves_to_local_midnight() {
        let tz = chrono_tz::America::New_York;
        let dt = RawEventTime::Date(sample_date()).resolve(&tz).unwrap();

        assert_eq!(dt.date_naive(), sample_date());
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (0, 0, 0));
        assert_eq!(dt.timezone(), tz);
    }

    #[test]
    fn floating_keeps_wall_clock() {
        let tz = chrono_tz::Europe::Berlin;
        let naive = sample_date().and_hms_opt(9, 15, 0).unwrap();
        let dt = RawEventTime::Floating(naive).resolve(&tz).unwrap();

        assert_eq!(dt.naive_local(), naive);
        assert_eq!(dt.timezone(), tz);
    }

    #[test]
    fn zoned_is_untouched() {
        let utc = Utc.with_ymd_and_hms(2024, 7, 4, 18, 0, 0).unwrap();
        let raw = RawEventTime::from_utc(utc);
        let dt = raw.resolve(&chrono_tz::Asia::Tokyo).unwrap();

        assert_eq!(dt.timezone(), Tz::UTC);
        assert_eq!(dt.hour(), 18);
    }

    #[test]
    fn occurrence_builder() {
        let occurrence = RawEventOccurrence::new(RawEventTime::Date(sample_date()))
            .with_summary("Holiday")
            .with_location("Home")
            .with_description("Fireworks");

        assert!(occurrence.is_all_day());
        assert!(occurrence.uid.is_none());
        assert_eq!(occurrence.summary.as_deref(), Some("Holiday"));
        assert!(occurrence.end.is_none());
    }

    #[test]
    fn from_normalized_all_day() {
        let tz = chrono_tz::America::New_York;
        let start = tz.with_ymd_and_hms(2024, 7, 4, 0, 0, 0).unwrap();
        let event = NormalizedEvent::new(start).with_all_day(true);

        let raw = RawEventOccurrence::from(&event);

        assert_eq!(raw.start, RawEventTime::Date(sample_date()));
        assert_eq!(raw.summary.as_deref(), Some("Untitled Event"));
    }
}
