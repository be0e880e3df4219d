//! The canonical in-memory event.
//!
//! [`NormalizedEvent`] is what the normalizer produces from raw provider
//! occurrences: every field defaulted, every time timezone-aware.

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

/// Summary used when an event has none.
pub const DEFAULT_SUMMARY: &str = "Untitled Event";

/// A provider-agnostic, timezone-aware calendar event.
///
/// Times keep the zone they were authored in when one was known; naive and
/// all-day values carry the display timezone. All-day events start (and end,
/// when they have an end) at midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedEvent {
    /// The event title.
    pub summary: String,
    /// When the event starts.
    pub start: DateTime<Tz>,
    /// When the event ends, if the source gave an end.
    pub end: Option<DateTime<Tz>>,
    /// The event location, empty when absent.
    pub location: String,
    /// The event description, empty when absent.
    pub description: String,
    /// Whether the source start was a pure date.
    pub is_all_day: bool,
}

impl NormalizedEvent {
    /// Creates a timed event with default summary, location and description.
    pub fn new(start: DateTime<Tz>) -> Self {
        Self {
            summary: DEFAULT_SUMMARY.to_string(),
            start,
            end: None,
            location: String::new(),
            description: String::new(),
            is_all_day: false,
        }
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Builder method to set the end.
    pub fn with_end(mut self, end: DateTime<Tz>) -> Self {
        self.end = Some(end);
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder method to mark the event as all-day.
    pub fn with_all_day(mut self, is_all_day: bool) -> Self {
        self.is_all_day = is_all_day;
        self
    }

    /// Returns the start converted to `tz`.
    pub fn start_in(&self, tz: &Tz) -> DateTime<Tz> {
        self.start.with_timezone(tz)
    }

    /// Returns the end converted to `tz`.
    pub fn end_in(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        self.end.map(|end| end.with_timezone(tz))
    }
}
