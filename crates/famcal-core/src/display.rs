//! Presentation-ready projection of normalized events.
//!
//! [`DisplayEvent`] carries pre-formatted labels so front ends never touch
//! timezone arithmetic. Every label is derived from the event's start (and
//! end) converted to the display timezone.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::event::NormalizedEvent;

/// Time label used for all-day events.
pub const ALL_DAY_LABEL: &str = "All Day";

/// Long date format: `Tuesday, March 05, 2024`.
const LONG_DATE_FORMAT: &str = "%A, %B %d, %Y";

/// 12-hour clock format: `02:30 PM`.
const CLOCK_FORMAT: &str = "%I:%M %p";

/// ISO date used as the grouping key.
const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Display events keyed by ISO date, in ascending key order.
pub type EventsByDate = BTreeMap<String, Vec<DisplayEvent>>;

/// A display-ready event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayEvent {
    pub summary: String,
    /// Long form date, e.g. `Tuesday, March 05, 2024`.
    pub date_str: String,
    /// `All Day`, `02:30 PM` or `02:30 PM - 03:00 PM`.
    pub time_str: String,
    pub location: String,
    pub description: String,
    /// ISO `YYYY-MM-DD` of the start, used for grouping.
    pub date: String,
    pub day_of_week: String,
    pub day: u32,
    pub month: String,
    pub all_day: bool,
}

impl DisplayEvent {
    /// Projects a normalized event into display labels in `tz`.
    pub fn from_event(event: &NormalizedEvent, tz: &Tz) -> Self {
        let start = event.start_in(tz);

        let time_str = if event.is_all_day {
            ALL_DAY_LABEL.to_string()
        } else {
            time_label(&start, event.end_in(tz).as_ref())
        };

        Self {
            summary: event.summary.clone(),
            date_str: start.format(LONG_DATE_FORMAT).to_string(),
            time_str,
            location: event.location.clone(),
            description: event.description.clone(),
            date: date_key(&start),
            day_of_week: start.format("%A").to_string(),
            day: start.day(),
            month: start.format("%B").to_string(),
            all_day: event.is_all_day,
        }
    }
}

/// Formats the time label of a timed event.
fn time_label(start: &DateTime<Tz>, end: Option<&DateTime<Tz>>) -> String {
    let start_label = start.format(CLOCK_FORMAT);
    match end {
        Some(end) => format!("{} - {}", start_label, end.format(CLOCK_FORMAT)),
        None => start_label.to_string(),
    }
}

/// Returns the ISO grouping key of a datetime.
pub fn date_key(dt: &DateTime<Tz>) -> String {
    dt.format(DATE_KEY_FORMAT).to_string()
}

/// Projects a sequence of normalized events, preserving order.
pub fn to_display(events: &[NormalizedEvent], tz: &Tz) -> Vec<DisplayEvent> {
    events
        .iter()
        .map(|event| DisplayEvent::from_event(event, tz))
        .collect()
}

/// Partitions display events by their date key.
///
/// Events keep their relative order inside each group.
pub fn group_by_date(events: &[DisplayEvent]) -> EventsByDate {
    let mut groups = EventsByDate::new();
    for event in events {
        groups
            .entry(event.date.clone())
            .or_default()
            .push(event.clone());
    }
    groups
}

/// Concatenates groups in key order.
pub fn flatten_groups(groups: &EventsByDate) -> Vec<DisplayEvent> {
    groups.values().flatten().cloned().collect()
}
