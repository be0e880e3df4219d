//! iCalendar (RFC 5545) parsing.
//!
//! Turns the `calendar-data` of one CalDAV resource into raw occurrences.
//! Each VEVENT yields either one occurrence, an error, or (for a master
//! event the server did not expand) one occurrence per recurrence instance.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use famcal_core::{TimeWindow, localize};
use icalendar::parser::{Component, Property, read_calendar, unfold};
use icalendar::{CalendarDateTime, DatePerhapsTime};
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::provider::OccurrenceResult;
use crate::raw_event::{RawEventOccurrence, RawEventTime};

use super::expand;

/// A VEVENT reduced to what the adapter needs.
#[derive(Debug, Clone)]
pub(crate) struct ParsedEvent {
    pub occurrence: RawEventOccurrence,
    pub rrule: Option<String>,
    pub exdates: Vec<RawEventTime>,
    pub recurrence_id: Option<RawEventTime>,
}

/// Parses one calendar resource into occurrences overlapping `window`.
///
/// `fallback_tz` places floating and date-only values when expanding
/// recurrences and when matching overridden instances.
pub fn parse_calendar_object(
    ics: &str,
    window: &TimeWindow,
    fallback_tz: &Tz,
) -> Vec<OccurrenceResult> {
    let unfolded = unfold(ics);
    let looks_like_ics = unfolded
        .trim_start_matches('\u{feff}')
        .trim_start()
        .starts_with("BEGIN:VCALENDAR");
    let calendar = match read_calendar(&unfolded) {
        Ok(calendar) if looks_like_ics => calendar,
        _ => {
            return vec![Err(ProviderError::malformed_event(
                "calendar data could not be parsed",
            ))];
        }
    };

    let mut parsed = Vec::new();
    let mut results = Vec::new();
    for vevent in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        if is_cancelled(vevent) {
            debug!(uid = ?find_text(vevent, "UID"), "Skipping cancelled event");
            continue;
        }
        match parse_vevent(vevent) {
            Ok(event) => parsed.push(event),
            Err(e) => results.push(Err(e)),
        }
    }

    let overridden: HashSet<(String, DateTime<Utc>)> = parsed
        .iter()
        .filter_map(|event| {
            let uid = event.occurrence.uid.clone()?;
            let instant = event.recurrence_id?.resolve(fallback_tz)?;
            Some((uid, instant.with_timezone(&Utc)))
        })
        .collect();

    for event in parsed {
        match (&event.rrule, &event.recurrence_id) {
            (Some(_), None) => {
                results.extend(expand::expand_master(&event, window, fallback_tz, &overridden));
            }
            _ => results.push(Ok(event.occurrence)),
        }
    }

    results
}

/// Parses a single VEVENT.
pub(crate) fn parse_vevent(vevent: &Component<'_>) -> Result<ParsedEvent, ProviderError> {
    let uid = find_text(vevent, "UID");
    let start = vevent
        .find_prop("DTSTART")
        .ok_or_else(|| {
            ProviderError::malformed_event(format!(
                "event {} has no DTSTART",
                uid.as_deref().unwrap_or("<no uid>")
            ))
        })
        .and_then(|prop| {
            property_time(prop).ok_or_else(|| {
                ProviderError::malformed_event(format!(
                    "event {} has an unreadable DTSTART: {}",
                    uid.as_deref().unwrap_or("<no uid>"),
                    prop.val.as_ref()
                ))
            })
        })?;

    let end = match vevent.find_prop("DTEND").and_then(property_time) {
        Some(end) => Some(end),
        None => vevent
            .find_prop("DURATION")
            .and_then(|p| parse_duration(p.val.as_ref()))
            .and_then(|duration| add_duration(start, duration)),
    };

    let mut occurrence = RawEventOccurrence::new(start);
    occurrence.uid = uid;
    occurrence.end = end;
    occurrence.summary = find_text(vevent, "SUMMARY");
    occurrence.location = find_text(vevent, "LOCATION");
    occurrence.description = find_text(vevent, "DESCRIPTION");

    let exdates = vevent
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(exdate_values)
        .collect();

    Ok(ParsedEvent {
        occurrence,
        rrule: vevent.find_prop("RRULE").map(|p| p.val.to_string()),
        exdates,
        recurrence_id: vevent.find_prop("RECURRENCE-ID").and_then(property_time),
    })
}

fn is_cancelled(vevent: &Component<'_>) -> bool {
    vevent
        .find_prop("STATUS")
        .is_some_and(|p| p.val.as_ref().trim().eq_ignore_ascii_case("CANCELLED"))
}

fn find_text(vevent: &Component<'_>, name: &str) -> Option<String> {
    vevent
        .find_prop(name)
        .map(|p| unescape_text(p.val.as_ref()))
}

/// Reads a DTSTART-like property.
fn property_time(prop: &Property<'_>) -> Option<RawEventTime> {
    DatePerhapsTime::try_from(prop).ok().map(to_raw_time)
}

fn to_raw_time(value: DatePerhapsTime) -> RawEventTime {
    match value {
        DatePerhapsTime::Date(date) => RawEventTime::Date(date),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => RawEventTime::from_utc(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
            RawEventTime::Floating(naive)
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            match resolve_tzid(&tzid) {
                Some(tz) => match localize(date_time, &tz) {
                    Some(dt) => RawEventTime::Zoned(dt),
                    None => RawEventTime::Floating(date_time),
                },
                None => {
                    warn!(tzid = %tzid, "Unknown time zone, treating time as floating");
                    RawEventTime::Floating(date_time)
                }
            }
        }
    }
}

/// Maps a TZID parameter onto an IANA zone.
///
/// Accepts plain IANA names as well as vendor-prefixed ones such as
/// `/mozilla.org/20050126_1/America/New_York`.
pub(crate) fn resolve_tzid(tzid: &str) -> Option<Tz> {
    let tzid = tzid.trim().trim_matches('"');
    std::iter::once(tzid)
        .chain(tzid.match_indices('/').map(|(i, _)| &tzid[i + 1..]))
        .find_map(|candidate| candidate.parse::<Tz>().ok())
}

/// Expands one EXDATE property, which may hold a comma-separated list.
fn exdate_values(prop: &Property<'_>) -> Vec<RawEventTime> {
    let param = |key: &str| {
        prop.params
            .iter()
            .find(|p| p.key == key)
            .and_then(|p| p.val.as_ref().map(|v| v.to_string()))
    };
    let tz = param("TZID").as_deref().and_then(resolve_tzid);
    let is_date = param("VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            if is_date || s.len() == 8 {
                return chrono::NaiveDate::parse_from_str(s, "%Y%m%d")
                    .ok()
                    .map(RawEventTime::Date);
            }
            if let Some(utc) = s.strip_suffix('Z') {
                return chrono::NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| RawEventTime::from_utc(dt.and_utc()));
            }
            let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").ok()?;
            Some(match tz.as_ref().and_then(|tz| localize(naive, tz)) {
                Some(dt) => RawEventTime::Zoned(dt),
                None => RawEventTime::Floating(naive),
            })
        })
        .collect()
}

/// Parses an RFC 5545 DURATION value such as `PT1H30M` or `P1D`.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (negative, value) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.trim_start_matches('+')),
    };
    let duration: std::time::Duration = iso8601::duration(value).ok()?.into();
    let duration = Duration::from_std(duration).ok()?;
    Some(if negative { -duration } else { duration })
}

/// Adds a DURATION to a start, keeping the start's shape.
fn add_duration(start: RawEventTime, duration: Duration) -> Option<RawEventTime> {
    match start {
        RawEventTime::Date(date) => date
            .checked_add_signed(duration)
            .map(RawEventTime::Date),
        RawEventTime::Floating(naive) => naive
            .checked_add_signed(duration)
            .map(RawEventTime::Floating),
        RawEventTime::Zoned(dt) => dt.checked_add_signed(duration).map(RawEventTime::Zoned),
    }
}

/// Undoes RFC 5545 TEXT escaping.
pub(crate) fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
