//! Client-side recurrence expansion.
//!
//! Used when a server ignores `<c:expand>` and returns a master VEVENT with
//! its RRULE. The series is expanded with the `rrule` crate; EXDATEs and
//! instances replaced by a RECURRENCE-ID override are skipped, and each
//! instance keeps the master's duration.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use famcal_core::{TimeWindow, localize, midnight};
use rrule::RRuleSet;
use tracing::{debug, warn};

use crate::provider::OccurrenceResult;
use crate::raw_event::{RawEventOccurrence, RawEventTime};

use super::ics::ParsedEvent;

/// Upper bound on instances generated per series.
const MAX_INSTANCES: u16 = 1000;

const ICAL_LOCAL: &str = "%Y%m%dT%H%M%S";

/// Expands a master event into its instances overlapping `window`.
///
/// If the rule cannot be parsed, the master is returned as a single
/// occurrence.
pub(crate) fn expand_master(
    master: &ParsedEvent,
    window: &TimeWindow,
    fallback_tz: &Tz,
    overridden: &HashSet<(String, DateTime<Utc>)>,
) -> Vec<OccurrenceResult> {
    let Some(rule) = master.rrule.as_deref() else {
        return vec![Ok(master.occurrence.clone())];
    };
    let occurrence = &master.occurrence;
    let series_tz = match occurrence.start {
        RawEventTime::Zoned(dt) => dt.timezone(),
        _ => *fallback_tz,
    };

    let text = match rrule_text(occurrence.start, rule, &series_tz) {
        Some(text) => text,
        None => {
            warn!(uid = ?occurrence.uid, "Recurring event start cannot be placed, not expanding");
            return vec![Ok(occurrence.clone())];
        }
    };
    let set: RRuleSet = match text.parse() {
        Ok(set) => set,
        Err(e) => {
            warn!(uid = ?occurrence.uid, rule = %rule, error = %e, "Invalid RRULE, not expanding");
            return vec![Ok(occurrence.clone())];
        }
    };

    let length = series_length(occurrence, fallback_tz);
    let utc: rrule::Tz = Utc.into();
    let after = (window.start - length.max(Duration::zero()) - Duration::seconds(1)).with_timezone(&utc);
    let before = (window.end + Duration::seconds(1)).with_timezone(&utc);
    let result = set.after(after).before(before).all(MAX_INSTANCES);
    if result.limited {
        warn!(uid = ?occurrence.uid, limit = MAX_INSTANCES, "Recurrence expansion truncated");
    }

    let excluded: HashSet<DateTime<Utc>> = master
        .exdates
        .iter()
        .filter_map(|exdate| exdate.resolve(fallback_tz))
        .map(|dt| dt.with_timezone(&Utc))
        .collect();

    let mut instances = Vec::new();
    for dt in &result.dates {
        let start = match occurrence.start {
            RawEventTime::Date(_) => RawEventTime::Date(dt.naive_local().date()),
            RawEventTime::Floating(_) => RawEventTime::Floating(dt.naive_local()),
            RawEventTime::Zoned(_) => RawEventTime::Zoned(dt.with_timezone(&series_tz)),
        };
        let Some(instant) = start.resolve(fallback_tz).map(|s| s.with_timezone(&Utc)) else {
            continue;
        };

        if excluded.contains(&instant) {
            debug!(uid = ?occurrence.uid, %instant, "Skipping excluded instance");
            continue;
        }
        if let Some(uid) = &occurrence.uid {
            if overridden.contains(&(uid.clone(), instant)) {
                debug!(uid = %uid, %instant, "Skipping overridden instance");
                continue;
            }
        }

        let end = instance_end(occurrence, start, length);
        let end_instant = end
            .and_then(|e| e.resolve(fallback_tz))
            .map(|e| e.with_timezone(&Utc));
        let end_instant = match (end_instant, start.is_date()) {
            (None, true) => Some(instant + Duration::days(1)),
            (other, _) => other,
        };
        if !window.overlaps(instant, end_instant) {
            continue;
        }

        instances.push(Ok(RawEventOccurrence {
            start,
            end,
            ..occurrence.clone()
        }));
    }

    debug!(
        uid = ?occurrence.uid,
        count = instances.len(),
        "Expanded recurring event"
    );
    instances
}

/// The DTSTART + RRULE text the `rrule` crate parses.
fn rrule_text(start: RawEventTime, rule: &str, series_tz: &Tz) -> Option<String> {
    let dtstart = match start {
        RawEventTime::Date(date) => local_dtstart(series_tz, date.and_hms_opt(0, 0, 0)?),
        RawEventTime::Floating(naive) => local_dtstart(series_tz, naive),
        RawEventTime::Zoned(dt) if dt.timezone() == Tz::UTC => {
            format!("DTSTART:{}Z", dt.format(ICAL_LOCAL))
        }
        RawEventTime::Zoned(dt) => local_dtstart(series_tz, dt.naive_local()),
    };
    Some(format!("{}\nRRULE:{}", dtstart, normalize_until(rule, series_tz)))
}

fn local_dtstart(tz: &Tz, naive: NaiveDateTime) -> String {
    format!("DTSTART;TZID={}:{}", tz.name(), naive.format(ICAL_LOCAL))
}

/// Rewrites a date or floating UNTIL as the UTC instant it denotes in `tz`.
///
/// A date UNTIL includes the whole of that day.
fn normalize_until(rule: &str, tz: &Tz) -> String {
    rule.split(';')
        .map(|part| {
            let Some(value) = part.strip_prefix("UNTIL=") else {
                return part.to_string();
            };
            let until = if value.ends_with('Z') {
                None
            } else if let Ok(date) = NaiveDate::parse_from_str(value, "%Y%m%d") {
                date.succ_opt()
                    .and_then(|next| midnight(next, tz))
                    .map(|dt| dt.with_timezone(&Utc) - Duration::seconds(1))
            } else {
                NaiveDateTime::parse_from_str(value, ICAL_LOCAL)
                    .ok()
                    .and_then(|naive| localize(naive, tz))
                    .map(|dt| dt.with_timezone(&Utc))
            };
            match until {
                Some(until) => format!("UNTIL={}Z", until.format(ICAL_LOCAL)),
                None => part.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// The master's start-to-end span, zero when it has no usable end.
fn series_length(occurrence: &RawEventOccurrence, tz: &Tz) -> Duration {
    match (
        occurrence.start.resolve(tz),
        occurrence.end.and_then(|end| end.resolve(tz)),
    ) {
        (Some(start), Some(end)) => end - start,
        _ => Duration::zero(),
    }
}

fn instance_end(
    master: &RawEventOccurrence,
    start: RawEventTime,
    length: Duration,
) -> Option<RawEventTime> {
    let end = master.end?;
    match (master.start, end, start) {
        (RawEventTime::Date(first), RawEventTime::Date(last), RawEventTime::Date(day)) => {
            day.checked_add_signed(last - first).map(RawEventTime::Date)
        }
        (_, _, RawEventTime::Floating(naive)) => {
            naive.checked_add_signed(length).map(RawEventTime::Floating)
        }
        (_, _, RawEventTime::Zoned(dt)) => dt.checked_add_signed(length).map(RawEventTime::Zoned),
        (_, _, RawEventTime::Date(day)) => day.checked_add_signed(length).map(RawEventTime::Date),
    }
}
