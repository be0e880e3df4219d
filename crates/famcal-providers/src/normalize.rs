//! RawEventOccurrence to NormalizedEvent conversion pipeline.
//!
//! The normalization process:
//! 1. Decides whether the occurrence is all-day (pure-date start)
//! 2. Places start and end in time, attaching the display timezone to dates
//!    and floating values and leaving zoned values alone
//! 3. Fills in default summary, location and description
//! 4. Sorts the batch by start, keeping fetch order for ties

use chrono_tz::Tz;
use famcal_core::{DEFAULT_SUMMARY, NormalizedEvent};
use tracing::warn;

use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::{RawEventOccurrence, RawEventTime};

/// Converts a single [`RawEventOccurrence`] to a [`NormalizedEvent`].
///
/// # Errors
///
/// Returns a `MalformedEvent` error if the start or end cannot be placed in
/// `display_tz`.
pub fn normalize_occurrence(
    raw: &RawEventOccurrence,
    display_tz: &Tz,
) -> ProviderResult<NormalizedEvent> {
    let start = resolve(&raw.start, display_tz, raw, "start")?;
    let end = raw
        .end
        .as_ref()
        .map(|end| resolve(end, display_tz, raw, "end"))
        .transpose()?;

    let summary = raw
        .summary
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_SUMMARY);

    let mut event = NormalizedEvent::new(start)
        .with_summary(summary)
        .with_location(raw.location.clone().unwrap_or_default())
        .with_description(raw.description.clone().unwrap_or_default())
        .with_all_day(raw.is_all_day());
    event.end = end;

    Ok(event)
}

fn resolve(
    time: &RawEventTime,
    display_tz: &Tz,
    raw: &RawEventOccurrence,
    which: &str,
) -> ProviderResult<chrono::DateTime<Tz>> {
    time.resolve(display_tz).ok_or_else(|| {
        ProviderError::malformed_event(format!(
            "{} {:?} of event {} cannot be placed in {}",
            which,
            time,
            raw.uid.as_deref().unwrap_or("<no uid>"),
            display_tz.name()
        ))
    })
}

/// Normalizes a batch of occurrences and sorts it by start.
///
/// Occurrences that fail to normalize are logged and dropped. The sort is
/// stable: occurrences with equal starts keep their input order.
pub fn normalize(occurrences: &[RawEventOccurrence], display_tz: &Tz) -> Vec<NormalizedEvent> {
    let mut events: Vec<NormalizedEvent> = occurrences
        .iter()
        .filter_map(|raw| match normalize_occurrence(raw, display_tz) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(error = %e, "Dropping event that could not be normalized");
                None
            }
        })
        .collect();

    sort_by_start(&mut events);
    events
}

/// Sorts events by start instant, keeping the relative order of ties.
pub fn sort_by_start(events: &mut [NormalizedEvent]) {
    events.sort_by_key(|event| event.start);
}
