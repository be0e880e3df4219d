//! Calendar selection and windowed fetching.
//!
//! [`CalendarAdapter`] is the boundary between a [`CalendarSource`] and the
//! rest of the application. It picks a calendar, queries a window and hands
//! back a [`FetchReport`]. A fetch never fails: an unreachable server, an
//! empty principal or an unparseable event all degrade to fewer (possibly
//! zero) occurrences plus a logged warning.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use famcal_core::TimeWindow;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{CalendarInfo, CalendarSource};
use crate::raw_event::RawEventOccurrence;

/// Picks the calendar to query.
///
/// Returns the first calendar whose name contains `name_filter`
/// (case-insensitive), or the first calendar when there is no filter or
/// nothing matches. Returns `None` only for an empty list.
pub fn select_calendar<'a>(
    calendars: &'a [CalendarInfo],
    name_filter: Option<&str>,
) -> Option<&'a CalendarInfo> {
    let filter = name_filter
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_lowercase);

    if let Some(filter) = filter {
        if let Some(found) = calendars
            .iter()
            .find(|c| c.name.to_lowercase().contains(&filter))
        {
            return Some(found);
        }
        debug!(filter = %filter, "No calendar name matched, using the first calendar");
    }

    calendars.first()
}

/// The outcome of one windowed fetch.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// The calendar that was queried, if one could be selected.
    pub calendar: Option<CalendarInfo>,
    /// Occurrences that parsed and overlap the window, in fetch order.
    pub occurrences: Vec<RawEventOccurrence>,
    /// Per-occurrence failures that were skipped.
    pub dropped: Vec<ProviderError>,
    /// The failure that emptied the result, if any.
    pub warning: Option<ProviderError>,
}

impl FetchReport {
    fn failed(error: ProviderError) -> Self {
        Self {
            warning: Some(error),
            ..Self::default()
        }
    }

    /// Returns true if the whole fetch failed.
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}

/// The calendars a source exposes and the one selected from them.
#[derive(Debug, Clone)]
pub struct CalendarSelection {
    /// Every calendar the principal can see.
    pub calendars: Vec<CalendarInfo>,
    /// The calendar that queries will use.
    pub selected: CalendarInfo,
}

/// Queries one calendar of a [`CalendarSource`] for a time window.
pub struct CalendarAdapter {
    source: Box<dyn CalendarSource>,
    name_filter: Option<String>,
}

impl CalendarAdapter {
    /// Creates an adapter over `source`.
    pub fn new(source: impl CalendarSource + 'static, name_filter: Option<String>) -> Self {
        Self {
            source: Box::new(source),
            name_filter,
        }
    }

    /// Creates an adapter backed by a CalDAV server.
    ///
    /// If the HTTP client cannot be built, the adapter is still returned and
    /// every fetch reports the construction error.
    #[cfg(feature = "caldav")]
    pub fn caldav(target: crate::CalendarTarget) -> Self {
        use crate::caldav::CalDavSource;
        use crate::provider::ErrorSource;

        let name_filter = target.calendar_name.clone();
        match CalDavSource::new(target) {
            Ok(source) => Self::new(source, name_filter),
            Err(e) => {
                warn!(error = %e, "Failed to create CalDAV client");
                Self::new(ErrorSource::new("caldav", e), name_filter)
            }
        }
    }

    /// Returns the name of the underlying source.
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Returns the configured calendar name filter.
    pub fn name_filter(&self) -> Option<&str> {
        self.name_filter.as_deref()
    }

    /// Lists calendars and selects one.
    ///
    /// # Errors
    ///
    /// Returns the source error if listing fails, or `CalendarNotFound` when
    /// the principal has no calendars.
    pub async fn resolve_calendar(&self) -> ProviderResult<CalendarSelection> {
        let calendars = self.source.list_calendars().await?;
        debug!(count = calendars.len(), "Listed calendars");

        let selected = select_calendar(&calendars, self.name_filter())
            .cloned()
            .ok_or_else(|| {
                ProviderError::calendar_not_found("no calendars found")
                    .with_provider(self.source.name())
            })?;

        Ok(CalendarSelection {
            calendars,
            selected,
        })
    }

    /// Fetches the occurrences that overlap `window_days` days from
    /// `window_start`.
    ///
    /// The timezone of `window_start` is used to place floating and
    /// date-only occurrences when checking them against the window.
    pub async fn fetch_occurrences(
        &self,
        window_start: DateTime<Tz>,
        window_days: u32,
    ) -> FetchReport {
        let window = TimeWindow::from_days(&window_start, window_days);
        let tz = window_start.timezone();

        let selection = match self.resolve_calendar().await {
            Ok(selection) => selection,
            Err(e) => {
                warn!(error = %e, "Could not select a calendar");
                return FetchReport::failed(e);
            }
        };
        let calendar = selection.selected;
        info!(calendar = %calendar.name, days = window_days, "Fetching events");

        let results = match self.source.query_occurrences(&calendar, window).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, calendar = %calendar.name, "Failed to fetch events");
                return FetchReport {
                    calendar: Some(calendar),
                    ..FetchReport::failed(e)
                };
            }
        };

        let mut report = FetchReport {
            calendar: Some(calendar),
            ..FetchReport::default()
        };
        for result in results {
            match result {
                Ok(occurrence) if overlaps_window(&occurrence, &window, &tz) => {
                    report.occurrences.push(occurrence);
                }
                Ok(occurrence) => {
                    debug!(uid = ?occurrence.uid, "Skipping occurrence outside the window");
                }
                Err(e) => {
                    warn!(error = %e, "Skipping event that could not be parsed");
                    report.dropped.push(e);
                }
            }
        }

        debug!(
            kept = report.occurrences.len(),
            dropped = report.dropped.len(),
            "Fetch complete"
        );
        report
    }
}

impl std::fmt::Debug for CalendarAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarAdapter")
            .field("source", &self.source.name())
            .field("name_filter", &self.name_filter)
            .finish()
    }
}

/// Returns true if any part of the occurrence falls inside the window.
///
/// An all-day occurrence without an end covers its whole day. Occurrences
/// that cannot be placed in time are kept and left to the normalizer.
fn overlaps_window(occurrence: &RawEventOccurrence, window: &TimeWindow, tz: &Tz) -> bool {
    let Some(start) = occurrence.start.resolve(tz) else {
        return true;
    };
    let end = match occurrence.end.and_then(|end| end.resolve(tz)) {
        Some(end) => Some(end),
        None if occurrence.is_all_day() => Some(start + Duration::days(1)),
        None => None,
    };
    window.overlaps(
        start.with_timezone(&chrono::Utc),
        end.map(|e| e.with_timezone(&chrono::Utc)),
    )
}
