//! CalendarSource trait definition.
//!
//! This module defines the [`CalendarSource`] trait, the seam between the
//! adapter and a concrete calendar backend. A source answers two questions:
//! which calendars does the principal have, and which occurrences does one
//! of them hold inside a time window.

use std::future::Future;
use std::pin::Pin;

use famcal_core::TimeWindow;
use serde::Serialize;

use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::RawEventOccurrence;

/// Information about a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarInfo {
    /// Unique identifier for the calendar (the collection URL for CalDAV).
    pub id: String,
    /// Human-readable name of the calendar.
    pub name: String,
    /// Description of the calendar, if available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CalendarInfo {
    /// Creates a new CalendarInfo with the given ID and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The outcome of parsing one occurrence: a value or the reason it was dropped.
pub type OccurrenceResult = ProviderResult<RawEventOccurrence>;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe so the adapter can hold a
/// `Box<dyn CalendarSource>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A read-only calendar backend.
///
/// # Implementation Notes
///
/// - `query_occurrences` must return one entry per concrete instance inside
///   the window, with recurring series already expanded
/// - Per-occurrence failures go into the returned list as `Err` entries; the
///   outer `Err` is reserved for failures that prevent the query as a whole
/// - Implementations never create, modify or delete events
pub trait CalendarSource: Send + Sync {
    /// Returns the name/type of this source (e.g., "caldav").
    fn name(&self) -> &str;

    /// Lists the calendars available to the authenticated principal.
    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarInfo>>>;

    /// Fetches the occurrences of `calendar` that overlap `window`.
    fn query_occurrences<'a>(
        &'a self,
        calendar: &'a CalendarInfo,
        window: TimeWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<OccurrenceResult>>>;
}

/// A source that always fails.
///
/// Stands in for a source that could not be constructed, so the failure is
/// reported through the normal degraded-fetch path.
#[derive(Debug)]
pub struct ErrorSource {
    name: String,
    error: ProviderError,
}

impl ErrorSource {
    /// Creates a new error source.
    pub fn new(name: impl Into<String>, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }

    fn error(&self) -> ProviderError {
        ProviderError::new(self.error.code(), self.error.message()).with_provider(&self.name)
    }
}

impl CalendarSource for ErrorSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarInfo>>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

    fn query_occurrences<'a>(
        &'a self,
        _calendar: &'a CalendarInfo,
        _window: TimeWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<OccurrenceResult>>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }
}
