//! Calendar sources, the fetch adapter and event normalization.
//!
//! This crate turns a remote calendar into sorted [`NormalizedEvent`]s:
//!
//! - [`CalendarSource`] - The trait calendar backends implement
//! - [`CalendarAdapter`] - Picks a calendar and fetches a window, never failing
//! - [`RawEventOccurrence`] - One concrete event instance as the source saw it
//! - [`normalize`] - Reconciles time zones and defaults, then sorts
//! - [`ProviderError`] - Error types for source operations
//!
//! # Architecture
//!
//! ```text
//!   ┌─────────────────┐
//!   │  CalDAV Server  │
//!   └────────┬────────┘
//!            │ PROPFIND / REPORT
//!            ▼
//!   ┌─────────────────┐
//!   │  CalDavSource   │  CalendarSource
//!   └────────┬────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │ CalendarAdapter │ ──▶ FetchReport { occurrences, dropped, warning }
//!   └────────┬────────┘
//!            │
//!            ▼ normalize()
//!   ┌──────────────────┐
//!   │ NormalizedEvent  │
//!   └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use famcal_providers::{CalendarAdapter, CalendarTarget, normalize};
//!
//! let target = CalendarTarget::new("https://dav.example.com/calendars/anna/")?
//!     .with_credentials("anna", "secret");
//! let adapter = CalendarAdapter::caldav(target);
//! let report = adapter.fetch_occurrences(start, 14).await;
//! let events = normalize(&report.occurrences, &tz);
//! ```
//!
//! [`NormalizedEvent`]: famcal_core::NormalizedEvent

pub mod adapter;
#[cfg(feature = "caldav")]
pub mod caldav;
pub mod error;
pub mod normalize;
pub mod provider;
pub mod raw_event;
pub mod target;

// Re-export main types at crate root
pub use adapter::{CalendarAdapter, CalendarSelection, FetchReport, select_calendar};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult, describe_chain};
pub use normalize::{normalize, normalize_occurrence, sort_by_start};
pub use provider::{BoxFuture, CalendarInfo, CalendarSource, ErrorSource, OccurrenceResult};
pub use raw_event::{RawEventOccurrence, RawEventTime};
pub use target::CalendarTarget;
