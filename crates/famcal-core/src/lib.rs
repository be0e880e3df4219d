//! Core types: time windows, normalized events, display formatting

pub mod display;
pub mod event;
pub mod time;
pub mod tracing;

pub use display::{
    ALL_DAY_LABEL, DisplayEvent, EventsByDate, date_key, flatten_groups, group_by_date, to_display,
};
pub use event::{DEFAULT_SUMMARY, NormalizedEvent};
pub use time::{TimeWindow, localize, midnight};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
