//! Connection diagnostics.
//!
//! [`ConnectionStatus`] is what `famcal status` prints: whether the server
//! answered, which calendars it offered and which one would be used.

use std::sync::LazyLock;

use regex::RegexSet;
use serde::Serialize;

use famcal_providers::{CalendarInfo, CalendarSelection, ProviderError};

use crate::config::Settings;

/// Shown when no calendar name is configured.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Appended to errors that look like a DNS failure.
pub const DNS_HINT: &str = " (Check your CalDAV URL in config.toml. Samsung Cloud URLs are not supported; use Google Calendar instead.)";

/// Messages produced by resolvers and HTTP stacks when a host name does
/// not resolve.
static DNS_FAILURE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"NameResolutionError",
        r"Failed to resolve",
        r"(?i)dns error",
        r"failed to lookup address information",
        r"Name or service not known",
        r"nodename nor servname provided",
        r"No such host is known",
    ])
    .expect("Invalid DNS failure patterns")
});

/// Returns true if `message` looks like a name resolution failure.
pub fn is_dns_failure(message: &str) -> bool {
    DNS_FAILURE.is_match(message)
}

/// Appends [`DNS_HINT`] to `message` when it describes a DNS failure.
pub fn dns_hint(message: &str) -> String {
    if is_dns_failure(message) {
        format!("{message}{DNS_HINT}")
    } else {
        message.to_string()
    }
}

/// A calendar offered by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarSummary {
    pub name: String,
    pub url: String,
}

impl From<&CalendarInfo> for CalendarSummary {
    fn from(info: &CalendarInfo) -> Self {
        Self {
            name: info.name.clone(),
            url: info.id.clone(),
        }
    }
}

/// Result of a connection check.
///
/// On failure only the identifying fields and `error` are set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub success: bool,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub caldav_url: String,
    pub username: String,
    pub configured_calendar_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_calendars: Option<Vec<CalendarSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_calendar: Option<CalendarSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_calendars: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_to_display: Option<u32>,
}

impl ConnectionStatus {
    /// Status of a successful calendar listing.
    pub fn connected(settings: &Settings, selection: &CalendarSelection) -> Self {
        let calendars: Vec<CalendarSummary> =
            selection.calendars.iter().map(CalendarSummary::from).collect();
        Self {
            success: true,
            connected: true,
            error: None,
            total_calendars: Some(calendars.len()),
            available_calendars: Some(calendars),
            selected_calendar: Some(CalendarSummary::from(&selection.selected)),
            timezone: Some(settings.timezone.name().to_string()),
            days_to_display: Some(settings.days_to_display),
            ..Self::identity(settings)
        }
    }

    /// Status of a failed connection; DNS failures get a hint.
    pub fn failed(settings: &Settings, error: &ProviderError) -> Self {
        Self {
            error: Some(dns_hint(error.message())),
            ..Self::identity(settings)
        }
    }

    fn identity(settings: &Settings) -> Self {
        Self {
            success: false,
            connected: false,
            error: None,
            caldav_url: settings.caldav_url.to_string(),
            username: settings.username.clone(),
            configured_calendar_name: settings
                .calendar_name
                .clone()
                .unwrap_or_else(|| NOT_SPECIFIED.to_string()),
            available_calendars: None,
            selected_calendar: None,
            total_calendars: None,
            timezone: None,
            days_to_display: None,
        }
    }
}
