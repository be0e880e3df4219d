//! Calendar target configuration.

use chrono_tz::Tz;
use std::time::Duration;
use url::Url;

/// Identifies the remote calendar to query and how to reach it.
///
/// Built once from configuration and handed to the source; never mutated.
#[derive(Debug, Clone)]
pub struct CalendarTarget {
    /// Base URL of the CalDAV server (principal or calendar collection).
    pub url: Url,

    /// Username for authentication.
    pub username: Option<String>,

    /// Password for authentication.
    pub password: Option<String>,

    /// Case-insensitive substring used to pick a calendar by name.
    pub calendar_name: Option<String>,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// Request timeout.
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: String,

    /// Zone used to place floating and all-day times when a recurring
    /// series has to be expanded locally.
    pub timezone: Tz,
}

impl CalendarTarget {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a new target with the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: impl AsRef<str>) -> Result<Self, url::ParseError> {
        Ok(Self::from_url(Url::parse(url.as_ref())?))
    }

    /// Creates a new target from an already parsed URL.
    pub fn from_url(url: Url) -> Self {
        Self {
            url,
            username: None,
            password: None,
            calendar_name: None,
            verify_tls: true,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("famcal/{}", env!("CARGO_PKG_VERSION")),
            timezone: Tz::UTC,
        }
    }

    /// Sets the credentials for authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the calendar name filter.
    pub fn with_calendar_name(mut self, name: impl Into<String>) -> Self {
        self.calendar_name = Some(name.into());
        self
    }

    /// Disables TLS verification (for self-signed test servers).
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the zone for floating and all-day times.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }
}
