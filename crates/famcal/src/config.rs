//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/famcal/config.toml` by default:
//!
//! ```toml
//! caldav_url = "https://caldav.example.com/calendars/family/"
//! username = "family@example.com"
//! password = "env::FAMCAL_PASSWORD"
//! calendar_name = "Family"
//! timezone = "America/New_York"
//! days_to_display = 14
//!
//! [transport]
//! timeout_secs = 30
//! verify_tls = true
//! ```
//!
//! `username` and `password` accept `env::` and `pass::` references, see
//! [`crate::secret`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use famcal_providers::CalendarTarget;

use crate::secret::{self, SecretError};

/// Default number of days to fetch and display.
pub const DEFAULT_DAYS_TO_DISPLAY: u32 = 14;

/// Default display timezone.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Shown instead of plain-text passwords in `config dump`.
const REDACTED: &str = "********";

/// Errors raised while loading or validating the configuration.
///
/// All of them are fatal: the CLI stops before any network request.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("`{0}` is required")]
    Missing(&'static str),

    #[error("invalid caldav_url `{value}`: {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("caldav_url must use http or https, got `{0}`")]
    UnsupportedScheme(String),

    #[error("unknown timezone `{0}`")]
    UnknownTimezone(String),

    #[error("days_to_display must be at least 1")]
    NoDays,

    #[error("transport.timeout_secs must be at least 1")]
    NoTimeout,

    #[error("failed to resolve `{key}`: {source}")]
    Secret {
        key: &'static str,
        #[source]
        source: SecretError,
    },
}

/// The contents of `config.toml`, as written by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Principal, calendar home or calendar collection URL.
    pub caldav_url: Option<String>,

    /// Login name (supports `pass::` and `env::` prefixes).
    pub username: Option<String>,

    /// Password or app password (supports `pass::` and `env::` prefixes).
    pub password: Option<String>,

    /// Case-insensitive substring of the calendar to show.
    pub calendar_name: Option<String>,

    /// IANA timezone used for display.
    pub timezone: String,

    /// Number of days to show, starting today.
    pub days_to_display: u32,

    /// HTTP transport settings.
    pub transport: TransportSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            caldav_url: None,
            username: None,
            password: None,
            calendar_name: None,
            timezone: DEFAULT_TIMEZONE.to_string(),
            days_to_display: DEFAULT_DAYS_TO_DISPLAY,
            transport: TransportSettings::default(),
        }
    }
}

/// `[transport]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Verify the server's TLS certificate.
    pub verify_tls: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verify_tls: true,
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parses TOML `content`; `path` is only used in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("famcal")
    }

    /// Checks every field and resolves secret references.
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let raw_url = required(&self.caldav_url, "caldav_url")?;
        let caldav_url = Url::parse(raw_url).map_err(|source| ConfigError::InvalidUrl {
            value: raw_url.to_string(),
            source,
        })?;
        if !matches!(caldav_url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(caldav_url.scheme().to_string()));
        }

        let username = resolve_secret(required(&self.username, "username")?, "username")?;
        let password = resolve_secret(required(&self.password, "password")?, "password")?;

        let timezone: Tz = self
            .timezone
            .trim()
            .parse()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))?;

        if self.days_to_display == 0 {
            return Err(ConfigError::NoDays);
        }
        if self.transport.timeout_secs == 0 {
            return Err(ConfigError::NoTimeout);
        }

        let calendar_name = self
            .calendar_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        Ok(Settings {
            caldav_url,
            username,
            password,
            calendar_name,
            timezone,
            days_to_display: self.days_to_display,
            timeout: Duration::from_secs(self.transport.timeout_secs),
            verify_tls: self.transport.verify_tls,
        })
    }

    /// Returns a copy safe to print: literal passwords are masked, secret
    /// references are kept.
    pub fn redacted(&self) -> Self {
        let password = self.password.as_ref().map(|p| {
            if secret::is_reference(p) {
                p.clone()
            } else {
                REDACTED.to_string()
            }
        });
        Self {
            password,
            ..self.clone()
        }
    }
}

fn required<'a>(value: &'a Option<String>, key: &'static str) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn resolve_secret(value: &str, key: &'static str) -> Result<String, ConfigError> {
    let resolved = secret::resolve(value).map_err(|source| ConfigError::Secret { key, source })?;
    if resolved.trim().is_empty() {
        return Err(ConfigError::Missing(key));
    }
    Ok(resolved)
}

/// Validated, resolved configuration. Immutable once built.
#[derive(Clone, PartialEq)]
pub struct Settings {
    pub caldav_url: Url,
    pub username: String,
    pub password: String,
    pub calendar_name: Option<String>,
    pub timezone: Tz,
    pub days_to_display: u32,
    pub timeout: Duration,
    pub verify_tls: bool,
}

impl Settings {
    /// Builds the provider-side description of the calendar to read.
    pub fn target(&self) -> CalendarTarget {
        let mut target = CalendarTarget::from_url(self.caldav_url.clone())
            .with_credentials(&self.username, &self.password)
            .with_timeout(self.timeout)
            .with_timezone(self.timezone);
        if let Some(ref name) = self.calendar_name {
            target = target.with_calendar_name(name);
        }
        if !self.verify_tls {
            target = target.with_insecure_tls();
        }
        target
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("caldav_url", &self.caldav_url.as_str())
            .field("username", &self.username)
            .field("password", &REDACTED)
            .field("calendar_name", &self.calendar_name)
            .field("timezone", &self.timezone)
            .field("days_to_display", &self.days_to_display)
            .field("timeout", &self.timeout)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}
