//! Error types for calendar source operations.
//!
//! Every failure the adapter can observe is a [`ProviderError`] tagged with a
//! [`ProviderErrorCode`]. The adapter never lets these escape a fetch; they
//! end up as dropped-event reasons or as the warning of an empty result.

use std::fmt;
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Authentication failed or credentials are invalid.
    AuthenticationFailed,
    /// Authorization failed - user lacks permission.
    AuthorizationFailed,
    /// Network error - connection failed, timeout, DNS resolution, etc.
    NetworkError,
    /// Rate limit exceeded - too many requests.
    RateLimited,
    /// Server returned an error (5xx status codes).
    ServerError,
    /// Invalid response from the server - parse error, unexpected format.
    InvalidResponse,
    /// Resource not found (404).
    NotFound,
    /// The principal has no calendars to select from.
    CalendarNotFound,
    /// A single event could not be parsed or placed in time.
    MalformedEvent,
    /// Configuration error - missing or invalid config.
    ConfigurationError,
    /// Internal provider error - unexpected state, bug.
    InternalError,
}

impl ProviderErrorCode {
    /// Returns true if this error came from reaching the calendar server.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::AuthorizationFailed
                | Self::NetworkError
                | Self::RateLimited
                | Self::ServerError
                | Self::InvalidResponse
                | Self::NotFound
        )
    }

    /// Returns a machine-readable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::CalendarNotFound => "calendar_not_found",
            Self::MalformedEvent => "malformed_event",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while talking to a calendar source.
#[derive(Debug, Error)]
pub struct ProviderError {
    /// The error code categorizing this error.
    code: ProviderErrorCode,
    /// A human-readable message describing the error.
    message: String,
    /// The provider that generated this error (e.g., "caldav").
    provider: Option<String>,
    /// The underlying cause of this error, if any.
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            source: None,
        }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    /// Creates an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthorizationFailed, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// Creates a rate limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    /// Creates a calendar-not-found error.
    pub fn calendar_not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::CalendarNotFound, message)
    }

    /// Creates a malformed event error.
    pub fn malformed_event(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::MalformedEvent, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Sets the provider name for this error.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the provider name, if set.
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Returns true if this error came from reaching the calendar server.
    pub fn is_transport(&self) -> bool {
        self.code.is_transport()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Renders an error followed by each of its sources, joined by `": "`.
///
/// HTTP client errors hide the interesting part (DNS, TLS, refused) in their
/// source chain; this flattens it into one line.
pub fn describe_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        current = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_codes() {
        assert!(ProviderErrorCode::NetworkError.is_transport());
        assert!(ProviderErrorCode::AuthenticationFailed.is_transport());
        assert!(ProviderErrorCode::ServerError.is_transport());
        assert!(!ProviderErrorCode::CalendarNotFound.is_transport());
        assert!(!ProviderErrorCode::MalformedEvent.is_transport());
    }

    #[test]
    fn error_code_display() {
        assert_eq!(
            ProviderErrorCode::CalendarNotFound.as_str(),
            "calendar_not_found"
        );
        assert_eq!(ProviderErrorCode::MalformedEvent.to_string(), "malformed_event");
    }

    #[test]
    fn provider_error_creation() {
        let err = ProviderError::authentication("bad password");
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(err.message(), "bad password");
        assert!(err.provider().is_none());
        assert!(err.is_transport());
    }

    #[test]
    fn provider_error_display() {
        let err = ProviderError::calendar_not_found("no calendars found").with_provider("caldav");
        let display = format!("{}", err);
        assert_eq!(display, "[caldav] calendar_not_found: no calendars found");
    }

    #[test]
    fn provider_error_with_source() {
        use std::error::Error;
        let io_err = std::io::Error::other("connection reset");
        let err = ProviderError::network("request failed").with_source(io_err);
        assert!(err.source().is_some());
    }

    #[test]
    fn chain_includes_sources_once() {
        let io_err = std::io::Error::other("dns error: failed to lookup address information");
        let err = ProviderError::network("request failed").with_source(io_err);

        let text = describe_chain(&err);
        assert_eq!(
            text,
            "network_error: request failed: dns error: failed to lookup address information"
        );
    }
}
