//! HTTP client for CalDAV operations.
//!
//! Wraps `reqwest` with the two WebDAV methods the source needs (PROPFIND
//! and REPORT), answers 401 challenges (once per client, again when a Digest
//! nonce goes stale), and maps HTTP statuses onto [`ProviderError`] codes.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{ProviderError, ProviderResult, describe_chain};
use crate::target::CalendarTarget;

use super::auth::{AuthScheme, Credentials};

/// The WebDAV `Depth` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
}

impl Depth {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
        }
    }
}

/// HTTP client for CalDAV operations.
pub struct CalDavClient {
    client: Client,
    credentials: Option<Credentials>,
    /// Scheme negotiated on the first 401, reused for later requests.
    scheme: Option<AuthScheme>,
}

impl CalDavClient {
    /// Creates a client for `target`.
    pub fn new(target: &CalendarTarget) -> ProviderResult<Self> {
        let builder = Client::builder()
            .danger_accept_invalid_certs(!target.verify_tls)
            .timeout(target.timeout)
            .user_agent(&target.user_agent);
        #[cfg(test)]
        let builder = builder.no_proxy();
        let client = builder
            .build()
            .map_err(|e| network_error("Failed to create HTTP client", e))?;

        let credentials = match (&target.username, &target.password) {
            (Some(u), Some(p)) => Some(Credentials::new(u, p)),
            _ => None,
        };

        Ok(Self {
            client,
            credentials,
            scheme: None,
        })
    }

    /// Performs a PROPFIND request.
    pub async fn propfind(&mut self, url: &Url, body: &str, depth: Depth) -> ProviderResult<String> {
        self.request("PROPFIND", url, body, depth).await
    }

    /// Performs a REPORT request.
    pub async fn report(&mut self, url: &Url, body: &str) -> ProviderResult<String> {
        self.request("REPORT", url, body, Depth::One).await
    }

    async fn request(
        &mut self,
        method: &str,
        url: &Url,
        body: &str,
        depth: Depth,
    ) -> ProviderResult<String> {
        let response = self.send(method, url, body, depth).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return handle_response(response).await;
        }

        let challenges: Vec<String> = response
            .headers()
            .get_all(header::WWW_AUTHENTICATE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();

        if self.scheme.is_some() {
            if !AuthScheme::is_stale(challenges.iter().map(String::as_str)) {
                return handle_response(response).await;
            }
            debug!("Digest nonce is stale, renegotiating");
            self.scheme = None;
        } else {
            debug!(challenges = ?challenges, "Received 401, negotiating authentication");
        }

        if self.credentials.is_none() {
            return Err(ProviderError::authentication(
                "Server requires authentication but no credentials are configured",
            ));
        }
        let scheme = AuthScheme::from_challenges(challenges.iter().map(String::as_str))
            .ok_or_else(|| {
                ProviderError::authentication(
                    "Server requires authentication but offers no supported scheme",
                )
            })?;
        self.scheme = Some(scheme);

        let response = self.send(method, url, body, depth).await?;
        handle_response(response).await
    }

    async fn send(
        &mut self,
        method: &str,
        url: &Url,
        body: &str,
        depth: Depth,
    ) -> ProviderResult<Response> {
        let http_method = Method::from_bytes(method.as_bytes())
            .map_err(|_| ProviderError::internal(format!("Invalid HTTP method: {}", method)))?;

        let mut request: RequestBuilder = self
            .client
            .request(http_method, url.clone())
            .header(header::CONTENT_TYPE, "application/xml; charset=utf-8")
            .header("Depth", depth.as_str())
            .body(body.to_string());

        if let (Some(scheme), Some(credentials)) = (self.scheme.as_mut(), &self.credentials) {
            let authorization = scheme.authorize(method, url.path(), credentials);
            request = request.header(header::AUTHORIZATION, authorization);
        }

        trace!(method = %method, url = %url, "Sending request");

        request
            .send()
            .await
            .map_err(|e| network_error("Request failed", e))
    }
}

impl std::fmt::Debug for CalDavClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalDavClient")
            .field("credentials", &self.credentials)
            .field("scheme", &self.scheme.as_ref().map(|s| match s {
                AuthScheme::Basic => "basic",
                AuthScheme::Digest(_) => "digest",
            }))
            .finish()
    }
}

async fn handle_response(response: Response) -> ProviderResult<String> {
    let status = response.status();
    trace!(status = %status, "Received response");

    if status.is_success() {
        return response
            .text()
            .await
            .map_err(|e| network_error("Failed to read response", e));
    }

    let body = response.text().await.unwrap_or_default();
    if !status.is_server_error() && !matches!(status.as_u16(), 401 | 403 | 404 | 429) {
        warn!(status = %status, body = %body, "Unexpected response status");
    }
    Err(status_error(status, &body))
}

/// Maps a non-success HTTP status onto a provider error.
fn status_error(status: StatusCode, body: &str) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED => {
            ProviderError::authentication("Authentication failed: invalid credentials")
        }
        StatusCode::FORBIDDEN => ProviderError::authorization("Access denied to calendar"),
        StatusCode::NOT_FOUND => ProviderError::not_found("Calendar or resource not found"),
        StatusCode::TOO_MANY_REQUESTS => {
            ProviderError::rate_limited("Too many requests to server")
        }
        s if s.is_server_error() => {
            ProviderError::server(format!("Server error ({}): {}", s, body.trim()))
        }
        s => ProviderError::invalid_response(format!("Unexpected status {}: {}", s, body.trim())),
    }
}

/// Wraps a transport error, keeping its whole cause chain in the message.
fn network_error(context: &str, err: reqwest::Error) -> ProviderError {
    let message = format!("{}: {}", context, describe_chain(&err));
    ProviderError::network(message).with_source(err)
}
