//! CalDAV calendar source.

use tokio::sync::Mutex;
use tracing::{debug, info, trace};
use url::Url;

use famcal_core::TimeWindow;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarInfo, CalendarSource, OccurrenceResult};
use crate::target::CalendarTarget;

use super::client::{CalDavClient, Depth};
use super::ics::parse_calendar_object;
use super::xml::{
    DiscoveredCalendar, DiscoveryProps, calendar_query_body, parse_discovery_response,
    parse_propfind_response, parse_report_response, propfind_calendars_body,
    propfind_discovery_body,
};

/// Reads events from a CalDAV server.
///
/// The configured URL may be the server root, a principal, a calendar home
/// set or one calendar collection. Calendars are found by following
/// `current-user-principal` and `calendar-home-set` from there.
pub struct CalDavSource {
    /// Requests go out one at a time; digest state lives in the client.
    client: Mutex<CalDavClient>,
    target: CalendarTarget,
}

impl CalDavSource {
    /// Creates a source for `target`.
    pub fn new(target: CalendarTarget) -> ProviderResult<Self> {
        let client = CalDavClient::new(&target).map_err(|e| e.with_provider("caldav"))?;
        Ok(Self {
            client: Mutex::new(client),
            target,
        })
    }

    async fn discover(&self) -> ProviderResult<Vec<CalendarInfo>> {
        let url = &self.target.url;
        debug!(url = %url, "Discovering calendars");

        let props = self.properties(url).await?;
        if let Some(calendar) = props.calendar {
            debug!("Configured URL is a calendar collection");
            return Ok(calendar_infos(url, vec![calendar]));
        }

        let home = self.calendar_home(url, props).await?;
        debug!(home = %home, "Listing calendar home set");

        let body = propfind_calendars_body()?;
        let response = {
            let mut client = self.client.lock().await;
            client.propfind(&home, &body, Depth::One).await?
        };

        let calendars = calendar_infos(&home, parse_propfind_response(&response)?);
        info!(count = calendars.len(), "Discovered calendars");
        Ok(calendars)
    }

    /// Depth 0 discovery properties of `url`.
    async fn properties(&self, url: &Url) -> ProviderResult<DiscoveryProps> {
        let body = propfind_discovery_body()?;
        let response = {
            let mut client = self.client.lock().await;
            client.propfind(url, &body, Depth::Zero).await?
        };
        parse_discovery_response(&response)
    }

    /// Follows the principal to its calendar home set.
    ///
    /// Falls back to the principal (or `url` itself) when the server
    /// advertises no home set.
    async fn calendar_home(&self, url: &Url, props: DiscoveryProps) -> ProviderResult<Url> {
        if let Some(home) = props.calendar_home_set {
            return join_href(url, &home);
        }
        let Some(principal) = props.current_user_principal else {
            debug!("No principal advertised, listing the configured URL");
            return Ok(url.clone());
        };

        let principal = join_href(url, &principal)?;
        if principal == *url {
            return Ok(principal);
        }
        debug!(principal = %principal, "Following current-user-principal");

        match self.properties(&principal).await?.calendar_home_set {
            Some(home) => join_href(&principal, &home),
            None => Ok(principal),
        }
    }

    async fn query(
        &self,
        calendar: &CalendarInfo,
        window: TimeWindow,
    ) -> ProviderResult<Vec<OccurrenceResult>> {
        let url = Url::parse(&calendar.id).map_err(|e| {
            ProviderError::internal(format!("Calendar id is not a URL: {}", calendar.id))
                .with_source(e)
        })?;
        debug!(
            calendar = %calendar.name,
            start = %window.start,
            end = %window.end,
            "Fetching events with REPORT"
        );

        let body = calendar_query_body(&window)?;
        let response = {
            let mut client = self.client.lock().await;
            client.report(&url, &body).await?
        };

        let objects = parse_report_response(&response)?;
        debug!(count = objects.len(), "Received calendar objects");

        let results: Vec<OccurrenceResult> = objects
            .iter()
            .flat_map(|object| {
                trace!(href = %object.href, etag = ?object.etag, "Parsing calendar object");
                parse_calendar_object(&object.data, &window, &self.target.timezone)
                    .into_iter()
                    .map(move |result| {
                        result.map_err(|e| {
                            ProviderError::malformed_event(format!(
                                "{} ({})",
                                e.message(),
                                object.href
                            ))
                            .with_provider("caldav")
                        })
                    })
            })
            .collect();

        Ok(results)
    }
}

impl CalendarSource for CalDavSource {
    fn name(&self) -> &str {
        "caldav"
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarInfo>>> {
        Box::pin(async move { self.discover().await.map_err(|e| e.with_provider("caldav")) })
    }

    fn query_occurrences<'a>(
        &'a self,
        calendar: &'a CalendarInfo,
        window: TimeWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<OccurrenceResult>>> {
        Box::pin(async move {
            self.query(calendar, window)
                .await
                .map_err(|e| e.with_provider("caldav"))
        })
    }
}

impl std::fmt::Debug for CalDavSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalDavSource")
            .field("url", &self.target.url.as_str())
            .finish()
    }
}

/// Resolves an href from a multistatus against the URL it came from.
fn join_href(base: &Url, href: &str) -> ProviderResult<Url> {
    base.join(href).map_err(|e| {
        ProviderError::invalid_response(format!("Server returned an unusable href: {}", href))
            .with_source(e)
    })
}

/// Turns PROPFIND results into calendars with absolute URLs.
fn calendar_infos(base: &Url, discovered: Vec<DiscoveredCalendar>) -> Vec<CalendarInfo> {
    discovered
        .into_iter()
        .map(|calendar| {
            let url = base
                .join(&calendar.href)
                .unwrap_or_else(|_| base.clone());
            let name = calendar
                .display_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| last_segment(&url));
            let info = CalendarInfo::new(url.as_str(), name);
            match calendar.description {
                Some(description) => info.with_description(description),
                None => info,
            }
        })
        .collect()
}

/// The last non-empty path segment of `url`, or its host.
fn last_segment(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|s| {
            url::form_urlencoded::parse(format!("x={}", s).as_bytes())
                .next()
                .map(|(_, v)| v.into_owned())
                .unwrap_or_else(|| s.to_string())
        })
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
