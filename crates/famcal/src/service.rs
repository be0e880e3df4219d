//! The calendar service: configuration plus adapter plus normalizer.
//!
//! Front ends talk to [`CalendarService`] only. None of its operations
//! fail: connection problems turn into an empty event list (and a log
//! line) or into a failed [`ConnectionStatus`].

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, warn};

use famcal_core::{
    DisplayEvent, EventsByDate, NormalizedEvent, group_by_date, midnight, to_display,
};
use famcal_providers::{CalendarAdapter, normalize};

use crate::config::Settings;
use crate::status::ConnectionStatus;

/// 12-hour clock label for `last_updated`.
const UPDATED_FORMAT: &str = "%I:%M %p";

/// JSON envelope of an event listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventsResponse {
    pub success: bool,
    pub events: Vec<DisplayEvent>,
    pub events_by_date: EventsByDate,
    pub event_count: usize,
    /// Time of the fetch on a 12-hour clock in the display timezone.
    pub last_updated: String,
}

impl EventsResponse {
    /// Builds the envelope from display events already in start order.
    pub fn new(events: Vec<DisplayEvent>, updated_at: &DateTime<Tz>) -> Self {
        Self {
            success: true,
            events_by_date: group_by_date(&events),
            event_count: events.len(),
            events,
            last_updated: updated_at.format(UPDATED_FORMAT).to_string(),
        }
    }
}

/// Reads one calendar and prepares its events for display.
#[derive(Debug)]
pub struct CalendarService {
    settings: Settings,
    adapter: CalendarAdapter,
}

impl CalendarService {
    /// Creates a service reading the CalDAV calendar described by `settings`.
    pub fn new(settings: Settings) -> Self {
        let adapter = connect(&settings);
        Self::with_adapter(settings, adapter)
    }

    /// Creates a service over an existing adapter.
    pub fn with_adapter(settings: Settings, adapter: CalendarAdapter) -> Self {
        Self { settings, adapter }
    }

    /// Returns the settings the service was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Fetches events from local midnight today through `days_ahead` days,
    /// normalized and sorted by start.
    pub async fn get_events(&self, days_ahead: u32) -> Vec<NormalizedEvent> {
        self.get_events_at(Utc::now(), days_ahead).await
    }

    /// Like [`Self::get_events`], with an explicit current time.
    pub async fn get_events_at(&self, now: DateTime<Utc>, days_ahead: u32) -> Vec<NormalizedEvent> {
        let tz = self.settings.timezone;
        let report = self
            .adapter
            .fetch_occurrences(window_start(now, &tz), days_ahead)
            .await;

        if let Some(ref warning) = report.warning {
            warn!(error = %warning, "Showing no events");
        }
        if !report.dropped.is_empty() {
            info!(count = report.dropped.len(), "Some events could not be read");
        }

        normalize(&report.occurrences, &tz)
    }

    /// Projects one event into display labels in the configured timezone.
    pub fn format_event_for_display(&self, event: &NormalizedEvent) -> DisplayEvent {
        DisplayEvent::from_event(event, &self.settings.timezone)
    }

    /// Fetches `days_ahead` days and wraps them in an [`EventsResponse`].
    pub async fn events_response(&self, days_ahead: u32) -> EventsResponse {
        self.events_response_at(Utc::now(), days_ahead).await
    }

    /// Like [`Self::events_response`], with an explicit current time.
    pub async fn events_response_at(&self, now: DateTime<Utc>, days_ahead: u32) -> EventsResponse {
        let tz = self.settings.timezone;
        let events = self.get_events_at(now, days_ahead).await;
        EventsResponse::new(to_display(&events, &tz), &now.with_timezone(&tz))
    }

    /// Lists the calendars of the configured account.
    pub async fn get_calendar_info(&self) -> ConnectionStatus {
        match self.adapter.resolve_calendar().await {
            Ok(selection) => ConnectionStatus::connected(&self.settings, &selection),
            Err(e) => {
                warn!(error = %e, "Connection check failed");
                ConnectionStatus::failed(&self.settings, &e)
            }
        }
    }
}

#[cfg(feature = "caldav")]
fn connect(settings: &Settings) -> CalendarAdapter {
    CalendarAdapter::caldav(settings.target())
}

#[cfg(not(feature = "caldav"))]
fn connect(settings: &Settings) -> CalendarAdapter {
    use famcal_providers::{ErrorSource, ProviderError};

    let error = ProviderError::configuration("famcal was built without CalDAV support");
    CalendarAdapter::new(ErrorSource::new("caldav", error), settings.calendar_name.clone())
}

/// Midnight of the current day in `tz`, or `now` when that midnight does
/// not exist.
fn window_start(now: DateTime<Utc>, tz: &Tz) -> DateTime<Tz> {
    let local = now.with_timezone(tz);
    midnight(local.date_naive(), tz).unwrap_or(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use chrono::{NaiveDate, TimeZone};
    use famcal_core::TimeWindow;
    use famcal_providers::{
        BoxFuture, CalendarInfo, CalendarSource, OccurrenceResult, ProviderError, ProviderResult,
        RawEventOccurrence, RawEventTime,
    };

    /// In-memory calendar server.
    #[derive(Default)]
    struct StaticSource {
        calendars: Vec<CalendarInfo>,
        occurrences: Vec<Option<RawEventOccurrence>>,
        unreachable: Option<&'static str>,
    }

    impl CalendarSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarInfo>>> {
            let result = match self.unreachable {
                Some(message) => Err(ProviderError::network(message)),
                None => Ok(self.calendars.clone()),
            };
            Box::pin(async move { result })
        }

        fn query_occurrences<'a>(
            &'a self,
            _calendar: &'a CalendarInfo,
            _window: TimeWindow,
        ) -> BoxFuture<'a, ProviderResult<Vec<OccurrenceResult>>> {
            let results = self
                .occurrences
                .iter()
                .map(|o| {
                    o.clone()
                        .ok_or_else(|| ProviderError::malformed_event("VEVENT without DTSTART"))
                })
                .collect();
            Box::pin(async move { Ok(results) })
        }
    }

    fn settings(timezone: &str) -> Settings {
        AppConfig {
            caldav_url: Some("https://dav.example.com/calendars/family/".into()),
            username: Some("family@example.com".into()),
            password: Some("secret".into()),
            timezone: timezone.into(),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn service(timezone: &str, source: StaticSource) -> CalendarService {
        let settings = settings(timezone);
        let adapter = CalendarAdapter::new(source, settings.calendar_name.clone());
        CalendarService::with_adapter(settings, adapter)
    }

    fn family() -> Vec<CalendarInfo> {
        vec![CalendarInfo::new("https://dav.example.com/calendars/family/home/", "Family")]
    }

    fn floating(y: i32, m: u32, d: u32, h: u32, min: u32) -> RawEventTime {
        RawEventTime::Floating(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, 0)
                .unwrap(),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> RawEventTime {
        RawEventTime::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn naive_times_take_the_display_zone() {
        let dentist = RawEventOccurrence::new(floating(2024, 3, 5, 14, 30))
            .with_summary("Dentist")
            .with_end(floating(2024, 3, 5, 15, 0));
        let service = service(
            "America/New_York",
            StaticSource {
                calendars: family(),
                occurrences: vec![Some(dentist)],
                ..Default::default()
            },
        );

        let events = service.get_events_at(utc(2024, 3, 5, 12), 14).await;
        assert_eq!(events.len(), 1);

        let display = service.format_event_for_display(&events[0]);
        assert_eq!(display.time_str, "02:30 PM - 03:00 PM");
        assert_eq!(display.date_str, "Tuesday, March 05, 2024");
        assert_eq!(display.date, "2024-03-05");
        assert!(!display.all_day);
    }

    #[tokio::test]
    async fn all_day_and_defaults() {
        let holiday = RawEventOccurrence::new(date(2024, 7, 4)).with_summary("Holiday");
        let anonymous = RawEventOccurrence::new(floating(2024, 7, 2, 9, 0));
        let service = service(
            "America/New_York",
            StaticSource {
                calendars: family(),
                occurrences: vec![Some(holiday), Some(anonymous)],
                ..Default::default()
            },
        );

        let events = service.get_events_at(utc(2024, 7, 1, 16), 14).await;
        let display: Vec<DisplayEvent> = events
            .iter()
            .map(|e| service.format_event_for_display(e))
            .collect();

        assert_eq!(display[0].summary, "Untitled Event");
        assert_eq!(display[0].location, "");
        assert_eq!(display[0].description, "");
        assert_eq!(display[1].time_str, "All Day");
        assert_eq!(display[1].date_str, "Thursday, July 04, 2024");
        assert!(display[1].all_day);
    }

    #[tokio::test]
    async fn zero_calendars() {
        let service = service("UTC", StaticSource::default());

        assert!(service.get_events_at(utc(2024, 3, 5, 12), 14).await.is_empty());

        let status = service.get_calendar_info().await;
        assert!(!status.success);
        assert!(!status.connected);
        assert!(status.error.unwrap().contains("no calendars found"));
    }

    #[tokio::test]
    async fn one_bad_event_in_five() {
        let occurrences = vec![
            Some(RawEventOccurrence::new(floating(2024, 3, 8, 9, 0)).with_summary("Swim")),
            Some(RawEventOccurrence::new(floating(2024, 3, 6, 17, 0)).with_summary("Piano")),
            None,
            Some(RawEventOccurrence::new(date(2024, 3, 7)).with_summary("Field trip")),
            Some(RawEventOccurrence::new(floating(2024, 3, 6, 8, 0)).with_summary("Dentist")),
        ];
        let service = service(
            "Asia/Tokyo",
            StaticSource {
                calendars: family(),
                occurrences,
                ..Default::default()
            },
        );

        let events = service.get_events_at(utc(2024, 3, 5, 0), 14).await;
        let summaries: Vec<&str> = events.iter().map(|e| e.summary.as_str()).collect();
        assert_eq!(summaries, ["Dentist", "Piano", "Field trip", "Swim"]);
    }

    #[tokio::test]
    async fn unreachable_server() {
        let service = service(
            "UTC",
            StaticSource {
                unreachable: Some("Request failed: dns error: Name or service not known"),
                ..Default::default()
            },
        );

        assert!(service.get_events_at(utc(2024, 3, 5, 12), 14).await.is_empty());

        let status = service.get_calendar_info().await;
        assert!(!status.success);
        assert!(status.error.unwrap().contains("Check your CalDAV URL"));
    }

    #[tokio::test]
    async fn calendar_info_selects_by_name() {
        let mut settings = settings("Europe/Paris");
        settings.calendar_name = Some("kids".into());
        let source = StaticSource {
            calendars: vec![
                CalendarInfo::new("https://dav.example.com/cal/work/", "Work"),
                CalendarInfo::new("https://dav.example.com/cal/kids/", "Kids Activities"),
            ],
            ..Default::default()
        };
        let adapter = CalendarAdapter::new(source, settings.calendar_name.clone());
        let service = CalendarService::with_adapter(settings, adapter);

        let status = service.get_calendar_info().await;
        assert!(status.success);
        assert_eq!(status.total_calendars, Some(2));
        assert_eq!(status.selected_calendar.unwrap().name, "Kids Activities");
        assert_eq!(status.configured_calendar_name, "kids");
        assert_eq!(status.timezone.as_deref(), Some("Europe/Paris"));
    }

    #[tokio::test]
    async fn events_envelope() {
        let occurrences = vec![
            Some(
                RawEventOccurrence::new(floating(2024, 3, 6, 16, 0))
                    .with_summary("Soccer")
                    .with_end(floating(2024, 3, 6, 17, 30))
                    .with_location("Park"),
            ),
            Some(RawEventOccurrence::new(date(2024, 3, 5)).with_summary("Grandma visiting")),
        ];
        let service = service(
            "Asia/Tokyo",
            StaticSource {
                calendars: family(),
                occurrences,
                ..Default::default()
            },
        );

        let response = service.events_response_at(utc(2024, 3, 5, 0), 7).await;

        insta::assert_json_snapshot!(response, @r#"
        {
          "success": true,
          "events": [
            {
              "summary": "Grandma visiting",
              "date_str": "Tuesday, March 05, 2024",
              "time_str": "All Day",
              "location": "",
              "description": "",
              "date": "2024-03-05",
              "day_of_week": "Tuesday",
              "day": 5,
              "month": "March",
              "all_day": true
            },
            {
              "summary": "Soccer",
              "date_str": "Wednesday, March 06, 2024",
              "time_str": "04:00 PM - 05:30 PM",
              "location": "Park",
              "description": "",
              "date": "2024-03-06",
              "day_of_week": "Wednesday",
              "day": 6,
              "month": "March",
              "all_day": false
            }
          ],
          "events_by_date": {
            "2024-03-05": [
              {
                "summary": "Grandma visiting",
                "date_str": "Tuesday, March 05, 2024",
                "time_str": "All Day",
                "location": "",
                "description": "",
                "date": "2024-03-05",
                "day_of_week": "Tuesday",
                "day": 5,
                "month": "March",
                "all_day": true
              }
            ],
            "2024-03-06": [
              {
                "summary": "Soccer",
                "date_str": "Wednesday, March 06, 2024",
                "time_str": "04:00 PM - 05:30 PM",
                "location": "Park",
                "description": "",
                "date": "2024-03-06",
                "day_of_week": "Wednesday",
                "day": 6,
                "month": "March",
                "all_day": false
              }
            ]
          },
          "event_count": 2,
          "last_updated": "09:00 AM"
        }
        "#);
    }

    #[test]
    fn window_starts_at_local_midnight() {
        let tz = chrono_tz::Asia::Tokyo;
        let start = window_start(utc(2024, 3, 5, 20), &tz);
        assert_eq!(start, tz.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap());
    }
}
