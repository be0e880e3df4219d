//! Status command.

use crate::error::ClientResult;
use crate::service::CalendarService;
use crate::status::ConnectionStatus;

/// Check the connection and print the result.
///
/// Returns whether the connection succeeded.
pub async fn run(service: &CalendarService, json: bool) -> ClientResult<bool> {
    let status = service.get_calendar_info().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", render_text(&status));
    }
    Ok(status.success)
}

/// Human-readable form of a [`ConnectionStatus`].
pub fn render_text(status: &ConnectionStatus) -> String {
    let mut out = String::new();
    if let Some(ref error) = status.error {
        out.push_str(&format!("Connection failed: {}\n", error));
    } else {
        out.push_str("Connected.\n");
    }
    out.push_str(&format!("  url:      {}\n", status.caldav_url));
    out.push_str(&format!("  user:     {}\n", status.username));
    out.push_str(&format!("  calendar: {}\n", status.configured_calendar_name));

    if let Some(ref timezone) = status.timezone {
        out.push_str(&format!("  timezone: {}\n", timezone));
    }
    if let Some(days) = status.days_to_display {
        out.push_str(&format!("  days:     {}\n", days));
    }

    if let Some(ref calendars) = status.available_calendars {
        let selected = status.selected_calendar.as_ref().map(|c| c.url.as_str());
        out.push_str(&format!("\nCalendars ({}):\n", calendars.len()));
        for calendar in calendars {
            let marker = if Some(calendar.url.as_str()) == selected {
                '*'
            } else {
                ' '
            };
            out.push_str(&format!("  {} {} <{}>\n", marker, calendar.name, calendar.url));
        }
    }
    out
}
