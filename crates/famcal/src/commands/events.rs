//! Event listing, the default command.

use crate::error::ClientResult;
use crate::service::{CalendarService, EventsResponse};

/// Fetch `days` days of events and print them.
pub async fn run(service: &CalendarService, days: u32, json: bool) -> ClientResult<()> {
    let response = service.events_response(days).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", render_text(&response, days));
    }
    Ok(())
}

/// Renders events grouped by day, one line per event.
pub fn render_text(response: &EventsResponse, days: u32) -> String {
    let mut out = String::new();
    if response.events.is_empty() {
        out.push_str(&format!("No events in the next {} days.\n", days));
        return out;
    }

    let width = response
        .events
        .iter()
        .map(|e| e.time_str.len())
        .max()
        .unwrap_or(0);

    for (i, events) in response.events_by_date.values().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let Some(first) = events.first() else {
            continue;
        };
        out.push_str(&format!("{}\n", first.date_str));
        for event in events {
            out.push_str(&format!("  {:<width$}  {}", event.time_str, event.summary));
            if !event.location.is_empty() {
                out.push_str(&format!(" @ {}", event.location));
            }
            out.push('\n');
        }
    }

    out.push_str(&format!(
        "\n{} events, updated {}\n",
        response.event_count, response.last_updated
    ));
    out
}
