//! WebDAV request bodies and multistatus parsing.
//!
//! Builds the PROPFIND bodies used for calendar discovery and the
//! calendar-query REPORT body used to fetch a window of events, and pulls
//! principals, home sets, calendars and calendar objects back out of
//! `207 Multi-Status` responses.

use std::io::Cursor;

use chrono::{DateTime, Utc};
use famcal_core::TimeWindow;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use crate::error::{ProviderError, ProviderResult};

/// DAV namespace
pub const DAV_NS: &str = "DAV:";
/// CalDAV namespace
pub const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";
/// CalendarServer namespace (for Apple servers)
pub const CS_NS: &str = "http://calendarserver.org/ns/";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// A calendar collection found by PROPFIND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCalendar {
    /// The calendar's href (path).
    pub href: String,
    /// The display name.
    pub display_name: Option<String>,
    /// The calendar description.
    pub description: Option<String>,
}

/// What a Depth 0 PROPFIND says about one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryProps {
    /// `current-user-principal` href.
    pub current_user_principal: Option<String>,
    /// First `calendar-home-set` href.
    pub calendar_home_set: Option<String>,
    /// The resource itself, when it is a calendar collection.
    pub calendar: Option<DiscoveredCalendar>,
}

/// One calendar resource returned by a REPORT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarObject {
    pub href: String,
    pub etag: Option<String>,
    /// The raw iCalendar text.
    pub data: String,
}

/// Depth 0 PROPFIND body locating the principal and its calendar home.
///
/// Also asks for the calendar properties so a URL that already is a
/// calendar collection is recognised in the same round trip.
pub fn propfind_discovery_body() -> ProviderResult<String> {
    build(|w| {
        let mut propfind = BytesStart::new("d:propfind");
        propfind.push_attribute(("xmlns:d", DAV_NS));
        propfind.push_attribute(("xmlns:c", CALDAV_NS));
        w.write_event(Event::Start(propfind))?;
        w.write_event(Event::Start(BytesStart::new("d:prop")))?;
        for name in [
            "d:current-user-principal",
            "c:calendar-home-set",
            "d:resourcetype",
            "d:displayname",
            "c:calendar-description",
        ] {
            w.write_event(Event::Empty(BytesStart::new(name)))?;
        }
        w.write_event(Event::End(BytesEnd::new("d:prop")))?;
        w.write_event(Event::End(BytesEnd::new("d:propfind")))
    })
}

/// PROPFIND body asking for the properties that identify calendars.
pub fn propfind_calendars_body() -> ProviderResult<String> {
    build(|w| {
        let mut propfind = BytesStart::new("d:propfind");
        propfind.push_attribute(("xmlns:d", DAV_NS));
        propfind.push_attribute(("xmlns:c", CALDAV_NS));
        propfind.push_attribute(("xmlns:cs", CS_NS));
        w.write_event(Event::Start(propfind))?;
        w.write_event(Event::Start(BytesStart::new("d:prop")))?;
        for name in [
            "d:displayname",
            "d:resourcetype",
            "c:calendar-description",
            "cs:getctag",
        ] {
            w.write_event(Event::Empty(BytesStart::new(name)))?;
        }
        w.write_event(Event::End(BytesEnd::new("d:prop")))?;
        w.write_event(Event::End(BytesEnd::new("d:propfind")))
    })
}

/// calendar-query REPORT body for every VEVENT overlapping `window`.
///
/// Asks the server to expand recurring series into instances inside the
/// window (`<c:expand>`); servers that ignore it return master events, which
/// the ICS layer expands itself.
pub fn calendar_query_body(window: &TimeWindow) -> ProviderResult<String> {
    let start = format_utc(window.start);
    let end = format_utc(window.end);

    build(|w| {
        let mut query = BytesStart::new("c:calendar-query");
        query.push_attribute(("xmlns:d", DAV_NS));
        query.push_attribute(("xmlns:c", CALDAV_NS));
        w.write_event(Event::Start(query))?;

        w.write_event(Event::Start(BytesStart::new("d:prop")))?;
        w.write_event(Event::Empty(BytesStart::new("d:getetag")))?;
        w.write_event(Event::Start(BytesStart::new("c:calendar-data")))?;
        let mut expand = BytesStart::new("c:expand");
        expand.push_attribute(("start", start.as_str()));
        expand.push_attribute(("end", end.as_str()));
        w.write_event(Event::Empty(expand))?;
        w.write_event(Event::End(BytesEnd::new("c:calendar-data")))?;
        w.write_event(Event::End(BytesEnd::new("d:prop")))?;

        w.write_event(Event::Start(BytesStart::new("c:filter")))?;
        for component in ["VCALENDAR", "VEVENT"] {
            let mut filter = BytesStart::new("c:comp-filter");
            filter.push_attribute(("name", component));
            w.write_event(Event::Start(filter))?;
        }
        let mut range = BytesStart::new("c:time-range");
        range.push_attribute(("start", start.as_str()));
        range.push_attribute(("end", end.as_str()));
        w.write_event(Event::Empty(range))?;
        for _ in 0..2 {
            w.write_event(Event::End(BytesEnd::new("c:comp-filter")))?;
        }
        w.write_event(Event::End(BytesEnd::new("c:filter")))?;

        w.write_event(Event::End(BytesEnd::new("c:calendar-query")))
    })
}

fn build(write: impl FnOnce(&mut XmlWriter) -> std::io::Result<()>) -> ProviderResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write(&mut writer)
        .map_err(|e| ProviderError::internal("Failed to build XML body").with_source(e))?;
    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| ProviderError::internal("XML body is not UTF-8").with_source(e))
}

/// Extracts calendar collections from a PROPFIND multistatus.
///
/// Responses whose resourcetype does not include `calendar` are skipped.
pub fn parse_propfind_response(xml: &str) -> ProviderResult<Vec<DiscoveredCalendar>> {
    let mut calendars = Vec::new();
    let mut current: Option<(DiscoveredCalendar, bool)> = None;

    walk_multistatus(xml, |step| match step {
        Step::ResponseStart => {
            current = Some((
                DiscoveredCalendar {
                    href: String::new(),
                    display_name: None,
                    description: None,
                },
                false,
            ));
        }
        Step::Element("calendar") => {
            if let Some((_, is_calendar)) = current.as_mut() {
                *is_calendar = true;
            }
        }
        Step::Element(_) | Step::Close(_) => {}
        Step::Text(element, text) => {
            if let Some((calendar, _)) = current.as_mut() {
                match element {
                    "href" => calendar.href.push_str(text.trim()),
                    "displayname" => append(&mut calendar.display_name, text),
                    "calendar-description" => append(&mut calendar.description, text),
                    _ => {}
                }
            }
        }
        Step::ResponseEnd => {
            if let Some((calendar, true)) = current.take() {
                if !calendar.href.is_empty() {
                    calendars.push(calendar);
                }
            }
        }
    })?;

    Ok(calendars)
}

/// Reads the first response of a Depth 0 discovery PROPFIND.
///
/// Properties the server does not support come back empty (usually in a
/// `404` propstat) and stay `None`.
pub fn parse_discovery_response(xml: &str) -> ProviderResult<DiscoveryProps> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Pointer {
        Principal,
        Home,
    }

    let mut props = DiscoveryProps::default();
    let mut resource = DiscoveredCalendar {
        href: String::new(),
        display_name: None,
        description: None,
    };
    let mut is_calendar = false;
    let mut pointer: Option<Pointer> = None;
    let mut done = false;

    walk_multistatus(xml, |step| {
        if done {
            return;
        }
        match step {
            Step::ResponseStart => {}
            Step::Element("current-user-principal") => pointer = Some(Pointer::Principal),
            Step::Element("calendar-home-set") => pointer = Some(Pointer::Home),
            Step::Element("calendar") => is_calendar = true,
            Step::Element(_) => {}
            Step::Close("current-user-principal" | "calendar-home-set") => pointer = None,
            Step::Close(_) => {}
            Step::Text("href", text) => match pointer {
                Some(Pointer::Principal) => append(&mut props.current_user_principal, text.trim()),
                Some(Pointer::Home) if props.calendar_home_set.is_none() => {
                    props.calendar_home_set = Some(text.trim().to_string());
                }
                Some(Pointer::Home) => {}
                None => resource.href.push_str(text.trim()),
            },
            Step::Text("displayname", text) => append(&mut resource.display_name, text),
            Step::Text("calendar-description", text) => append(&mut resource.description, text),
            Step::Text(..) => {}
            Step::ResponseEnd => done = true,
        }
    })?;

    if is_calendar && !resource.href.is_empty() {
        props.calendar = Some(resource);
    }
    Ok(props)
}

/// Extracts calendar objects from a calendar-query REPORT multistatus.
pub fn parse_report_response(xml: &str) -> ProviderResult<Vec<CalendarObject>> {
    let mut objects = Vec::new();
    let mut current: Option<CalendarObject> = None;

    walk_multistatus(xml, |step| match step {
        Step::ResponseStart => {
            current = Some(CalendarObject {
                href: String::new(),
                etag: None,
                data: String::new(),
            });
        }
        Step::Element(_) | Step::Close(_) => {}
        Step::Text(element, text) => {
            if let Some(object) = current.as_mut() {
                match element {
                    "href" => object.href.push_str(text.trim()),
                    "getetag" => object.etag = Some(text.trim().trim_matches('"').to_string()),
                    "calendar-data" => object.data.push_str(text),
                    _ => {}
                }
            }
        }
        Step::ResponseEnd => {
            if let Some(object) = current.take() {
                if !object.href.is_empty() && !object.data.trim().is_empty() {
                    objects.push(object);
                }
            }
        }
    })?;

    Ok(objects)
}

enum Step<'a> {
    ResponseStart,
    /// An element opened inside a response, by local name.
    Element(&'a str),
    /// An element other than `response` closed.
    Close(&'a str),
    /// Text (or CDATA) inside the innermost open element.
    Text(&'a str, &'a str),
    ResponseEnd,
}

/// Drives `visit` over the responses of a multistatus document.
fn walk_multistatus(xml: &str, mut visit: impl FnMut(Step<'_>)) -> ProviderResult<()> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            ProviderError::invalid_response(format!(
                "Malformed multistatus XML at byte {}",
                reader.buffer_position()
            ))
            .with_source(e)
        })?;

        match event {
            Event::Start(e) => {
                let name = local_name(e.name().as_ref());
                if name == "response" {
                    visit(Step::ResponseStart);
                } else {
                    visit(Step::Element(&name));
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(e.name().as_ref());
                visit(Step::Element(&name));
                visit(Step::Close(&name));
            }
            Event::End(_) => match stack.pop().as_deref() {
                Some("response") => visit(Step::ResponseEnd),
                Some(name) => visit(Step::Close(name)),
                None => {}
            },
            Event::Text(e) => {
                if let Some(element) = stack.last() {
                    let text = e.unescape().map_err(|err| {
                        ProviderError::invalid_response("Bad entity in multistatus XML")
                            .with_source(err)
                    })?;
                    visit(Step::Text(element, &text));
                }
            }
            Event::CData(e) => {
                if let Some(element) = stack.last() {
                    visit(Step::Text(element, &String::from_utf8_lossy(&e)));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn append(slot: &mut Option<String>, text: &str) {
    slot.get_or_insert_with(String::new).push_str(text);
}

/// Strips any namespace prefix from an element name.
fn local_name(name: &[u8]) -> String {
    let name = String::from_utf8_lossy(name);
    name.rsplit(':').next().unwrap_or(&name).to_string()
}

/// Formats a datetime for CalDAV time-range attributes.
fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}
