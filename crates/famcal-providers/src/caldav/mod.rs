//! CalDAV calendar source.
//!
//! - HTTP Digest and Basic authentication
//! - PROPFIND discovery through `current-user-principal` and `calendar-home-set`
//! - REPORT calendar-query with server-side recurrence expansion
//! - ICS parsing, with local RRULE expansion when the server does not expand

mod auth;
mod client;
mod expand;
mod ics;
mod source;
#[cfg(test)]
mod test_server;
mod xml;

pub use source::CalDavSource;
