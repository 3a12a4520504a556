//! Timestamp interchange format.
//!
//! Every timestamp that leaves memory (database columns, identity payloads,
//! JSON output) is written as an RFC 3339 / ISO-8601 offset date-time, with
//! sub-second digits kept so that a value survives a format/parse cycle
//! unchanged.

use chrono::{DateTime, FixedOffset, Local, ParseError, SecondsFormat};

/// A wall-clock instant together with the offset it was recorded in.
pub type Timestamp = DateTime<FixedOffset>;

/// Current local time, keeping the local offset.
pub fn now() -> Timestamp {
    Local::now().fixed_offset()
}

/// Format a timestamp, e.g. `2024-03-09T14:02:11.482913Z` or
/// `2024-03-09T15:02:11.482913+01:00`.
pub fn format(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a timestamp previously written by [`format`] (any RFC 3339 text is accepted).
pub fn parse(text: &str) -> std::result::Result<Timestamp, ParseError> {
    DateTime::parse_from_rfc3339(text.trim())
}

/// Shorten a UUID for display (first 8 chars)
pub fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}
