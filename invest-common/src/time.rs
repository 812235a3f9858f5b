//! Timestamp helpers
//!
//! All timestamps are stored as RFC 3339 strings in UTC with a fixed
//! microsecond precision, so string order equals time order.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current time as an RFC 3339 string
pub fn now_rfc3339() -> String {
    to_rfc3339(Utc::now())
}

/// Format a timestamp the way it is stored
pub fn to_rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 timestamp, returning `None` for malformed input
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an optional RFC 3339 timestamp column
pub fn parse_opt_rfc3339(value: Option<&str>) -> Option<DateTime<Utc>> {
    value.and_then(parse_rfc3339)
}
