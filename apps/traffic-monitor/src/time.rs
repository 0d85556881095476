//! Timestamp handling for data.gov.sg payloads.
//!
//! The upstream API reports Singapore wall-clock time (UTC+8) and frequently
//! omits the offset, e.g. `"2025-11-06T23:30:00"`. Strings without an offset
//! marker are pinned to `+08:00` before parsing; strings that already carry
//! `+HH:MM` or `Z` are parsed as-is.

use chrono::{DateTime, Duration, ParseError, Utc};
use chrono_tz::Asia::Singapore;

pub const SINGAPORE_OFFSET: &str = "+08:00";
pub const SINGAPORE_OFFSET_HOURS: i64 = 8;

const DISPLAY_FORMAT: &str = "%d %b %Y, %I:%M:%S %P";
const TIME_OF_DAY_FORMAT: &str = "%I:%M:%S %P";
const UPSTREAM_QUERY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn with_singapore_offset(raw: &str) -> String {
    if raw.contains('+') || raw.contains('Z') {
        raw.to_string()
    } else {
        format!("{raw}{SINGAPORE_OFFSET}")
    }
}

/// Parses an upstream timestamp into an absolute instant.
pub fn parse_singapore_time(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    let normalized = with_singapore_offset(raw);
    let parsed = DateTime::parse_from_rfc3339(&normalized)?;
    Ok(parsed.with_timezone(&Utc))
}

/// Renders an upstream timestamp as Singapore time, e.g. `06 Nov 2025, 11:30:00 pm`.
pub fn format_singapore_time(raw: &str) -> Result<String, ParseError> {
    parse_singapore_time(raw).map(format_instant)
}

pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&Singapore)
        .format(DISPLAY_FORMAT)
        .to_string()
}

/// Time-of-day only (`11:30:00 pm`), used by the per-camera footer.
pub fn format_time_of_day(raw: &str) -> Result<String, ParseError> {
    let instant = parse_singapore_time(raw)?;
    Ok(instant
        .with_timezone(&Singapore)
        .format(TIME_OF_DAY_FORMAT)
        .to_string())
}

/// The `date_time` query parameter expected upstream: local wall-clock time
/// without an offset and without sub-second precision.
pub fn upstream_query_timestamp(now: DateTime<Utc>) -> String {
    let local = now + Duration::hours(SINGAPORE_OFFSET_HOURS);
    local.naive_utc().format(UPSTREAM_QUERY_FORMAT).to_string()
}
