//! ISO-8601 instant handling.
//!
//! Event records carry their span as strings. Everything inside the engine
//! works on `DateTime<Utc>`; these helpers sit at the boundary in both
//! directions.
//!
//! - [`parse_instant`] — RFC 3339 datetime or bare `YYYY-MM-DD` date → UTC instant
//! - [`format_instant`] — UTC instant → `2017-06-07T09:00:00.000Z`
//! - [`epoch_millis`] — UTC instant → milliseconds since the Unix epoch

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::error::{EngineError, Result};

/// Parse an ISO-8601 instant into `DateTime<Utc>`.
///
/// Accepts a full RFC 3339 datetime with any offset (normalized to UTC), or a
/// bare calendar date, which resolves to midnight UTC of that day.
///
/// # Errors
///
/// Returns [`EngineError::InvalidDatetime`] if the string is neither.
///
/// # Examples
///
/// ```
/// use occurrence_engine::instant::{format_instant, parse_instant};
///
/// let dt = parse_instant("2017-01-01T09:00:00+09:00").unwrap();
/// assert_eq!(format_instant(&dt), "2017-01-01T00:00:00.000Z");
/// ```
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    let trimmed = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| EngineError::InvalidDatetime(format!("'{}'", s)))
}

/// Format an instant as an ISO-8601 UTC string with millisecond precision.
pub fn format_instant(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// `DTSTART` line in the basic UTC form the rule-set parser expects.
pub(crate) fn dtstart_line(dt: &DateTime<Utc>) -> String {
    format!("DTSTART:{}", dt.format("%Y%m%dT%H%M%SZ"))
}
