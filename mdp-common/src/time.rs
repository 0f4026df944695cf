//! Timestamp utilities

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// Current UTC time, used to stamp fetched payloads
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Configured millisecond values (intervals, timeouts, backoff) as a `Duration`
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Convert epoch milliseconds to a UTC timestamp
///
/// Returns `None` for values chrono cannot represent.
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Parse an RFC 3339 timestamp into UTC
///
/// Offsets other than `Z` are converted; anything unparseable yields `None`.
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
