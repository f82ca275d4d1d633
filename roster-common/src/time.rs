//! Timestamp utilities

use chrono::{DateTime, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as Unix epoch milliseconds (override `last_modified` stamps)
pub fn now_millis() -> i64 {
    now().timestamp_millis()
}

/// Convert epoch milliseconds back to a UTC timestamp
///
/// Returns `None` for values chrono cannot represent.
pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
