//! Canonical date and timestamp formatting.
//!
//! Every read path runs stored values through [`normalize_date`] or
//! [`normalize_timestamp`] so callers see the same strings whichever backend
//! produced them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Canonical calendar date format (`YYYY-MM-DD`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Canonical timestamp format (`YYYY-MM-DD HH:MM:SS`, UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC date as `YYYY-MM-DD`.
pub fn today() -> String {
    Utc::now().date_naive().format(DATE_FORMAT).to_string()
}

/// Current UTC time as `YYYY-MM-DD HH:MM:SS`.
pub fn now_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Normalize a date-like string to `YYYY-MM-DD`.
///
/// Accepts a plain date, an RFC 3339 timestamp or a canonical timestamp.
/// Anything else is returned unchanged.
pub fn normalize_date(value: &str) -> String {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        return date.format(DATE_FORMAT).to_string();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.with_timezone(&Utc).date_naive().format(DATE_FORMAT).to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT) {
        return dt.date().format(DATE_FORMAT).to_string();
    }
    value.to_string()
}

/// Normalize a timestamp-like string to `YYYY-MM-DD HH:MM:SS` in UTC.
///
/// A bare date maps to midnight. Unparseable input is returned unchanged.
pub fn normalize_timestamp(value: &str) -> String {
    let trimmed = value.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT) {
        return dt.format(TIMESTAMP_FORMAT).to_string();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return midnight.format(TIMESTAMP_FORMAT).to_string();
        }
    }
    value.to_string()
}
