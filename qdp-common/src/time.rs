//! Timestamp utilities

use chrono::{DateTime, SecondsFormat, Utc};

/// Format of the timestamp embedded in export file names
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// 14-digit `YYYYMMDDHHMMSS` form used in export file names
pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.format(FILE_TIMESTAMP_FORMAT).to_string()
}

/// Return the trailing `_YYYYMMDDHHMMSS` timestamp of a file stem, if any
pub fn file_timestamp_suffix(stem: &str) -> Option<&str> {
    let (_, suffix) = stem.rsplit_once('_')?;
    if suffix.len() == 14 && suffix.bytes().all(|b| b.is_ascii_digit()) {
        Some(suffix)
    } else {
        None
    }
}

/// Fixed-width RFC 3339 text used where timestamps are stored as TEXT
///
/// Fixed width keeps lexical and chronological order identical.
pub fn to_storage_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
