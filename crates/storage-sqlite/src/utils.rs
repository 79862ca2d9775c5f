//! Text encodings shared by the repositories.

use chrono::{DateTime, SecondsFormat, Utc};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Sqlite caps bound parameters per statement; keep IN lists below it.
pub const SQLITE_IN_CHUNK: usize = 500;

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}
