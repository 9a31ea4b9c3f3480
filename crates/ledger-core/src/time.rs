use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::error::{LedgerError, Result};

// SQLite column defaults write `YYYY-MM-DD HH:MM:SS`; rows inserted by this
// process carry RFC3339 with microseconds. Reads must tolerate both families,
// with and without sub-second precision or an explicit offset.
const ZONED_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%:z"];
const NAIVE_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// Parses a timestamp as persisted by the store, trying each known layout
/// before failing. Naive values are taken as UTC.
pub fn parse_store_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for layout in ZONED_LAYOUTS {
        if let Ok(parsed) = DateTime::parse_from_str(trimmed, layout) {
            return Ok(parsed.with_timezone(&Utc));
        }
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, layout) {
            return Ok(parsed.and_utc());
        }
    }

    Err(LedgerError::Timestamp(raw.to_string()))
}

/// Canonical storage format: RFC3339 with microsecond precision, UTC.
pub fn format_store_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}
