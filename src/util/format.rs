use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::error::{MetricsError, Result};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Which end of a commit window a date string describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    Since,
    Until,
}

/// Format a commit time the way `git log` prints author dates
/// (`2023-11-14 22:13:20 +0100`)
pub fn format_author_date(seconds: i64, offset_minutes: i32) -> String {
    let format = format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute]"
    );

    let offset = UtcOffset::from_whole_seconds(offset_minutes * 60).unwrap_or(UtcOffset::UTC);
    OffsetDateTime::from_unix_timestamp(seconds)
        .ok()
        .and_then(|dt| dt.to_offset(offset).format(&format).ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parse a window bound into a Unix timestamp.
///
/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (UTC). A plain
/// `Until` date covers the whole day.
pub fn parse_date_bound(value: &str, bound: DateBound) -> Result<i64> {
    let value = value.trim();

    if let Ok(dt) = OffsetDateTime::parse(value, &Rfc3339) {
        return Ok(dt.unix_timestamp());
    }

    let date = Date::parse(value, format_description!("[year]-[month]-[day]")).map_err(|_| {
        MetricsError::config(format!(
            "unrecognized date '{}' (expected RFC 3339 or YYYY-MM-DD)",
            value
        ))
    })?;
    let midnight = date.midnight().assume_utc().unix_timestamp();

    Ok(match bound {
        DateBound::Since => midnight,
        DateBound::Until => midnight + SECONDS_PER_DAY - 1,
    })
}
