//! Cycletime strings (`YYYYMMDDTHHMMZ`) and conversions to and from UTC
//! datetimes.
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

pub const CYCLETIME_FORMAT: &str = "%Y%m%dT%H%MZ";

pub fn cycletime_to_datetime(cycletime: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let naive = NaiveDateTime::parse_from_str(cycletime.trim(), CYCLETIME_FORMAT)?;
    Ok(Utc.from_utc_datetime(&naive))
}

pub fn datetime_to_cycletime(time: &DateTime<Utc>) -> String {
    time.format(CYCLETIME_FORMAT).to_string()
}

/// Seconds since 1970-01-01 as stored in a `time` coordinate
pub fn seconds_to_datetime(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

/// Date portion of a cycletime as an integer, e.g. 20200601
pub fn cycletime_day(cycletime: &str) -> Option<u32> {
    cycletime.get(..8)?.parse().ok()
}
