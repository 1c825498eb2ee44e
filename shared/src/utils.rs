// Time helpers shared by the engine and any front end drawing its output.
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

/// Calendar day (UTC) a unix timestamp falls on.
pub fn utc_day(time: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(time, 0).map(|dt| dt.date_naive())
}

/// Unix timestamp of 1 January 00:00 UTC in the year containing `time`.
pub fn start_of_utc_year(time: i64) -> Option<i64> {
    let year = DateTime::from_timestamp(time, 0)?.year();
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .map(|dt| dt.timestamp())
}

/// Compact timestamp for generated file names, e.g. `20240102-153000`.
pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d-%H%M%S").to_string()
}
