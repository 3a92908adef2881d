//! Local calendar-day helpers for day-bucketed statistics.

use chrono::{Local, NaiveDate, TimeZone, Utc};

/// Local calendar date of an epoch-seconds timestamp.
pub fn local_date(ts: i64) -> NaiveDate {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.date_naive())
        .or_else(|| Utc.timestamp_opt(ts, 0).single().map(|dt| dt.date_naive()))
        .unwrap_or(NaiveDate::MIN)
}

/// Epoch seconds of local midnight starting `date`.
///
/// Falls back to UTC midnight when local midnight does not exist (a DST gap).
pub fn start_of_local_day(date: NaiveDate) -> i64 {
    let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
        return 0;
    };
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight).timestamp())
}

/// Epoch seconds of the next local midnight after `ts`.
pub fn end_of_local_day(ts: i64) -> i64 {
    let date = local_date(ts);
    match date.succ_opt() {
        Some(next) => start_of_local_day(next),
        None => i64::MAX,
    }
}

/// Whole local days from the day containing `now` to the day containing `ts`.
/// Negative for past days.
pub fn day_offset(ts: i64, now: i64) -> i64 {
    (local_date(ts) - local_date(now)).num_days()
}
