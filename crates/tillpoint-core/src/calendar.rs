//! # Calendar
//!
//! Date arithmetic for due dates and repair warranties. The clock is read
//! by the caller; everything here takes explicit dates.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};

/// Adds `days` business days to `start`, skipping Sundays.
///
/// The start day itself is not counted; the time of day is preserved.
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use tillpoint_core::calendar::add_business_days;
///
/// // Friday 2026-03-13 + 7 business days = Saturday 2026-03-21
/// let delivered = Utc.with_ymd_and_hms(2026, 3, 13, 15, 0, 0).unwrap();
/// let expires = add_business_days(delivered, 7);
/// assert_eq!(expires, Utc.with_ymd_and_hms(2026, 3, 21, 15, 0, 0).unwrap());
/// ```
pub fn add_business_days(start: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    let mut current = start;
    let mut added = 0;
    while added < days {
        current += Duration::days(1);
        if current.weekday() != Weekday::Sun {
            added += 1;
        }
    }
    current
}

/// Due date for credit terms: plain calendar days.
pub fn due_date(today: NaiveDate, terms_days: u32) -> NaiveDate {
    today + Duration::days(i64::from(terms_days))
}
