//! Helpers for resolving the server's configured local timezone.

use time::{Date, OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

use crate::{Error, timestamp::Timestamp};

/// Get the current UTC offset of `canonical_timezone`, e.g. "Pacific/Auckland".
///
/// Returns `None` if the timezone name is not recognised.
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

/// The current wall-clock time in `canonical_timezone`.
///
/// # Errors
///
/// Returns [Error::InvalidTimezoneError] if the timezone name is not recognised.
pub fn local_now(canonical_timezone: &str) -> Result<Timestamp, Error> {
    get_local_offset(canonical_timezone)
        .map(Timestamp::now)
        .ok_or_else(|| Error::InvalidTimezoneError(canonical_timezone.to_owned()))
}

/// Today's date in `canonical_timezone`.
///
/// # Errors
///
/// Returns [Error::InvalidTimezoneError] if the timezone name is not recognised.
pub fn local_today(canonical_timezone: &str) -> Result<Date, Error> {
    local_now(canonical_timezone).map(|now| now.date())
}
