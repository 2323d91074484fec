//! A wall-clock timestamp stored as `YYYY-MM-DD HH:MM:SS` text.
//!
//! SQLite compares these strings lexically, which matches chronological
//! order, so range filters can be done with plain string comparisons.

use std::{
    fmt::Display,
    ops::{Add, Sub},
};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{
    Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

const STORAGE_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const SUBSECOND_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
const MINUTE_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");
const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// A local date and time with second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(PrimitiveDateTime);

impl Timestamp {
    /// Create a timestamp, dropping any sub-second part.
    pub fn new(date_time: PrimitiveDateTime) -> Self {
        Self(date_time.replace_nanosecond(0).unwrap_or(date_time))
    }

    /// The current time at `offset`.
    pub fn now(offset: UtcOffset) -> Self {
        let now = OffsetDateTime::now_utc().to_offset(offset);

        Self::new(PrimitiveDateTime::new(now.date(), now.time()))
    }

    /// Midnight at the start of `date`.
    pub fn start_of_day(date: Date) -> Self {
        Self(PrimitiveDateTime::new(date, Time::MIDNIGHT))
    }

    /// Parse a timestamp leniently.
    ///
    /// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM`, `YYYY-MM-DD HH:MM:SS` with
    /// optional fractional seconds, a `T` separator, a trailing `Z`, or a full
    /// RFC 3339 string with an offset. Offsets are dropped and the wall-clock
    /// time is kept.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();

        if text.is_empty() {
            return None;
        }

        if let Ok(date_time) = OffsetDateTime::parse(text, &Rfc3339) {
            return Some(Self::new(PrimitiveDateTime::new(
                date_time.date(),
                date_time.time(),
            )));
        }

        let normalized = text
            .trim_end_matches(['Z', 'z'])
            .replacen(['T', 't'], " ", 1);

        for format in [STORAGE_FORMAT, SUBSECOND_FORMAT, MINUTE_FORMAT] {
            if let Ok(date_time) = PrimitiveDateTime::parse(&normalized, format) {
                return Some(Self::new(date_time));
            }
        }

        Date::parse(&normalized, DATE_FORMAT)
            .ok()
            .map(Self::start_of_day)
    }

    /// The calendar date of the timestamp.
    pub fn date(&self) -> Date {
        self.0.date()
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let formatted = self.0.format(STORAGE_FORMAT).map_err(|_| std::fmt::Error)?;

        f.write_str(&formatted)
    }
}

impl ToSql for Timestamp {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Timestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        Timestamp::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("invalid timestamp \"{text}\"").into()))
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;

        Timestamp::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp \"{text}\"")))
    }
}
