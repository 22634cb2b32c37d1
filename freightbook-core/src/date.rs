use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime};

use crate::error::{FreightError, Result};

const DAY_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// A calendar day written as fixed-width `YYYY-MM-DD`.
///
/// Store keys for the daily index are the `Display` form, so byte order of keys
/// equals chronological order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayKey(Date);

impl DayKey {
    pub fn from_date(date: Date) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u8, day: u8) -> Result<Self> {
        let month = Month::try_from(month)
            .map_err(|_| FreightError::ValidationFailure(format!("month {month} is out of range")))?;
        Date::from_calendar_date(year, month, day)
            .map(Self)
            .map_err(|e| FreightError::ValidationFailure(format!("invalid date: {e}")))
    }

    pub fn today() -> Self {
        Self(OffsetDateTime::now_utc().date())
    }

    pub fn date(&self) -> Date {
        self.0
    }
}

impl FromStr for DayKey {
    type Err = FreightError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 10 {
            return Err(FreightError::ValidationFailure(format!(
                "date `{s}` must be written as YYYY-MM-DD"
            )));
        }
        Date::parse(s, DAY_FORMAT).map(Self).map_err(|e| {
            FreightError::ValidationFailure(format!("date `{s}` must be written as YYYY-MM-DD ({e})"))
        })
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            self.0.month() as u8,
            self.0.day()
        )
    }
}

impl TryFrom<String> for DayKey {
    type Error = FreightError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DayKey> for String {
    fn from(value: DayKey) -> Self {
        value.to_string()
    }
}

/// Milliseconds since the unix epoch.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
