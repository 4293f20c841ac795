//! The ledger's unit of time: a calendar month.

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime};

use crate::Error;

const MIN_YEAR: i32 = 1000;
const MAX_YEAR: i32 = 9999;

/// A calendar month, written as `YYYY-MM`.
///
/// Periods are ordered chronologically, and because the year is always four digits the text
/// encoding sorts the same way, which the database queries rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u8,
}

impl Period {
    /// Create a period, checking that the year has four digits and the month is 1-12.
    pub fn new(year: i32, month: u8) -> Result<Self, Error> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) || !(1..=12).contains(&month) {
            return Err(Error::InvalidPeriod(format!("{year:04}-{month:02}")));
        }

        Ok(Self { year, month })
    }

    /// The period containing `date`.
    ///
    /// # Errors
    /// Returns [Error::InvalidPeriod] if the date's year does not have four digits.
    pub fn containing(date: Date) -> Result<Self, Error> {
        Self::new(date.year(), date.month() as u8)
    }

    /// The period containing `timestamp`, in the timestamp's own offset.
    pub fn containing_timestamp(timestamp: OffsetDateTime) -> Result<Self, Error> {
        Self::containing(timestamp.date())
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u8 {
        self.month
    }

    /// The first day of the period.
    pub fn first_day(self) -> Result<Date, Error> {
        Month::try_from(self.month)
            .and_then(|month| Date::from_calendar_date(self.year, month, 1))
            .map_err(|_| Error::InvalidPeriod(self.to_string()))
    }

    /// The period immediately after this one, or `None` after 9999-12.
    pub fn next(self) -> Option<Self> {
        if self.month == 12 {
            Self::new(self.year + 1, 1).ok()
        } else {
            Self::new(self.year, self.month + 1).ok()
        }
    }

    /// The period immediately before this one, or `None` before 1000-01.
    pub fn previous(self) -> Option<Self> {
        if self.month == 1 {
            Self::new(self.year - 1, 12).ok()
        } else {
            Self::new(self.year, self.month - 1).ok()
        }
    }

    /// Iterate over the periods from `self` to `end`, both inclusive.
    ///
    /// The iterator is empty if `end` is before `self`.
    pub fn through(self, end: Period) -> impl Iterator<Item = Period> {
        std::iter::successors(Some(self), |period| period.next())
            .take_while(move |period| *period <= end)
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidPeriod(text.to_owned());

        let (year, month) = text.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }

        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;

        Self::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Period {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

impl ToSql for Period {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Period {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}
