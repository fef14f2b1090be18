use std::cmp;
use std::fmt;

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer};

use crate::error::DateError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Accepts `YYYY-MM-DD` (taken as midnight) or `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_date(input: &str) -> Result<NaiveDateTime, DateError> {
    let error = || DateError::Format {
        input: input.to_string(),
    };
    // chrono skips whitespace ahead of numeric fields
    if input.contains(char::is_whitespace) {
        return Err(error());
    }
    NaiveDateTime::parse_from_str(input, DATE_TIME_FORMAT)
        .or_else(|_| {
            NaiveDate::parse_from_str(input, DATE_FORMAT)
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .map_err(|_| error())
}

/// Accepts `YYYY-MM` and returns the first day of that month.
pub fn parse_month(input: &str) -> Result<NaiveDate, DateError> {
    let error = || DateError::Month {
        input: input.to_string(),
    };
    if input.contains(char::is_whitespace) {
        return Err(error());
    }
    NaiveDate::parse_from_str(&format!("{}-01", input), DATE_FORMAT)
        .map_err(|_| error())
}

/// Config deserializer for an optional window bound.
pub fn deserialize_bound<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| parse_date(&s).map_err(serde::de::Error::custom))
        .transpose()
}

pub trait DateBoundaries {
    fn start_of_month(&self) -> Option<Self>
    where
        Self: Sized;

    fn end_of_month(&self) -> Option<Self>
    where
        Self: Sized;
}

impl DateBoundaries for NaiveDate {
    fn start_of_month(&self) -> Option<Self> {
        self.with_day(1)
    }

    fn end_of_month(&self) -> Option<Self> {
        self.checked_add_months(Months::new(1))
            .and_then(|d| d.with_day(1))
            .and_then(|d| d.checked_sub_days(Days::new(1)))
    }
}

/// Time range events are clipped to. A missing bound is unbounded.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct TimeWindow {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeWindow {
    pub fn new(
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Self {
        Self { start, end }
    }

    /// From the first of the month at midnight until the first of the next.
    pub fn month(date: NaiveDate) -> Option<Self> {
        let start = date.start_of_month()?;
        let next = date.end_of_month()?.checked_add_days(Days::new(1))?;
        Some(Self::new(
            Some(start.and_time(NaiveTime::MIN)),
            Some(next.and_time(NaiveTime::MIN)),
        ))
    }

    /// Clip an interval to the window, `None` when nothing of it remains.
    pub fn clip(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Option<(NaiveDateTime, NaiveDateTime)> {
        if self.start.is_some_and(|ws| end < ws)
            || self.end.is_some_and(|we| start > we)
        {
            return None;
        }

        let start = self.start.map_or(start, |ws| cmp::max(start, ws));
        let end = self.end.map_or(end, |we| cmp::min(end, we));
        (start < end).then_some((start, end))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.start {
            Some(start) => write!(f, "{}", start)?,
            None => write!(f, "…")?,
        }
        write!(f, " — ")?;
        match self.end {
            Some(end) => write!(f, "{}", end),
            None => write!(f, "…"),
        }
    }
}
