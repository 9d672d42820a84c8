use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ActivityError;

/// A calendar month in UTC. Day-of-month is implicitly the 1st.
///
/// Ordering is chronological. Serialized as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Parses a month-block timestamp. It must fall on the first day of a
    /// month once converted to UTC. The time of day is not checked, so
    /// `2023-09-01T00:00:00-07:00` is September.
    pub fn from_timestamp(raw: &str) -> Result<Self, ActivityError> {
        let instant = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| ActivityError::invalid_timestamp(raw, e.to_string()))?
            .with_timezone(&Utc);

        if instant.day() != 1 {
            return Err(ActivityError::invalid_timestamp(
                raw,
                "not the first day of a month in UTC",
            ));
        }
        Ok(Self::containing(instant))
    }

    /// The month an instant falls in.
    pub fn containing(instant: DateTime<Utc>) -> Self {
        Self {
            year: instant.year(),
            month: instant.month(),
        }
    }

    /// The current UTC month. Callers use this to flag a still-accumulating
    /// month as partial.
    pub fn current() -> Self {
        Self::containing(Utc::now())
    }

    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                month: self.month + 1,
                ..self
            }
        }
    }

    /// Dashboard axis label, `M/yy` (e.g. `6/21`).
    pub fn short_label(&self) -> String {
        format!("{}/{:02}", self.month, self.year.rem_euclid(100))
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Accepts `YYYY-MM`, or any RFC 3339 timestamp (taking the UTC month it
/// falls in).
impl FromStr for MonthKey {
    type Err = ActivityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((year, month)) = s.split_once('-').filter(|_| s.len() == 7) {
            let year: i32 = year
                .parse()
                .map_err(|_| ActivityError::invalid_timestamp(s, "year is not a number"))?;
            let month: u32 = month
                .parse()
                .map_err(|_| ActivityError::invalid_timestamp(s, "month is not a number"))?;
            return NaiveDate::from_ymd_opt(year, month, 1)
                .map(|_| Self { year, month })
                .ok_or_else(|| ActivityError::invalid_timestamp(s, "month out of range"));
        }

        let instant = DateTime::parse_from_rfc3339(s)
            .map_err(|e| ActivityError::invalid_timestamp(s, e.to_string()))?;
        Ok(Self::containing(instant.with_timezone(&Utc)))
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
