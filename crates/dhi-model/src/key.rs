//! Animal identity and calendar-month keys.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Identity of one animal across all datasets: (farm id, management id).
///
/// Management ids are compared as text, so `"007"` and `"7"` are different
/// animals.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnimalKey {
    pub farm_id: Option<String>,
    pub management_id: String,
}

impl AnimalKey {
    pub fn new(farm_id: Option<String>, management_id: impl Into<String>) -> Self {
        Self {
            farm_id,
            management_id: management_id.into(),
        }
    }
}

impl fmt::Display for AnimalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.farm_id {
            Some(farm) => write!(f, "{farm}/{}", self.management_id),
            None => f.write_str(&self.management_id),
        }
    }
}

/// A calendar month. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// First day of the month.
    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Renders the month with a chrono format string, e.g. `%Y年%m月`.
    pub fn format(self, pattern: &str) -> String {
        match self.first_day() {
            Some(day) => day.format(pattern).to_string(),
            None => self.to_string(),
        }
    }

    /// Parses the `YYYY-MM` form produced by `Display`.
    pub fn parse(value: &str) -> Option<Self> {
        let (year, month) = value.trim().split_once('-')?;
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
