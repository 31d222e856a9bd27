//! Sample-date coverage of datasets.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use dhi_model::{HerdDataset, Result, YearMonth};

/// First and last sample date plus the months with data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Distinct months with at least one record, chronological.
    pub months: Vec<YearMonth>,
}

impl DateRange {
    fn from_dates(dates: impl IntoIterator<Item = NaiveDate>) -> Option<Self> {
        let dates: BTreeSet<NaiveDate> = dates.into_iter().collect();
        let start = *dates.first()?;
        let end = *dates.last()?;
        let months: BTreeSet<YearMonth> = dates.iter().copied().map(YearMonth::from_date).collect();
        Some(Self {
            start,
            end,
            months: months.into_iter().collect(),
        })
    }

    /// Number of calendar days covered, both ends included.
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Date range of one dataset; `None` when it has no valid sample dates.
pub fn date_range(dataset: &HerdDataset) -> Result<Option<DateRange>> {
    Ok(DateRange::from_dates(dataset.sample_dates()?.into_iter().flatten()))
}

/// Date range across several datasets.
pub fn overall_date_range(datasets: &[HerdDataset]) -> Result<Option<DateRange>> {
    let mut dates = Vec::new();
    for dataset in datasets {
        dates.extend(dataset.sample_dates()?.into_iter().flatten());
    }
    Ok(DateRange::from_dates(dates))
}
