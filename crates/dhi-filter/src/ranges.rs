//! Observed value ranges and suggested filter bounds.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info};

use dhi_common::{mean, round_to};
use dhi_model::{FieldRegistry, FilterSpec, HerdDataset, Result, YearMonth, keys};

/// Observed range of one numeric field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRange {
    pub min: f64,
    pub max: f64,
    /// Rounded to 2 decimals.
    pub mean: f64,
    pub count: usize,
    pub suggested_min: f64,
    pub suggested_max: f64,
}

impl FieldRange {
    fn observe(field: &str, values: &[f64]) -> Option<Self> {
        let min = values.iter().copied().reduce(f64::min)?;
        let max = values.iter().copied().reduce(f64::max)?;
        let avg = mean(values)?;
        let (suggested_min, suggested_max) = suggested_bounds(field, min, max);
        Some(Self {
            min,
            max,
            mean: round_to(avg, 2),
            count: values.len(),
            suggested_min: round_to(suggested_min, 2),
            suggested_max: round_to(suggested_max, 2),
        })
    }
}

/// Field-specific widening of the observed range.
fn suggested_bounds(field: &str, min: f64, max: f64) -> (f64, f64) {
    let spread_margin = (max - min) * 0.1;
    match field {
        keys::PROTEIN_PCT => ((min - spread_margin).max(0.0), (max + spread_margin).min(10.0)),
        keys::FAT_PCT => ((min - spread_margin).max(0.0), (max + spread_margin).min(15.0)),
        keys::SOMATIC_CELL_COUNT | keys::MILK_YIELD => (0.0, max * 1.2),
        keys::LACTATION_DAYS => (0.0, (max * 1.1).min(500.0)),
        _ => {
            let margin = if max > min { spread_margin } else { max.abs() * 0.1 };
            (min - margin, max + margin)
        }
    }
}

/// Ranges of every numeric field across some datasets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataRanges {
    /// Distinct months with data.
    pub months: usize,
    pub fields: BTreeMap<String, FieldRange>,
}

impl DataRanges {
    pub fn get(&self, field: &str) -> Option<&FieldRange> {
        self.fields.get(field)
    }
}

/// Computes [`DataRanges`] over the registry's numeric fields (parity
/// excluded). Fields with no values are absent from the result.
pub fn data_ranges(datasets: &[HerdDataset], registry: &FieldRegistry) -> Result<DataRanges> {
    let mut months: BTreeSet<YearMonth> = BTreeSet::new();
    for dataset in datasets {
        months.extend(dataset.year_months()?.into_iter().flatten());
    }

    let mut fields = BTreeMap::new();
    for field in registry.numeric_keys() {
        if field == keys::PARITY {
            continue;
        }
        let mut values = Vec::new();
        for dataset in datasets.iter().filter(|d| d.has_column(field)) {
            values.extend(dataset.f64_values(field)?.into_iter().flatten());
        }
        if let Some(range) = FieldRange::observe(field, &values) {
            debug!(field, min = range.min, max = range.max, count = range.count, "field range");
            fields.insert(field.to_string(), range);
        }
    }
    info!(fields = fields.len(), months = months.len(), "data ranges computed");
    Ok(DataRanges {
        months: months.len(),
        fields,
    })
}

/// A cross-month spec with sensible default bounds for `field`.
///
/// Requires one matching month and rejects nulls. Without an observed range
/// the bounds are 0..100.
pub fn suggested_defaults(field: &str, ranges: &DataRanges) -> FilterSpec {
    let Some(range) = ranges.get(field) else {
        return FilterSpec::cross_month(field, 0.0, 100.0, 1);
    };
    let (lo, hi) = (range.suggested_min, range.suggested_max);
    let (min, max) = match field {
        keys::PROTEIN_PCT | keys::FAT_PCT => (lo.max(range.mean - 0.5), hi.min(range.mean + 0.5)),
        keys::SOMATIC_CELL_COUNT => (lo, hi.min(range.mean * 1.5)),
        keys::MILK_YIELD => (lo.max(range.mean * 0.8), hi),
        _ => (lo, hi),
    };
    FilterSpec::cross_month(field, round_to(min, 2), round_to(max, 2), 1)
}
