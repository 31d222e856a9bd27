//! Per-row filters.
//!
//! Numeric, categorical, date and parity filters test each record on its
//! own. Cross-month specs need the whole herd history and are left to
//! [`crate::multi`].

use tracing::{debug, info, warn};

use dhi_model::{FilterKind, FilterSpec, HerdDataset, NullPolicy, Result, within};

use crate::history::history_fill;

/// Applies every enabled non-temporal spec in order. Returns a new dataset.
///
/// Specs on a field the data does not have are skipped with a warning;
/// cross-month specs are skipped.
pub fn apply_filters(dataset: &HerdDataset, specs: &[FilterSpec]) -> Result<HerdDataset> {
    let mut current = dataset.clone();
    for spec in specs.iter().filter(|s| s.enabled) {
        if spec.is_cross_month() {
            debug!(field = %spec.field, "cross-month spec left for multi-filter");
            continue;
        }
        current = apply_spec(&current, spec)?;
    }
    Ok(current)
}

/// Applies one non-temporal spec.
pub fn apply_spec(dataset: &HerdDataset, spec: &FilterSpec) -> Result<HerdDataset> {
    if !dataset.has_column(&spec.field) {
        warn!(field = %spec.field, "filter skipped: field not in data");
        return Ok(dataset.clone());
    }
    let source = if spec.null_policy == NullPolicy::HistoryFill {
        history_fill(dataset, &spec.field)?
    } else {
        dataset.clone()
    };
    let Some(mask) = row_mask(&source, spec)? else {
        return Ok(source);
    };
    let before = source.height();
    let filtered = source.filter_rows(&mask)?;
    info!(
        field = %spec.field,
        before,
        after = filtered.height(),
        "filter applied"
    );
    Ok(filtered)
}

/// Per-row pass/fail for a spec; `None` when the spec keeps every row.
pub fn row_mask(dataset: &HerdDataset, spec: &FilterSpec) -> Result<Option<Vec<bool>>> {
    let accept_null = spec.null_policy == NullPolicy::Accept;
    let field = spec.field.as_str();
    let mask = match &spec.kind {
        FilterKind::NumericRange { min, max } => dataset
            .f64_values(field)?
            .into_iter()
            .map(|value| value.map_or(accept_null, |v| within(v, *min, *max)))
            .collect(),
        FilterKind::Categorical { allowed } => {
            if allowed.is_empty() {
                return Ok(None);
            }
            dataset
                .text_values(field)?
                .into_iter()
                .map(|value| value.map_or(accept_null, |v| allowed.contains(&v)))
                .collect()
        }
        FilterKind::DateRange { start, end } => dataset
            .date_values(field)?
            .into_iter()
            .map(|value| value.map_or(accept_null, |d| within(d, *start, *end)))
            .collect(),
        FilterKind::ParityRange { min, max } => dataset
            .i64_values(field)?
            .into_iter()
            .map(|value| value.map_or(accept_null, |p| within(p, *min, *max)))
            .collect(),
        FilterKind::CrossMonth { min, max, .. } => dataset
            .f64_values(field)?
            .into_iter()
            .map(|value| value.map_or(accept_null, |v| within(v, Some(*min), Some(*max))))
            .collect(),
    };
    Ok(Some(mask))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use polars::prelude::{DataFrame, IntoColumn, NamedFrom, Series};

    use dhi_model::keys;

    use super::*;

    fn dataset() -> HerdDataset {
        HerdDataset::new(
            "a.csv",
            DataFrame::new(vec![
                Series::new(keys::FARM_ID.into(), vec!["F1", "F2", "F1", "F1"]).into_column(),
                Series::new(keys::MANAGEMENT_ID.into(), vec!["1", "2", "3", "1"]).into_column(),
                Series::new(keys::PARITY.into(), vec![Some(1i64), Some(2), Some(3), None]).into_column(),
                Series::new(
                    keys::SAMPLE_DATE.into(),
                    vec!["2024-01-05", "2024-02-05", "2024-03-05", "2024-02-06"],
                )
                .into_column(),
                Series::new(keys::PROTEIN_PCT.into(), vec![Some(3.0), Some(4.0), None, Some(3.5)]).into_column(),
            ])
            .unwrap(),
        )
    }

    fn ids(dataset: &HerdDataset) -> Vec<String> {
        dataset
            .text_values(keys::MANAGEMENT_ID)
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    }

    #[test]
    fn numeric_bounds_are_inclusive() {
        let spec = FilterSpec::numeric_range(keys::PROTEIN_PCT, Some(3.0), Some(3.5));
        let filtered = apply_filters(&dataset(), &[spec]).unwrap();
        assert_eq!(ids(&filtered), vec!["1", "1"]);
    }

    #[test]
    fn null_policy_accept_keeps_nulls() {
        let spec = FilterSpec::numeric_range(keys::PROTEIN_PCT, Some(3.6), None)
            .with_null_policy(NullPolicy::Accept);
        let filtered = apply_filters(&dataset(), &[spec]).unwrap();
        assert_eq!(ids(&filtered), vec!["2", "3"]);
    }

    #[test]
    fn empty_allow_list_is_no_op() {
        let spec = FilterSpec::categorical(keys::FARM_ID, Vec::new());
        assert_eq!(apply_filters(&dataset(), &[spec]).unwrap().height(), 4);
        let spec = FilterSpec::categorical(keys::FARM_ID, vec!["F2".to_string()]);
        assert_eq!(ids(&apply_filters(&dataset(), &[spec]).unwrap()), vec!["2"]);
    }

    #[test]
    fn date_and_parity_ranges_keep_rows() {
        let date = FilterSpec::date_range(
            keys::SAMPLE_DATE,
            NaiveDate::from_ymd_opt(2024, 2, 1),
            NaiveDate::from_ymd_opt(2024, 2, 29),
        );
        let parity = FilterSpec::parity_range(keys::PARITY, Some(2), Some(5));
        let filtered = apply_filters(&dataset(), &[date, parity]).unwrap();
        assert_eq!(ids(&filtered), vec!["2"]);
    }

    #[test]
    fn absent_field_and_disabled_specs_are_skipped() {
        let specs = [
            FilterSpec::numeric_range("fat_pct", Some(99.0), None),
            FilterSpec::numeric_range(keys::PROTEIN_PCT, Some(99.0), None).disabled(),
            FilterSpec::cross_month(keys::PROTEIN_PCT, 99.0, 100.0, 1),
        ];
        assert_eq!(apply_filters(&dataset(), &specs).unwrap().height(), 4);
    }

    #[test]
    fn history_fill_then_reject() {
        let spec = FilterSpec::parity_range(keys::PARITY, Some(1), Some(1))
            .with_null_policy(NullPolicy::HistoryFill);
        let filtered = apply_filters(&dataset(), &[spec]).unwrap();
        // animal F1/1 has parity 1 in January; the February null is filled
        assert_eq!(ids(&filtered), vec!["1", "1"]);
        assert!(filtered.has_column("parity_historical_filled"));
    }
}
