//! Cross-month multi-criteria filtering.
//!
//! Selected datasets are merged, per-row filters are applied, and then every
//! cross-month spec computes its own set of passing animals. An animal is
//! kept when it passes every spec, and all of its base-filtered rows are
//! returned, not only the matching months.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use dhi_model::{
    AnimalKey, FilterKind, FilterSpec, HerdDataset, NullPolicy, Outcome, Phase, Result, RunHooks,
    YearMonth, keys,
};

use crate::base::{apply_filters, row_mask};
use crate::history::history_fill;

/// Source name given to the merged working table.
pub const MERGED_SOURCE: &str = "merged";

/// Merges the datasets whose source is in `selected` and filters them.
///
/// Cancellation is checked between phases and between cross-month specs;
/// a cancelled run returns an empty dataset.
pub fn apply_multi_filter(
    datasets: &[HerdDataset],
    specs: &[FilterSpec],
    selected: &[String],
    hooks: RunHooks<'_>,
) -> Result<HerdDataset> {
    let chosen: Vec<&HerdDataset> = datasets
        .iter()
        .filter(|d| selected.contains(&d.source_file))
        .collect();
    if chosen.is_empty() {
        warn!(selected = selected.len(), "no selected datasets to filter");
        return Ok(HerdDataset::empty(MERGED_SOURCE));
    }
    if hooks.is_cancelled() {
        return Ok(cancelled());
    }

    let merged = HerdDataset::concat(&chosen, MERGED_SOURCE)?;
    let months = known_months(&merged)?;
    info!(
        files = chosen.len(),
        rows = merged.height(),
        months = months.len(),
        "merged selected datasets"
    );
    hooks.report(Phase::Merge, 10);
    if hooks.is_cancelled() {
        return Ok(cancelled());
    }

    let base = apply_filters(&merged, specs)?;
    info!(rows = base.height(), "base filters applied");
    hooks.report(Phase::BaseFilter, 30);
    if base.is_empty() || !base.has_column(keys::MANAGEMENT_ID) {
        return Ok(base);
    }

    let cross: Vec<&FilterSpec> = specs
        .iter()
        .filter(|s| s.enabled && s.is_cross_month())
        .collect();
    if cross.is_empty() {
        hooks.report(Phase::Done, 100);
        return Ok(base);
    }

    let mut passing_sets = Vec::with_capacity(cross.len());
    for (index, spec) in cross.iter().enumerate() {
        if hooks.is_cancelled() {
            return Ok(cancelled());
        }
        if !base.has_column(&spec.field) {
            warn!(field = %spec.field, "cross-month filter skipped: field not in data");
            continue;
        }
        let passing = passing_animals(&base, spec, &months)?;
        info!(field = %spec.field, animals = passing.len(), "cross-month filter evaluated");
        passing_sets.push(passing);
        let percent = 30 + (index + 1) * 50 / cross.len();
        hooks.report(
            Phase::CrossMonth {
                index,
                total: cross.len(),
                field: spec.field.clone(),
            },
            u8::try_from(percent).unwrap_or(80),
        );
    }

    if hooks.is_cancelled() {
        return Ok(cancelled());
    }
    let animals = base.animal_keys()?;
    let passing = match passing_sets.split_first() {
        Some((first, rest)) => first
            .iter()
            .filter(|animal| rest.iter().all(|set| set.contains(*animal)))
            .cloned()
            .collect::<BTreeSet<_>>(),
        None => animals.iter().flatten().cloned().collect(),
    };
    info!(animals = passing.len(), "animals passing every cross-month filter");
    hooks.report(Phase::Intersect, 85);

    let keep: Vec<bool> = animals
        .iter()
        .map(|animal| animal.as_ref().is_some_and(|a| passing.contains(a)))
        .collect();
    let result = base.filter_rows(&keep)?;
    info!(rows = result.height(), animals = passing.len(), "multi-filter finished");
    hooks.report(Phase::Extract, 95);
    hooks.report(Phase::Done, 100);
    Ok(result)
}

/// [`apply_multi_filter`] reported as an [`Outcome`].
pub fn run_multi_filter(
    datasets: &[HerdDataset],
    specs: &[FilterSpec],
    selected: &[String],
    hooks: RunHooks<'_>,
) -> Outcome<HerdDataset> {
    Outcome::from_result(
        apply_multi_filter(datasets, specs, selected, hooks),
        MERGED_SOURCE,
        |result| {
            let animals = result
                .animal_keys()
                .map(|keys| keys.into_iter().flatten().collect::<BTreeSet<_>>().len())
                .unwrap_or_default();
            format!("{} rows from {animals} animals passed the filters", result.height())
        },
    )
}

/// Animals whose value is within bounds in at least `min_match_months`
/// months.
///
/// A month matches when any of the animal's records that month is within
/// bounds. Under [`NullPolicy::Accept`] a null value matches, and so does
/// every month in `months` where the animal has no record at all. Under
/// [`NullPolicy::HistoryFill`] nulls are filled first and then rejected.
pub fn passing_animals(
    dataset: &HerdDataset,
    spec: &FilterSpec,
    months: &BTreeSet<YearMonth>,
) -> Result<BTreeSet<AnimalKey>> {
    let FilterKind::CrossMonth {
        min_match_months, ..
    } = spec.kind
    else {
        return Ok(dataset.animal_keys()?.into_iter().flatten().collect());
    };
    let source = if spec.null_policy == NullPolicy::HistoryFill {
        history_fill(dataset, &spec.field)?
    } else {
        dataset.clone()
    };
    let mask = row_mask(&source, spec)?.unwrap_or_else(|| vec![true; source.height()]);

    let mut monthly: BTreeMap<AnimalKey, BTreeMap<YearMonth, bool>> = BTreeMap::new();
    for ((animal, month), matched) in source
        .animal_keys()?
        .into_iter()
        .zip(source.year_months()?)
        .zip(mask)
    {
        let Some(animal) = animal else { continue };
        let per_month = monthly.entry(animal).or_default();
        if let Some(month) = month {
            *per_month.entry(month).or_insert(false) |= matched;
        }
    }

    let accept_missing = spec.null_policy == NullPolicy::Accept;
    Ok(monthly
        .into_iter()
        .filter(|(_, per_month)| {
            let matched = per_month.values().filter(|m| **m).count();
            let missing = if accept_missing {
                months.iter().filter(|m| !per_month.contains_key(m)).count()
            } else {
                0
            };
            matched + missing >= min_match_months
        })
        .map(|(animal, _)| animal)
        .collect())
}

/// Distinct months with at least one dated record.
pub fn known_months(dataset: &HerdDataset) -> Result<BTreeSet<YearMonth>> {
    Ok(dataset.year_months()?.into_iter().flatten().collect())
}

fn cancelled() -> HerdDataset {
    warn!("multi-filter cancelled");
    HerdDataset::empty(MERGED_SOURCE)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use polars::prelude::{DataFrame, IntoColumn, NamedFrom, Series};

    use super::*;

    fn dataset(name: &str, rows: &[(&str, &str, Option<f64>)]) -> HerdDataset {
        HerdDataset::new(
            name,
            DataFrame::new(vec![
                Series::new(keys::FARM_ID.into(), vec!["F1"; rows.len()]).into_column(),
                Series::new(
                    keys::MANAGEMENT_ID.into(),
                    rows.iter().map(|r| r.0).collect::<Vec<_>>(),
                )
                .into_column(),
                Series::new(
                    keys::SAMPLE_DATE.into(),
                    rows.iter().map(|r| r.1).collect::<Vec<_>>(),
                )
                .into_column(),
                Series::new(
                    keys::PROTEIN_PCT.into(),
                    rows.iter().map(|r| r.2).collect::<Vec<_>>(),
                )
                .into_column(),
                Series::new(keys::SOURCE_FILE.into(), vec![name; rows.len()]).into_column(),
            ])
            .unwrap(),
        )
    }

    fn herd() -> Vec<HerdDataset> {
        vec![
            dataset(
                "jan.csv",
                &[("A1", "2024-01-10", Some(3.5)), ("B2", "2024-01-10", Some(4.5))],
            ),
            dataset(
                "feb.csv",
                &[
                    ("A1", "2024-02-10", Some(3.9)),
                    ("B2", "2024-02-10", None),
                    ("C3", "2024-02-10", Some(3.2)),
                ],
            ),
        ]
    }

    fn all_files() -> Vec<String> {
        vec!["jan.csv".to_string(), "feb.csv".to_string()]
    }

    fn ids(dataset: &HerdDataset) -> BTreeSet<String> {
        dataset.distinct_text(keys::MANAGEMENT_ID).unwrap()
    }

    #[test]
    fn keeps_full_history_of_passing_animals() {
        let spec = FilterSpec::cross_month(keys::PROTEIN_PCT, 3.0, 4.0, 2);
        let result = apply_multi_filter(&herd(), &[spec], &all_files(), RunHooks::none()).unwrap();
        assert_eq!(ids(&result), BTreeSet::from(["A1".to_string()]));
        assert_eq!(result.height(), 2);
    }

    #[test]
    fn accept_counts_missing_months() {
        let spec = FilterSpec::cross_month(keys::PROTEIN_PCT, 3.0, 4.0, 2).with_null_policy(NullPolicy::Accept);
        let result = apply_multi_filter(&herd(), &[spec], &all_files(), RunHooks::none()).unwrap();
        // C3 has no January record; B2's February value is null
        assert_eq!(
            ids(&result),
            BTreeSet::from(["A1".to_string(), "C3".to_string()])
        );
    }

    #[test]
    fn only_selected_files_take_part() {
        let spec = FilterSpec::cross_month(keys::PROTEIN_PCT, 3.0, 4.0, 1);
        let result =
            apply_multi_filter(&herd(), &[spec], &["feb.csv".to_string()], RunHooks::none()).unwrap();
        assert_eq!(
            ids(&result),
            BTreeSet::from(["A1".to_string(), "C3".to_string()])
        );
        let none = apply_multi_filter(&herd(), &[], &[], RunHooks::none()).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn no_cross_month_specs_returns_base_result() {
        let spec = FilterSpec::numeric_range(keys::PROTEIN_PCT, Some(3.4), None);
        let result = apply_multi_filter(&herd(), &[spec], &all_files(), RunHooks::none()).unwrap();
        assert_eq!(result.height(), 3);
    }

    #[test]
    fn cancellation_yields_empty_result() {
        let calls = AtomicUsize::new(0);
        let cancel = || calls.fetch_add(1, Ordering::SeqCst) >= 2;
        let spec = FilterSpec::cross_month(keys::PROTEIN_PCT, 3.0, 4.0, 1);
        let result = apply_multi_filter(
            &herd(),
            &[spec],
            &all_files(),
            RunHooks::none().with_cancel(&cancel),
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn outcome_reports_counts() {
        let spec = FilterSpec::cross_month(keys::PROTEIN_PCT, 3.0, 4.0, 2);
        let outcome = run_multi_filter(&herd(), &[spec], &all_files(), RunHooks::none());
        assert_eq!(outcome.message(), "2 rows from 1 animals passed the filters");
    }
}
