//! Filling null values from an animal's other records.

use std::collections::HashMap;

use chrono::NaiveDate;
use polars::prelude::{DataType, IntoColumn, NamedFrom, Series};
use tracing::{info, warn};

use dhi_model::{AnimalKey, HerdDataset, Result, keys};

/// Name of the flag column marking cells filled for `field`.
pub fn filled_flag_column(field: &str) -> String {
    format!("{field}_historical_filled")
}

/// Returns a copy of `dataset` with nulls in `field` filled per animal.
///
/// Records of one animal are ordered by sample date (undated last, row
/// order on ties); nulls take the previous non-null value, and leading nulls
/// take the next one. Filled cells are flagged in
/// [`filled_flag_column`]. Rows without a management id are left alone.
pub fn history_fill(dataset: &HerdDataset, field: &str) -> Result<HerdDataset> {
    let mut filled = dataset.clone();
    let Ok(column) = dataset.data.column(field) else {
        warn!(field, "history fill skipped: column absent");
        return Ok(filled);
    };
    if !dataset.has_column(keys::MANAGEMENT_ID) {
        warn!(field, "history fill skipped: no management id column");
        return Ok(filled);
    }
    let dtype = column.dtype().clone();

    let groups = animal_groups(&dataset.animal_keys()?, &dataset.sample_dates()?);
    let flag_name = filled_flag_column(field);
    let mut flags: Vec<bool> = dataset
        .bool_values(&flag_name)?
        .into_iter()
        .map(|flag| flag.unwrap_or(false))
        .collect();

    let count = if dtype == DataType::String {
        let mut values = dataset.text_values(field)?;
        let count = fill_groups(&mut values, &groups, &mut flags);
        filled.set_text_column(field, values)?;
        count
    } else {
        let mut values = dataset.f64_values(field)?;
        let count = fill_groups(&mut values, &groups, &mut flags);
        let series = Series::new(field.into(), values).cast(&dtype)?;
        filled.data.with_column(series.into_column())?;
        count
    };
    filled.set_bool_column(&flag_name, flags)?;
    info!(field, filled = count, "history fill");
    Ok(filled)
}

/// Row indices per animal, in fill order.
fn animal_groups(animals: &[Option<AnimalKey>], dates: &[Option<NaiveDate>]) -> Vec<Vec<usize>> {
    let mut index: HashMap<&AnimalKey, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (row, animal) in animals.iter().enumerate() {
        let Some(animal) = animal else { continue };
        let slot = *index.entry(animal).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(row);
    }
    for group in &mut groups {
        // stable: ties keep row order
        group.sort_by_key(|&row| (dates[row].is_none(), dates[row]));
    }
    groups
}

fn fill_groups<T: Clone>(values: &mut [Option<T>], groups: &[Vec<usize>], flags: &mut [bool]) -> usize {
    let mut count = 0;
    for group in groups {
        let originally_null: Vec<bool> = group.iter().map(|&row| values[row].is_none()).collect();

        let mut last: Option<T> = None;
        for &row in group {
            if values[row].is_some() {
                last.clone_from(&values[row]);
            } else {
                values[row].clone_from(&last);
            }
        }
        let mut next: Option<T> = None;
        for &row in group.iter().rev() {
            if values[row].is_some() {
                next.clone_from(&values[row]);
            } else {
                values[row].clone_from(&next);
            }
        }

        for (&row, was_null) in group.iter().zip(originally_null) {
            if was_null && values[row].is_some() {
                flags[row] = true;
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use polars::prelude::DataFrame;

    use super::*;

    fn dataset() -> HerdDataset {
        HerdDataset::new(
            "a.csv",
            DataFrame::new(vec![
                Series::new(keys::MANAGEMENT_ID.into(), vec!["1", "1", "1", "2", "2"]).into_column(),
                Series::new(
                    keys::SAMPLE_DATE.into(),
                    vec!["2024-03-01", "2024-01-01", "2024-02-01", "2024-01-01", "2024-02-01"],
                )
                .into_column(),
                Series::new(
                    keys::PROTEIN_PCT.into(),
                    vec![None, None, Some(3.2), None, None],
                )
                .into_column(),
                Series::new(keys::LACTATION_DAYS.into(), vec![Some(100i64), None, Some(70), None, Some(5)])
                    .into_column(),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn fills_forward_then_backward_by_date() {
        let filled = history_fill(&dataset(), keys::PROTEIN_PCT).unwrap();
        assert_eq!(
            filled.f64_values(keys::PROTEIN_PCT).unwrap(),
            vec![Some(3.2), Some(3.2), Some(3.2), None, None]
        );
        assert_eq!(
            filled.bool_values(&filled_flag_column(keys::PROTEIN_PCT)).unwrap(),
            vec![Some(true), Some(true), Some(false), Some(false), Some(false)]
        );
    }

    #[test]
    fn integer_columns_keep_their_type() {
        let filled = history_fill(&dataset(), keys::LACTATION_DAYS).unwrap();
        assert_eq!(
            filled.data.column(keys::LACTATION_DAYS).unwrap().dtype(),
            &DataType::Int64
        );
        assert_eq!(
            filled.i64_values(keys::LACTATION_DAYS).unwrap(),
            vec![Some(100), Some(70), Some(70), Some(5), Some(5)]
        );
    }

    #[test]
    fn input_is_not_mutated() {
        let original = dataset();
        let _ = history_fill(&original, keys::PROTEIN_PCT).unwrap();
        assert_eq!(original.f64_values(keys::PROTEIN_PCT).unwrap()[0], None);
        assert!(!original.has_column(&filled_flag_column(keys::PROTEIN_PCT)));
    }
}
