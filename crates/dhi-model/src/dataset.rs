//! Normalized herd-test datasets.
//!
//! A [`HerdDataset`] wraps a Polars frame whose columns are named by
//! canonical keys. Text and date columns are `String` (dates as ISO
//! `YYYY-MM-DD`), numbers are `Float64`, integers are `Int64`.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use polars::prelude::{
    AnyValue, BooleanChunked, Column, DataFrame, DataType, NamedFrom, NewChunkedArray, PlSmallStr, Series,
};

use dhi_common::{any_to_f64, any_to_i64, any_to_text, parse_sample_date};

use crate::error::Result;
use crate::field::keys;
use crate::key::{AnimalKey, YearMonth};

/// Records from one upload (or a merge of several).
#[derive(Debug, Clone)]
pub struct HerdDataset {
    pub source_file: String,
    pub data: DataFrame,
    /// The source had no farm id column.
    pub missing_farm_id: bool,
}

impl HerdDataset {
    pub fn new(source_file: impl Into<String>, data: DataFrame) -> Self {
        Self {
            source_file: source_file.into(),
            data,
            missing_farm_id: false,
        }
    }

    /// A dataset with no columns and no rows.
    pub fn empty(source_file: impl Into<String>) -> Self {
        Self::new(source_file, DataFrame::empty())
    }

    pub fn height(&self) -> usize {
        self.data.height()
    }

    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    pub fn has_column(&self, key: &str) -> bool {
        self.data.column(key).is_ok()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.data
            .get_column_names()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Text values of `key`; an absent column reads as all null.
    pub fn text_values(&self, key: &str) -> Result<Vec<Option<String>>> {
        self.values(key, any_to_text)
    }

    pub fn f64_values(&self, key: &str) -> Result<Vec<Option<f64>>> {
        self.values(key, any_to_f64)
    }

    pub fn i64_values(&self, key: &str) -> Result<Vec<Option<i64>>> {
        self.values(key, any_to_i64)
    }

    pub fn date_values(&self, key: &str) -> Result<Vec<Option<NaiveDate>>> {
        self.values(key, |value| any_to_text(value).and_then(|s| parse_sample_date(&s)))
    }

    pub fn bool_values(&self, key: &str) -> Result<Vec<Option<bool>>> {
        self.values(key, |value| match value {
            AnyValue::Boolean(b) => Some(b),
            _ => None,
        })
    }

    fn values<T>(&self, key: &str, convert: impl Fn(AnyValue<'_>) -> Option<T>) -> Result<Vec<Option<T>>> {
        let height = self.data.height();
        let Ok(column) = self.data.column(key) else {
            return Ok(std::iter::repeat_with(|| None).take(height).collect());
        };
        let mut values = Vec::with_capacity(height);
        for idx in 0..height {
            values.push(convert(column.get(idx)?));
        }
        Ok(values)
    }

    /// Sample dates of every record.
    pub fn sample_dates(&self) -> Result<Vec<Option<NaiveDate>>> {
        self.date_values(keys::SAMPLE_DATE)
    }

    /// Month of every record, derived from the sample date.
    pub fn year_months(&self) -> Result<Vec<Option<YearMonth>>> {
        Ok(self
            .sample_dates()?
            .into_iter()
            .map(|d| d.map(YearMonth::from_date))
            .collect())
    }

    /// Animal key of every record; `None` where the management id is null.
    pub fn animal_keys(&self) -> Result<Vec<Option<AnimalKey>>> {
        let farms = self.text_values(keys::FARM_ID)?;
        let ids = self.text_values(keys::MANAGEMENT_ID)?;
        Ok(farms
            .into_iter()
            .zip(ids)
            .map(|(farm, id)| id.map(|id| AnimalKey::new(farm, id)))
            .collect())
    }

    /// Distinct non-null text values of `key`.
    pub fn distinct_text(&self, key: &str) -> Result<BTreeSet<String>> {
        Ok(self.text_values(key)?.into_iter().flatten().collect())
    }

    /// Keeps rows where `keep` is true. Returns a new dataset.
    pub fn filter_rows(&self, keep: &[bool]) -> Result<Self> {
        let mask = BooleanChunked::from_slice("keep".into(), keep);
        Ok(Self {
            source_file: self.source_file.clone(),
            data: self.data.filter(&mask)?,
            missing_farm_id: self.missing_farm_id,
        })
    }

    pub fn set_text_column(&mut self, key: &str, values: Vec<Option<String>>) -> Result<()> {
        self.data.with_column(Series::new(key.into(), values))?;
        Ok(())
    }

    pub fn set_f64_column(&mut self, key: &str, values: Vec<Option<f64>>) -> Result<()> {
        self.data.with_column(Series::new(key.into(), values))?;
        Ok(())
    }

    pub fn set_i64_column(&mut self, key: &str, values: Vec<Option<i64>>) -> Result<()> {
        self.data.with_column(Series::new(key.into(), values))?;
        Ok(())
    }

    pub fn set_bool_column(&mut self, key: &str, values: Vec<bool>) -> Result<()> {
        self.data.with_column(Series::new(key.into(), values))?;
        Ok(())
    }

    /// Stacks datasets into one, aligning columns by name.
    ///
    /// Columns missing from a dataset are filled with nulls; each column
    /// takes the type it has in the first dataset that carries it.
    pub fn concat(datasets: &[&HerdDataset], source_file: impl Into<String>) -> Result<Self> {
        let mut layout: Vec<(PlSmallStr, DataType)> = Vec::new();
        for dataset in datasets {
            for column in dataset.data.get_columns() {
                if !layout.iter().any(|(name, _)| name == column.name()) {
                    layout.push((column.name().clone(), column.dtype().clone()));
                }
            }
        }

        let mut merged: Option<DataFrame> = None;
        for dataset in datasets {
            if dataset.data.width() == 0 {
                continue;
            }
            let height = dataset.height();
            let mut columns = Vec::with_capacity(layout.len());
            for (name, dtype) in &layout {
                let column = match dataset.data.column(name) {
                    Ok(existing) => existing.cast(dtype)?,
                    Err(_) => Column::full_null(name.clone(), height, dtype),
                };
                columns.push(column);
            }
            let aligned = DataFrame::new(columns)?;
            match merged.as_mut() {
                Some(acc) => {
                    acc.vstack_mut(&aligned)?;
                }
                None => merged = Some(aligned),
            }
        }

        Ok(Self {
            source_file: source_file.into(),
            data: merged.unwrap_or_else(DataFrame::empty),
            missing_farm_id: datasets.iter().any(|d| d.missing_farm_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use polars::prelude::IntoColumn;

    use super::*;

    fn frame(ids: &[&str], protein: &[Option<f64>]) -> DataFrame {
        DataFrame::new(vec![
            Series::new(keys::MANAGEMENT_ID.into(), ids.to_vec()).into_column(),
            Series::new(keys::PROTEIN_PCT.into(), protein.to_vec()).into_column(),
        ])
        .unwrap()
    }

    #[test]
    fn absent_columns_read_as_null() {
        let dataset = HerdDataset::new("a.csv", frame(&["007", "8"], &[Some(3.2), None]));
        assert_eq!(dataset.text_values(keys::FARM_ID).unwrap(), vec![None, None]);
        assert_eq!(
            dataset.text_values(keys::MANAGEMENT_ID).unwrap(),
            vec![Some("007".to_string()), Some("8".to_string())]
        );
        assert_eq!(dataset.f64_values(keys::PROTEIN_PCT).unwrap(), vec![Some(3.2), None]);
    }

    #[test]
    fn animal_keys_keep_leading_zeros() {
        let dataset = HerdDataset::new("a.csv", frame(&["007"], &[None]));
        let keys = dataset.animal_keys().unwrap();
        assert_eq!(keys, vec![Some(AnimalKey::new(None, "007"))]);
    }

    #[test]
    fn concat_aligns_columns() {
        let a = HerdDataset::new("a.csv", frame(&["1"], &[Some(3.0)]));
        let mut b = HerdDataset::new(
            "b.csv",
            DataFrame::new(vec![
                Series::new(keys::FARM_ID.into(), vec!["F1"]).into_column(),
                Series::new(keys::MANAGEMENT_ID.into(), vec!["2"]).into_column(),
            ])
            .unwrap(),
        );
        b.missing_farm_id = true;
        let merged = HerdDataset::concat(&[&a, &b], "merged").unwrap();
        assert_eq!(merged.height(), 2);
        assert_eq!(merged.f64_values(keys::PROTEIN_PCT).unwrap(), vec![Some(3.0), None]);
        assert_eq!(
            merged.text_values(keys::FARM_ID).unwrap(),
            vec![None, Some("F1".to_string())]
        );
        assert!(merged.missing_farm_id);
    }

    #[test]
    fn concat_of_nothing_is_empty() {
        let merged = HerdDataset::concat(&[], "merged").unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn filter_rows_returns_new_dataset() {
        let dataset = HerdDataset::new("a.csv", frame(&["1", "2", "3"], &[None, None, None]));
        let kept = dataset.filter_rows(&[true, false, true]).unwrap();
        assert_eq!(kept.height(), 2);
        assert_eq!(dataset.height(), 3);
    }
}
