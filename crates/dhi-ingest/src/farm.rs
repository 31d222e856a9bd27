//! Farm-id consistency across uploads.
//!
//! Files from one herd sometimes carry different farm ids (a renamed farm,
//! a lab typo). Aggregate reporting needs one id per herd, so inconsistency
//! is surfaced and resolved explicitly by unifying to a chosen id.

use std::collections::BTreeMap;

use polars::prelude::{IntoColumn, NamedFrom, Series};
use serde::Serialize;
use tracing::{info, warn};

use dhi_model::{HerdDataset, Result, keys};

/// Farm ids found across datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FarmIdConsistency {
    /// At most one distinct farm id.
    pub consistent: bool,
    pub farm_ids: Vec<String>,
    /// Source files per farm id.
    pub files_by_farm: BTreeMap<String, Vec<String>>,
}

/// Collects the distinct farm ids of `datasets`.
pub fn check_farm_ids(datasets: &[HerdDataset]) -> Result<FarmIdConsistency> {
    let mut files_by_farm: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for dataset in datasets {
        for farm in dataset.distinct_text(keys::FARM_ID)? {
            let files = files_by_farm.entry(farm).or_default();
            if !files.contains(&dataset.source_file) {
                files.push(dataset.source_file.clone());
            }
        }
    }
    let farm_ids: Vec<String> = files_by_farm.keys().cloned().collect();
    let consistent = farm_ids.len() <= 1;
    if !consistent {
        warn!(farm_ids = ?farm_ids, "datasets carry different farm ids");
    }
    Ok(FarmIdConsistency {
        consistent,
        farm_ids,
        files_by_farm,
    })
}

/// Returns copies of `datasets` with every non-null farm id set to `target`.
pub fn unify_farm_ids(datasets: &[HerdDataset], target: &str) -> Result<Vec<HerdDataset>> {
    let mut unified = Vec::with_capacity(datasets.len());
    for dataset in datasets {
        let mut copy = dataset.clone();
        if copy.has_column(keys::FARM_ID) {
            let values: Vec<Option<String>> = copy
                .text_values(keys::FARM_ID)?
                .into_iter()
                .map(|farm| farm.map(|_| target.to_string()))
                .collect();
            copy.set_text_column(keys::FARM_ID, values)?;
        }
        unified.push(copy);
    }
    info!(farm_id = target, datasets = unified.len(), "unified farm ids");
    Ok(unified)
}

/// Returns a copy of `dataset` whose every record has farm id `farm_id`.
///
/// Used for files recovered from a missing farm id column.
pub fn assign_farm_id(dataset: &HerdDataset, farm_id: &str) -> Result<HerdDataset> {
    let mut copy = dataset.clone();
    let values = vec![farm_id.to_string(); copy.height()];
    let column = Series::new(keys::FARM_ID.into(), values).into_column();
    if copy.has_column(keys::FARM_ID) {
        copy.data.with_column(column)?;
    } else {
        copy.data.insert_column(0, column)?;
    }
    copy.missing_farm_id = false;
    info!(file = %copy.source_file, farm_id, "assigned farm id");
    Ok(copy)
}
