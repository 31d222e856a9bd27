//! Restriction to animals on the active roster.

use tracing::{info, warn};

use dhi_ingest::ActiveRoster;
use dhi_model::{HerdDataset, Result, keys};

/// Keeps rows whose management id is on `roster`.
///
/// Ids are compared in the roster's comparison form; the kept rows keep
/// their original ids. An empty roster or a dataset without ids is returned
/// unchanged.
pub fn apply_roster_filter(dataset: &HerdDataset, roster: &ActiveRoster) -> Result<HerdDataset> {
    if roster.is_empty() {
        info!("active roster empty; roster filter skipped");
        return Ok(dataset.clone());
    }
    if !dataset.has_column(keys::MANAGEMENT_ID) {
        warn!(file = %dataset.source_file, "roster filter skipped: no management id column");
        return Ok(dataset.clone());
    }
    let keep: Vec<bool> = dataset
        .text_values(keys::MANAGEMENT_ID)?
        .iter()
        .map(|id| id.as_deref().is_some_and(|id| roster.contains(id)))
        .collect();
    let filtered = dataset.filter_rows(&keep)?;
    info!(
        before = dataset.height(),
        after = filtered.height(),
        roster = roster.len(),
        "active roster filter applied"
    );
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use polars::prelude::{DataFrame, IntoColumn, NamedFrom, Series};

    use super::*;

    #[test]
    fn matches_without_leading_zeros() {
        let dataset = HerdDataset::new(
            "a.csv",
            DataFrame::new(vec![
                Series::new(keys::MANAGEMENT_ID.into(), vec![Some("007"), Some("8"), None]).into_column(),
            ])
            .unwrap(),
        );
        let roster = ActiveRoster::from_ids(["7"], true);
        let filtered = apply_roster_filter(&dataset, &roster).unwrap();
        assert_eq!(
            filtered.text_values(keys::MANAGEMENT_ID).unwrap(),
            vec![Some("007".to_string())]
        );
        let unchanged = apply_roster_filter(&dataset, &ActiveRoster::default()).unwrap();
        assert_eq!(unchanged.height(), 3);
    }
}
