//! Batch ingest with per-file isolation.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use dhi_model::{HerdConfig, HerdDataset, Outcome, Phase, Recovery, RunHooks, keys};

use crate::normalize::{display_name, normalize};

/// A file that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub filename: String,
    pub message: String,
    /// Assigning a farm id would let the file load.
    pub recoverable: bool,
}

/// Result of loading several files.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub datasets: Vec<HerdDataset>,
    pub failures: Vec<FileFailure>,
    /// Files (loaded or failed) that need a farm id assigned.
    pub needs_farm_id: Vec<String>,
    /// Sorted union of farm ids across loaded datasets.
    pub farm_ids: Vec<String>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn loaded_count(&self) -> usize {
        self.datasets.len()
    }

    pub fn total_rows(&self) -> usize {
        self.datasets.iter().map(HerdDataset::height).sum()
    }
}

/// Loads every path; a failing file never stops the batch.
///
/// The cancellation probe is checked before each file. Progress is
/// reported once per file.
pub fn ingest_batch(paths: &[PathBuf], config: &HerdConfig, hooks: RunHooks<'_>) -> BatchReport {
    let mut report = BatchReport::default();
    let mut farm_ids = BTreeSet::new();
    let total = paths.len();

    for (index, path) in paths.iter().enumerate() {
        if hooks.is_cancelled() {
            warn!(loaded = report.datasets.len(), "batch ingest cancelled");
            report.cancelled = true;
            break;
        }
        let filename = display_name(path);
        let percent = u8::try_from(index * 100 / total.max(1)).unwrap_or(100);
        hooks.report(
            Phase::Load {
                index,
                total,
                file: filename.clone(),
            },
            percent,
        );

        match normalize(path, config) {
            Outcome::Success { payload, .. } => {
                if payload.missing_farm_id {
                    report.needs_farm_id.push(filename.clone());
                }
                match payload.distinct_text(keys::FARM_ID) {
                    Ok(ids) => farm_ids.extend(ids),
                    Err(err) => warn!(file = %filename, error = %err, "could not read farm ids"),
                }
                report.datasets.push(payload);
            }
            Outcome::Recoverable { message, recovery } => {
                let Recovery::MissingFarmId { filename: name } = recovery;
                report.needs_farm_id.push(name);
                report.failures.push(FileFailure {
                    filename,
                    message,
                    recoverable: true,
                });
            }
            Outcome::Fatal { message } => {
                report.failures.push(FileFailure {
                    filename,
                    message,
                    recoverable: false,
                });
            }
        }
    }

    report.farm_ids = farm_ids.into_iter().collect();
    if !report.cancelled {
        hooks.report(Phase::Done, 100);
    }
    info!(
        loaded = report.datasets.len(),
        failed = report.failures.len(),
        rows = report.total_rows(),
        "batch ingest finished"
    );
    report
}
