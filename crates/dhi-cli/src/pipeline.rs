//! End-to-end steps shared by the subcommands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use dhi_filter::{apply_multi_filter, apply_roster_filter};
use dhi_ingest::{
    ActiveRoster, BatchReport, DateRange, FarmIdConsistency, FileFailure, assign_farm_id, check_farm_ids,
    date_range, ingest_batch, unify_farm_ids,
};
use dhi_model::{FilterSpec, HerdConfig, HerdDataset, RunHooks, keys};
use dhi_report::{CohortSummary, MonthlyReportBuilder, ReportTable, write_dataset_csv, write_report_csv};

/// Loads `path`, or the built-in defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<HerdConfig> {
    match path {
        Some(path) => HerdConfig::load(path).with_context(|| format!("load config {}", path.display())),
        None => Ok(HerdConfig::default()),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FilterFile {
    filters: Vec<FilterSpec>,
}

/// Reads the `[[filters]]` entries of a TOML file.
pub fn load_filters(path: &Path) -> Result<Vec<FilterSpec>> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("read filters {}", path.display()))?;
    let file: FilterFile =
        toml::from_str(&contents).with_context(|| format!("parse filters {}", path.display()))?;
    info!(path = %path.display(), filters = file.filters.len(), "filters loaded");
    Ok(file.filters)
}

/// One loaded file, as shown by `dhi ingest`.
#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub file: String,
    pub rows: usize,
    pub missing_farm_id: bool,
    pub farm_ids: Vec<String>,
    pub date_range: Option<DateRange>,
}

pub fn summarize_files(datasets: &[HerdDataset]) -> Result<Vec<FileSummary>> {
    datasets
        .iter()
        .map(|dataset| -> Result<FileSummary> {
            Ok(FileSummary {
                file: dataset.source_file.clone(),
                rows: dataset.height(),
                missing_farm_id: dataset.missing_farm_id,
                farm_ids: dataset
                    .distinct_text(keys::FARM_ID)?
                    .into_iter()
                    .collect(),
                date_range: date_range(dataset)?,
            })
        })
        .collect()
}

/// Loads `files`, failing only when nothing could be loaded.
pub fn load_batch(files: &[PathBuf], config: &HerdConfig, hooks: RunHooks<'_>) -> Result<BatchReport> {
    let span = info_span!("ingest", files = files.len());
    let batch = span.in_scope(|| ingest_batch(files, config, hooks));
    if batch.cancelled {
        bail!("ingest cancelled");
    }
    for failure in &batch.failures {
        warn!(file = %failure.filename, recoverable = failure.recoverable, "{}", failure.message);
    }
    if batch.datasets.is_empty() {
        bail!("none of the {} files could be loaded", files.len());
    }
    Ok(batch)
}

/// Everything `dhi report` needs besides the configuration.
#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub files: Vec<PathBuf>,
    pub specs: Vec<FilterSpec>,
    pub fields: Vec<String>,
    /// Source file names to use; empty means all loaded files.
    pub select: Vec<String>,
    pub plan_date: Option<NaiveDate>,
    pub roster: Option<PathBuf>,
    pub unify_farm_id: Option<String>,
    pub assign_farm_id: Option<String>,
    pub future_range: Option<(Option<i64>, Option<i64>)>,
    pub output: PathBuf,
    pub rows_output: Option<PathBuf>,
}

/// What a report run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRun {
    pub files: Vec<String>,
    pub failures: Vec<FileFailure>,
    pub farm_ids: FarmIdConsistency,
    pub filtered_rows: usize,
    pub animals: usize,
    pub months: Vec<String>,
    pub summary: CohortSummary,
    pub output: PathBuf,
    #[serde(skip)]
    pub table: ReportTable,
}

/// Ingests, filters and pivots the herd, then writes the report.
///
/// Files from several farms are refused unless `unify_farm_id` is set.
pub fn run_report(config: &HerdConfig, request: &ReportRequest, hooks: RunHooks<'_>) -> Result<ReportRun> {
    let batch = load_batch(&request.files, config, hooks)?;
    let mut datasets = batch.datasets;

    if let Some(farm_id) = &request.assign_farm_id {
        datasets = datasets
            .iter()
            .map(|d| if d.missing_farm_id { assign_farm_id(d, farm_id) } else { Ok(d.clone()) })
            .collect::<dhi_model::Result<_>>()?;
    } else {
        for dataset in datasets.iter().filter(|d| d.missing_farm_id) {
            warn!(file = %dataset.source_file, "file has no farm id; pass --assign-farm-id to set one");
        }
    }

    let consistency = check_farm_ids(&datasets)?;
    if let Some(target) = &request.unify_farm_id {
        datasets = unify_farm_ids(&datasets, target)?;
    } else if !consistency.consistent {
        bail!(
            "files come from several farms ({}); pass --unify-farm-id to report them together",
            consistency.farm_ids.join(", ")
        );
    }

    let selected: Vec<String> = if request.select.is_empty() {
        datasets.iter().map(|d| d.source_file.clone()).collect()
    } else {
        request.select.clone()
    };
    let mut filtered = apply_multi_filter(&datasets, &request.specs, &selected, hooks)?;

    let roster = match &request.roster {
        Some(path) => Some(
            ActiveRoster::load(path, config).with_context(|| format!("load roster {}", path.display()))?,
        ),
        None => None,
    };
    if let Some(roster) = &roster {
        filtered = apply_roster_filter(&filtered, roster)?;
    }

    let mut builder = MonthlyReportBuilder::new(config).with_hooks(hooks);
    if let Some(roster) = &roster {
        builder = builder.with_roster(roster);
    }
    if let Some((min, max)) = request.future_range {
        builder = builder.with_future_range(min, max);
    }
    let table = builder.build(&filtered, &request.fields, request.plan_date)?;

    write_report_csv(&table, &request.output).with_context(|| format!("write {}", request.output.display()))?;
    if let Some(path) = &request.rows_output {
        write_dataset_csv(&filtered, config, path).with_context(|| format!("write {}", path.display()))?;
    }

    Ok(ReportRun {
        files: datasets.iter().map(|d| d.source_file.clone()).collect(),
        failures: batch.failures,
        farm_ids: consistency,
        filtered_rows: filtered.height(),
        animals: table.height(),
        months: table
            .months
            .iter()
            .map(|m| m.format(&config.report.month_label_format))
            .collect(),
        summary: table.summary.clone(),
        output: request.output.clone(),
        table,
    })
}
