use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, info_span};

use dhi_filter::data_ranges;
use dhi_ingest::{DuplicateDetector, ScratchStore, check_farm_ids, overall_date_range};
use dhi_model::{FilterSpec, HerdConfig, Progress, RunHooks};

use dhi_cli::pipeline::{ReportRequest, ReportRun, load_batch, load_config, load_filters, summarize_files};

use crate::cli::{DedupeArgs, IngestArgs, InputArgs, RangesArgs, ReportArgs};
use crate::summary::{print_duplicates, print_ingest_summary, print_ranges, print_report_summary};

pub fn run_ingest(args: &IngestArgs) -> Result<()> {
    let config = load_config(args.input.config.as_deref())?;
    let batch = with_progress(&args.input, |hooks| load_batch(&args.input.files, &config, hooks))?;
    let files = summarize_files(&batch.datasets)?;
    let consistency = check_farm_ids(&batch.datasets)?;

    if let Some(dir) = &args.scratch_dir {
        let store = ScratchStore::open(dir).with_context(|| format!("open scratch dir {}", dir.display()))?;
        for dataset in &batch.datasets {
            let path = store.save(&dataset.source_file, dataset)?;
            info!(file = %dataset.source_file, path = %path.display(), "dataset saved");
        }
    }

    if args.input.json {
        #[derive(Serialize)]
        struct IngestOutput<'a> {
            files: &'a [dhi_cli::pipeline::FileSummary],
            failures: &'a [dhi_ingest::FileFailure],
            needs_farm_id: &'a [String],
            farm_ids: &'a dhi_ingest::FarmIdConsistency,
        }
        print_json(&IngestOutput {
            files: &files,
            failures: &batch.failures,
            needs_farm_id: &batch.needs_farm_id,
            farm_ids: &consistency,
        })
    } else {
        print_ingest_summary(&files, &batch.failures, &consistency);
        Ok(())
    }
}

pub fn run_dedupe(args: &DedupeArgs) -> Result<()> {
    let config = load_config(args.input.config.as_deref())?;
    let batch = with_progress(&args.input, |hooks| load_batch(&args.input.files, &config, hooks))?;
    let report = info_span!("dedupe", threshold = args.threshold)
        .in_scope(|| DuplicateDetector::new(args.threshold).detect(&batch.datasets))?;
    if args.input.json {
        print_json(&report)
    } else {
        print_duplicates(&report);
        Ok(())
    }
}

pub fn run_ranges(args: &RangesArgs) -> Result<()> {
    let config = load_config(args.input.config.as_deref())?;
    let batch = with_progress(&args.input, |hooks| load_batch(&args.input.files, &config, hooks))?;
    let ranges = data_ranges(&batch.datasets, &config.fields)?;
    let overall = overall_date_range(&batch.datasets)?;
    if args.input.json {
        #[derive(Serialize)]
        struct RangesOutput<'a> {
            dates: Option<&'a dhi_ingest::DateRange>,
            ranges: &'a dhi_filter::DataRanges,
        }
        print_json(&RangesOutput {
            dates: overall.as_ref(),
            ranges: &ranges,
        })
    } else {
        print_ranges(&ranges, overall.as_ref(), &config.fields);
        Ok(())
    }
}

pub fn run_report(args: &ReportArgs) -> Result<ReportRun> {
    let config = load_config(args.input.config.as_deref())?;
    let request = report_request(args, &config)?;
    let run = with_progress(&args.input, |hooks| {
        dhi_cli::pipeline::run_report(&config, &request, hooks)
    })?;
    if args.input.json {
        print_json(&run)?;
    } else {
        print_report_summary(&run, &config.fields);
    }
    Ok(run)
}

fn report_request(args: &ReportArgs, config: &HerdConfig) -> Result<ReportRequest> {
    let specs: Vec<FilterSpec> = match &args.filters {
        Some(path) => load_filters(path)?,
        None => config.filters.clone(),
    };
    let future_range = (args.future_min.is_some() || args.future_max.is_some())
        .then_some((args.future_min, args.future_max));
    Ok(ReportRequest {
        files: args.input.files.clone(),
        specs,
        fields: args.fields.clone(),
        select: args.select.clone(),
        plan_date: args.plan_date,
        roster: args.roster.clone(),
        unify_farm_id: args.unify_farm_id.clone(),
        assign_farm_id: args.assign_farm_id.clone(),
        future_range,
        output: args.output.clone(),
        rows_output: args.rows_output.clone(),
    })
}

/// Runs `task` with a progress bar on stderr, hidden in JSON mode.
fn with_progress<T>(input: &InputArgs, task: impl FnOnce(RunHooks<'_>) -> Result<T>) -> Result<T> {
    let bar = if input.json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(100)
    };
    bar.set_style(ProgressStyle::with_template("{bar:30.cyan/blue} {pos:>3}% {msg}")?);
    let on_progress = |progress: &Progress| {
        bar.set_position(u64::from(progress.percent));
        bar.set_message(progress.phase.to_string());
    };
    let result = task(RunHooks::none().with_progress(&on_progress));
    bar.finish_and_clear();
    result
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{json}");
    Ok(())
}
