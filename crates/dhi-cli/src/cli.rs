//! CLI argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "dhi",
    version,
    about = "Herd-test (DHI) toolkit - normalise lab exports, filter cohorts, build monthly reports",
    long_about = "Normalise dairy-herd test exports (CSV/TSV/TXT, optionally zipped),\n\
                  detect duplicate uploads, apply cross-month filters and pivot the\n\
                  resulting cohort into a per-animal monthly report."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Normalise files and summarise what was loaded.
    Ingest(IngestArgs),

    /// Find uploads that duplicate each other.
    Dedupe(DedupeArgs),

    /// Show observed value ranges and suggested filter bounds.
    Ranges(RangesArgs),

    /// Filter the herd and write the monthly report.
    Report(ReportArgs),
}

#[derive(Args)]
pub struct InputArgs {
    /// Lab export files (.csv, .tsv, .txt or .zip).
    #[arg(value_name = "FILES", required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// TOML configuration overriding the built-in defaults.
    #[arg(long = "config", value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of tables.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Args)]
pub struct IngestArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Save every loaded dataset to this directory.
    #[arg(long = "scratch-dir", value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct DedupeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Similarity above which two files are duplicates.
    #[arg(long = "threshold", default_value_t = dhi_ingest::DEFAULT_THRESHOLD)]
    pub threshold: f64,
}

#[derive(Args)]
pub struct RangesArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// TOML file with `[[filters]]` entries (defaults to the config's filters).
    #[arg(long = "filters", value_name = "TOML")]
    pub filters: Option<PathBuf>,

    /// Fields shown in each month block, in order.
    #[arg(
        long = "fields",
        value_delimiter = ',',
        default_value = "protein_pct,milk_yield,lactation_days"
    )]
    pub fields: Vec<String>,

    /// Only use these files (by file name); defaults to every loaded file.
    #[arg(long = "select", value_name = "FILE")]
    pub select: Vec<String>,

    /// Planned regrouping date for the lactation-days projection.
    #[arg(long = "plan-date", value_name = "YYYY-MM-DD")]
    pub plan_date: Option<NaiveDate>,

    /// Active roster; only animals on it are reported.
    #[arg(long = "roster", value_name = "FILE")]
    pub roster: Option<PathBuf>,

    /// Replace every farm id with this one before reporting.
    #[arg(long = "unify-farm-id", value_name = "ID")]
    pub unify_farm_id: Option<String>,

    /// Farm id for files that have none.
    #[arg(long = "assign-farm-id", value_name = "ID")]
    pub assign_farm_id: Option<String>,

    /// Minimum projected lactation days.
    #[arg(long = "future-min")]
    pub future_min: Option<i64>,

    /// Maximum projected lactation days.
    #[arg(long = "future-max")]
    pub future_max: Option<i64>,

    /// Report CSV to write.
    #[arg(long = "output", value_name = "CSV")]
    pub output: PathBuf,

    /// Also write the filtered records to this CSV.
    #[arg(long = "rows-output", value_name = "CSV")]
    pub rows_output: Option<PathBuf>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
