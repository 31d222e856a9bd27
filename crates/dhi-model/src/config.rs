//! Herd-test configuration.
//!
//! Loaded from TOML. Every section has a default, so a user file only needs
//! to name what it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DhiError, Result};
use crate::field::FieldRegistry;
use crate::filter::FilterSpec;

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HerdConfig {
    /// Identity cell values read as null.
    pub null_literals: Vec<String>,

    /// Identity cell substrings that mark subtotal/average rows.
    pub summary_keywords: Vec<String>,

    /// Header-row detection.
    pub header: HeaderConfig,

    /// Target selection inside archives.
    pub archive: ArchiveConfig,

    /// Active-roster loading.
    pub roster: RosterConfig,

    /// Report rendering.
    pub report: ReportConfig,

    /// Row-level export.
    pub export: ExportConfig,

    /// Default filter specs.
    pub filters: Vec<FilterSpec>,

    /// Canonical field registry. A user file replaces the whole list.
    pub fields: FieldRegistry,
}

impl Default for HerdConfig {
    fn default() -> Self {
        Self {
            null_literals: to_strings(&["nan", "NaN", "None", "none", "null", "NULL", "<NA>", "NaT"]),
            summary_keywords: to_strings(&["小计", "平均与总计", "合计", "总计", "平均"]),
            header: HeaderConfig::default(),
            archive: ArchiveConfig::default(),
            roster: RosterConfig::default(),
            report: ReportConfig::default(),
            export: ExportConfig::default(),
            filters: Vec::new(),
            fields: FieldRegistry::default(),
        }
    }
}

impl HerdConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml_str(contents: &str, origin: &Path) -> Result<Self> {
        toml::from_str(contents).map_err(|source| DhiError::Toml {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| DhiError::io(path, e))?;
        Self::from_toml_str(&contents, path)
    }

    /// True when `value` is blank or one of the configured null literals.
    pub fn is_null_literal(&self, value: &str) -> bool {
        let trimmed = value.trim();
        trimmed.is_empty() || self.null_literals.iter().any(|n| n == trimmed)
    }

    /// True when `value` contains a summary keyword (case-insensitive).
    pub fn is_summary_value(&self, value: &str) -> bool {
        let lowered = value.to_lowercase();
        self.summary_keywords
            .iter()
            .any(|k| lowered.contains(&k.to_lowercase()))
    }
}

/// Header-row detection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Rows probed from the top of the table.
    pub max_rows: usize,
    /// Matches needed against a versioned indicator set.
    pub min_matches: usize,
    pub new_schema: Vec<String>,
    pub old_schema: Vec<String>,
    /// Indicators shared by both versions; matching all of them qualifies.
    pub core: Vec<String>,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            max_rows: 15,
            min_matches: 3,
            new_schema: to_strings(&["管理号", "胎次", "采样日期", "蛋白率"]),
            old_schema: to_strings(&["牛号", "胎次", "采样日期", "蛋白率"]),
            core: to_strings(&["胎次", "采样日期", "蛋白率"]),
        }
    }
}

/// Archive target selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Exact file names of the result table. The first readable match in
    /// walk order wins.
    pub target_files: Vec<String>,
    pub excluded_files: Vec<String>,
    /// Extensions considered by the fallback, lowercase without the dot.
    pub extensions: Vec<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            target_files: to_strings(&[
                "04-2综合测定结果表.xlsx",
                "04-2综合测定结果表.xls",
                "04-2综合测定结果表.csv",
                "04综合测定结果表.xlsx",
                "04综合测定结果表.xls",
                "04综合测定结果表.csv",
                "综合测定结果表.xlsx",
                "综合测定结果表.xls",
                "综合测定结果表.csv",
            ]),
            excluded_files: to_strings(&["04-1综合测定结果表.xlsx", "04-1综合测定结果表.xls"]),
            extensions: to_strings(&["xlsx", "xls", "csv", "tsv", "txt"]),
        }
    }
}

/// Active-roster settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Candidate ear-tag columns, first present wins.
    pub columns: Vec<String>,
    /// Compare ids without leading zeros.
    pub strip_leading_zeros: bool,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            columns: to_strings(&["耳号", "牛号", "管理号", "奶牛号", "牛编号"]),
            strip_leading_zeros: true,
        }
    }
}

/// Report rendering settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// chrono format applied to the first day of each month.
    pub month_label_format: String,
    pub roster_parity_label: String,
    pub last_lactation_days_label: String,
    pub last_sample_date_label: String,
    pub future_lactation_days_label: String,
    /// Prefix for per-animal weighted averages, e.g. `平均` + `蛋白率(%)`.
    pub average_prefix: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            month_label_format: "%Y年%m月".to_string(),
            roster_parity_label: "在群牛胎次".to_string(),
            last_lactation_days_label: "最后一个月泌乳天数(天)".to_string(),
            last_sample_date_label: "最后一次采样日".to_string(),
            future_lactation_days_label: "未来泌乳天数(天)".to_string(),
            average_prefix: "平均".to_string(),
        }
    }
}

/// Row-level export settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Canonical keys in export order; absent columns are skipped.
    pub columns: Vec<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            columns: to_strings(&[
                "farm_id",
                "management_id",
                "parity",
                "sample_date",
                "lactation_days",
                "milk_yield",
                "protein_pct",
                "fat_pct",
                "lactose_pct",
                "somatic_cell_count",
                "urea_nitrogen",
                "source_file",
            ]),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}
