//! Normalization of one raw table into the canonical schema.

use std::path::Path;

use polars::prelude::{Column, DataFrame, IntoColumn, NamedFrom, Series};
use tracing::{debug, info, warn};

use dhi_model::{DhiError, HerdConfig, HerdDataset, MatchKind, Outcome, Result, keys};

use crate::archive::{is_archive, open_archive};
use crate::coerce::{coerce_column, identity_text};
use crate::header::detect_header_row;
use crate::reader::{RawTable, read_raw_table};

/// Fields of which at least two must resolve when a file has no farm id.
const ESSENTIAL_WITHOUT_FARM: [&str; 3] = [keys::MANAGEMENT_ID, keys::SAMPLE_DATE, keys::PROTEIN_PCT];

/// Parses raw tables into [`HerdDataset`]s using a configuration.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    config: &'a HerdConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a HerdConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &'a HerdConfig {
        self.config
    }

    /// Reads and normalizes a file. Zip archives are extracted and their
    /// target table is used; records keep the archive's name as source.
    pub fn normalize_path(&self, path: &Path) -> Result<HerdDataset> {
        let filename = display_name(path);
        let table = if is_archive(path) {
            let extracted = open_archive(path, &self.config.archive)?;
            read_raw_table(&extracted.target)?
        } else {
            read_raw_table(path)?
        };
        self.normalize_table(&table, &filename)
    }

    /// Normalizes a raw table whose header row is not yet known.
    pub fn normalize_table(&self, table: &RawTable, filename: &str) -> Result<HerdDataset> {
        let detection = detect_header_row(&table.rows, &self.config.header);
        if detection.is_fallback() {
            warn!(file = %filename, "header row not recognised; assuming row 0");
        } else {
            debug!(file = %filename, row = detection.row, schema = ?detection.schema, "header detected");
        }
        self.normalize_with_header(table, detection.row, filename)
    }

    /// Normalizes an in-memory frame; its column names are the header.
    pub fn normalize_frame(&self, df: &DataFrame, filename: &str) -> Result<HerdDataset> {
        let table = RawTable::from_frame(df)?;
        self.normalize_with_header(&table, 0, filename)
    }

    /// Normalizes a raw table whose header is at `header_row`.
    pub fn normalize_with_header(
        &self,
        table: &RawTable,
        header_row: usize,
        filename: &str,
    ) -> Result<HerdDataset> {
        let registry = &self.config.fields;
        let Some(headers) = table.rows.get(header_row) else {
            return Err(DhiError::MissingColumn {
                columns: registry
                    .required_keys()
                    .into_iter()
                    .map(|key| registry.label(key).to_string())
                    .collect(),
                missing_farm_id: false,
            });
        };
        let resolution = registry.resolve(headers);
        for column in resolution.columns.iter().filter(|c| c.via == MatchKind::Heuristic) {
            info!(file = %filename, column = %column.source_name, field = %column.key, "matched column by keyword");
        }

        let missing_farm_id = !resolution.contains(keys::FARM_ID);
        let missing: Vec<&str> = registry
            .required_keys()
            .into_iter()
            .filter(|key| !resolution.contains(key))
            .collect();
        if !missing.is_empty() {
            let essentials = ESSENTIAL_WITHOUT_FARM
                .iter()
                .filter(|key| resolution.contains(key))
                .count();
            if missing_farm_id && essentials >= 2 {
                warn!(file = %filename, missing = ?missing, "file lacks some columns; continuing with essential fields");
            } else {
                return Err(DhiError::MissingColumn {
                    columns: missing
                        .iter()
                        .map(|key| registry.label(key).to_string())
                        .collect(),
                    missing_farm_id,
                });
            }
        }
        if missing_farm_id {
            warn!(file = %filename, "no farm id column");
        }

        let data_rows = &table.rows[header_row + 1..];

        // Drop subtotal and average rows before anything else reads them.
        let keep: Vec<&Vec<String>> = match resolution.get(keys::MANAGEMENT_ID) {
            Some(id) => data_rows
                .iter()
                .filter(|row| !self.config.is_summary_value(&cell(row, id.source_index)))
                .collect(),
            None => data_rows.iter().collect(),
        };
        let dropped = data_rows.len() - keep.len();
        if dropped > 0 {
            info!(file = %filename, rows = dropped, "removed summary rows");
        }

        let mut columns: Vec<Column> = Vec::with_capacity(resolution.columns.len() + 1);
        for resolved in &resolution.columns {
            let value_type = registry.value_type(&resolved.key).unwrap_or_default();
            let raw: Vec<String> = keep.iter().map(|row| cell(row, resolved.source_index)).collect();
            let raw_refs: Vec<&str> = raw.iter().map(String::as_str).collect();
            let coerced = coerce_column(&resolved.key, value_type, &raw_refs, self.config);
            if coerced.invalid > 0 {
                debug!(file = %filename, field = %resolved.key, invalid = coerced.invalid, "unparseable cells set to null");
            }
            columns.push(coerced.column);
        }

        if !keep.is_empty()
            && let Some(id) = columns.iter().find(|c| c.name().as_str() == keys::MANAGEMENT_ID)
            && id.null_count() == id.len()
        {
            return Err(DhiError::EmptyColumn {
                column: registry.label(keys::MANAGEMENT_ID).to_string(),
            });
        }

        // A canonical table carries its own per-row source names.
        let source_idx = headers.iter().position(|h| h.trim() == keys::SOURCE_FILE);
        let sources: Vec<Option<String>> = keep
            .iter()
            .map(|row| match source_idx {
                Some(idx) => identity_text(&cell(row, idx), self.config).or_else(|| Some(filename.to_string())),
                None => Some(filename.to_string()),
            })
            .collect();
        columns.push(Series::new(keys::SOURCE_FILE.into(), sources).into_column());

        let data = DataFrame::new(columns)?;
        info!(
            file = %filename,
            header_row,
            rows = data.height(),
            columns = data.width(),
            missing_farm_id,
            "normalized table"
        );
        Ok(HerdDataset {
            source_file: filename.to_string(),
            data,
            missing_farm_id,
        })
    }
}

fn cell(row: &[String], idx: usize) -> String {
    row.get(idx).map(|s| s.trim().to_string()).unwrap_or_default()
}

/// File name used as the dataset's source.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Loads and normalizes one file, reporting the outcome as a tri-state.
pub fn normalize(path: &Path, config: &HerdConfig) -> Outcome<HerdDataset> {
    let filename = display_name(path);
    Outcome::from_result(Normalizer::new(config).normalize_path(path), &filename, |dataset| {
        format!("loaded {} rows from {}", dataset.height(), filename)
    })
}
