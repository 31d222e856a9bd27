//! CSV export of reports and row-level datasets.
//!
//! Headers are the operator-facing labels; cells are written as text with
//! nulls left empty.

use std::path::Path;

use csv::WriterBuilder;
use polars::prelude::Column;
use tracing::info;

use dhi_common::any_to_text;
use dhi_model::{DhiError, HerdConfig, HerdDataset, Result};

use crate::table::ReportTable;

/// Writes `table` with its column labels as the header row.
pub fn write_report_csv(table: &ReportTable, path: &Path) -> Result<()> {
    let headers = table.labels();
    let columns: Vec<&Column> = table
        .columns
        .iter()
        .map(|c| table.data.column(&c.name))
        .collect::<std::result::Result<_, _>>()?;
    write_columns(path, &headers, &columns, table.height())?;
    info!(path = %path.display(), animals = table.height(), columns = headers.len(), "report written");
    Ok(())
}

/// Writes the export columns of `dataset` that it carries, labelled from
/// the field registry.
pub fn write_dataset_csv(dataset: &HerdDataset, config: &HerdConfig, path: &Path) -> Result<()> {
    let mut headers = Vec::new();
    let mut columns = Vec::new();
    for key in &config.export.columns {
        if let Ok(column) = dataset.data.column(key) {
            headers.push(config.fields.label(key));
            columns.push(column);
        }
    }
    write_columns(path, &headers, &columns, dataset.height())?;
    info!(path = %path.display(), rows = dataset.height(), columns = headers.len(), "dataset written");
    Ok(())
}

fn write_columns(path: &Path, headers: &[&str], columns: &[&Column], height: usize) -> Result<()> {
    let csv_err = |source: csv::Error| DhiError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = WriterBuilder::new().from_path(path).map_err(csv_err)?;
    writer.write_record(headers).map_err(csv_err)?;
    for idx in 0..height {
        let mut record = Vec::with_capacity(columns.len());
        for column in columns {
            record.push(any_to_text(column.get(idx)?).unwrap_or_default());
        }
        writer.write_record(&record).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| DhiError::io(path, e))?;
    Ok(())
}
