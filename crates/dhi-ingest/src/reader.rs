//! Raw table reading.
//!
//! Lab exports are read without assuming where the header is: every
//! non-blank record becomes a row of trimmed strings, and header detection
//! runs afterwards. Delimited text goes through `csv`; workbooks are read
//! from their first worksheet with `calamine`.

use std::borrow::Cow;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use csv::ReaderBuilder;
use polars::prelude::DataFrame;
use tracing::{debug, warn};

use dhi_common::{any_to_text, format_numeric, serial_to_date};
use dhi_model::{DhiError, Result};

/// Rows of cells as read from a source, header not yet identified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Builds a raw table from a frame, with the column names as row 0.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let mut rows = Vec::with_capacity(df.height() + 1);
        rows.push(
            df.get_column_names()
                .into_iter()
                .map(|name| name.trim().to_string())
                .collect(),
        );
        let columns = df.get_columns();
        for idx in 0..df.height() {
            let mut row = Vec::with_capacity(columns.len());
            for column in columns {
                row.push(any_to_text(column.get(idx)?).unwrap_or_default());
            }
            rows.push(row);
        }
        Ok(Self { rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Decodes file bytes as UTF-8 (BOM stripped), falling back to GBK.
pub fn decode_bytes(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (decoded, had_errors) = encoding_rs::GBK.decode_without_bom_handling(bytes);
            if had_errors {
                warn!("input is neither valid UTF-8 nor GBK; undecodable bytes replaced");
            }
            decoded
        }
    }
}

fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// True for extensions this reader can parse.
pub fn is_readable(path: &Path) -> bool {
    matches!(
        extension_lower(path).as_deref(),
        Some("csv" | "tsv" | "txt" | "xlsx" | "xlsm" | "xls")
    )
}

/// Reads a lab export into a [`RawTable`].
///
/// `.csv` is comma separated, `.tsv` tab separated, and `.txt` uses tabs
/// when the first line contains one. `.xlsx`, `.xlsm` and `.xls` are read
/// from the first worksheet. Anything else yields `UnsupportedFormat`.
pub fn read_raw_table(path: &Path) -> Result<RawTable> {
    let extension = extension_lower(path);
    match extension.as_deref() {
        Some("csv" | "tsv" | "txt") => {}
        Some("xlsx" | "xlsm" | "xls") => return read_workbook(path),
        _ => {
            return Err(DhiError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
    }
    let bytes = std::fs::read(path).map_err(|e| DhiError::io(path, e))?;
    let text = decode_bytes(&bytes);
    let delimiter = match extension.as_deref() {
        Some("tsv") => b'\t',
        Some("txt") if text.lines().next().is_some_and(|line| line.contains('\t')) => b'\t',
        _ => b',',
    };
    parse_delimited(&text, delimiter, path)
}

/// Reads the first worksheet of a workbook. Blank rows are dropped, cells
/// trimmed; date cells become ISO dates.
pub fn read_workbook(path: &Path) -> Result<RawTable> {
    let workbook_err = |message: String| DhiError::Workbook {
        path: path.to_path_buf(),
        message,
    };
    let mut workbook = open_workbook_auto(path).map_err(|e| workbook_err(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| workbook_err("workbook has no worksheets".to_string()))?
        .map_err(|e| workbook_err(e.to_string()))?;

    let mut rows = Vec::new();
    for cells in range.rows() {
        let row: Vec<String> = cells.iter().map(cell_text).collect();
        if row.iter().all(String::is_empty) {
            continue;
        }
        rows.push(row);
    }
    debug!(path = %path.display(), rows = rows.len(), "read worksheet");
    Ok(RawTable { rows })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Float(f) => format_numeric(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => {
            let serial = dt.as_f64().floor();
            if serial < 0.0 {
                return String::new();
            }
            serial_to_date(serial as u64)
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        }
        Data::Error(_) | Data::Empty => String::new(),
    }
}

/// Parses delimited text; blank records are dropped, cells trimmed.
pub fn parse_delimited(text: &str, delimiter: u8, origin: &Path) -> Result<RawTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| DhiError::Csv {
            path: origin.to_path_buf(),
            source,
        })?;
        let row: Vec<String> = record
            .iter()
            .map(|cell| cell.trim().trim_matches('\u{feff}').to_string())
            .collect();
        if row.iter().all(String::is_empty) {
            continue;
        }
        rows.push(row);
    }
    Ok(RawTable { rows })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use polars::prelude::{IntoColumn, NamedFrom, Series};
    use tempfile::Builder;

    use super::*;

    fn temp_file(suffix: &str, bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    #[test]
    fn reads_csv_with_bom_and_blank_rows() {
        let file = temp_file(".csv", "\u{feff}管理号,胎次\n\n,\n007 , 2\n".as_bytes());
        let table = read_raw_table(file.path()).unwrap();
        assert_eq!(
            table.rows,
            vec![
                vec!["管理号".to_string(), "胎次".to_string()],
                vec!["007".to_string(), "2".to_string()],
            ]
        );
    }

    #[test]
    fn reads_gbk_encoded_text() {
        let (encoded, _, _) = encoding_rs::GBK.encode("牛号,胎次\nA1,1\n");
        let file = temp_file(".csv", &encoded);
        let table = read_raw_table(file.path()).unwrap();
        assert_eq!(table.rows[0], vec!["牛号".to_string(), "胎次".to_string()]);
    }

    #[test]
    fn txt_with_tabs_is_tab_separated() {
        let file = temp_file(".txt", b"a\tb\n1\t2\n");
        let table = read_raw_table(file.path()).unwrap();
        assert_eq!(table.rows[1], vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn other_extensions_are_unsupported() {
        let file = temp_file(".pdf", b"%PDF");
        let err = read_raw_table(file.path()).unwrap_err();
        assert!(matches!(err, DhiError::UnsupportedFormat { .. }));
    }

    #[test]
    fn workbooks_go_through_the_workbook_reader() {
        let file = temp_file(".xlsx", b"not a workbook");
        assert!(is_readable(file.path()));
        let err = read_raw_table(file.path()).unwrap_err();
        assert!(matches!(err, DhiError::Workbook { .. }));
    }

    #[test]
    fn workbook_cells_become_text() {
        assert_eq!(cell_text(&Data::String(" 007 ".to_string())), "007");
        assert_eq!(cell_text(&Data::Float(120.0)), "120");
        assert_eq!(cell_text(&Data::Float(3.25)), "3.25");
        assert_eq!(cell_text(&Data::Int(2)), "2");
        assert_eq!(cell_text(&Data::Empty), "");
    }

    #[test]
    fn frame_columns_become_header_row() {
        let df = DataFrame::new(vec![
            Series::new("管理号".into(), vec![Some("007"), None]).into_column(),
            Series::new("蛋白率".into(), vec![3.5, 3.25]).into_column(),
        ])
        .unwrap();
        let table = RawTable::from_frame(&df).unwrap();
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1], vec!["007".to_string(), "3.5".to_string()]);
        assert_eq!(table.rows[2], vec![String::new(), "3.25".to_string()]);
    }
}
