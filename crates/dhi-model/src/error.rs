//! Error types shared by the herd-test crates.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while ingesting, filtering or reporting herd-test data.
#[derive(Debug, Error)]
pub enum DhiError {
    // === Input format ===
    /// The file type is not a readable tabular export.
    #[error("unsupported file format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// Required columns could not be resolved.
    ///
    /// `missing_farm_id` is set when the file also lacked a farm id column,
    /// so callers can offer to assign one instead of rejecting the file.
    #[error("missing required columns: {}", columns.join(", "))]
    MissingColumn {
        columns: Vec<String>,
        missing_farm_id: bool,
    },

    /// A resolved column holds no usable values.
    #[error("column '{column}' has no values")]
    EmptyColumn { column: String },

    /// A spreadsheet workbook could not be read.
    #[error("failed to read workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    // === Archives ===
    /// The archive could not be opened or extracted.
    #[error("corrupt archive {path}: {message}")]
    CorruptArchive { path: PathBuf, message: String },

    /// No candidate spreadsheet was found inside the archive.
    #[error("no target file in {path} (looked for {}; found {})", targets.join(", "), found.join(", "))]
    NoTargetFile {
        path: PathBuf,
        targets: Vec<String>,
        found: Vec<String>,
    },

    // === Derived values ===
    /// A derived per-animal value could not be computed.
    #[error("skipped {what}: {reason}")]
    ComputationSkipped { what: String, reason: String },

    // === Wrapped failures ===
    /// Failed to read or write a file.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse delimited text.
    #[error("failed to parse {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Failed to parse the configuration file.
    #[error("invalid configuration {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Failed to read a zip container.
    #[error("zip error on {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Failed DataFrame operation.
    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },
}

impl DhiError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true when the failure can be recovered by assigning a farm id.
    pub fn is_missing_farm_id(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn {
                missing_farm_id: true,
                ..
            }
        )
    }
}

impl From<polars::prelude::PolarsError> for DhiError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::DataFrame {
            message: err.to_string(),
        }
    }
}

/// Result type for herd-test operations.
pub type Result<T> = std::result::Result<T, DhiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_lists_names() {
        let err = DhiError::MissingColumn {
            columns: vec!["胎次".to_string(), "采样日期".to_string()],
            missing_farm_id: true,
        };
        assert_eq!(err.to_string(), "missing required columns: 胎次, 采样日期");
        assert!(err.is_missing_farm_id());
    }

    #[test]
    fn from_polars() {
        let polars_err = polars::prelude::PolarsError::ColumnNotFound("protein_pct".into());
        let err: DhiError = polars_err.into();
        assert!(matches!(err, DhiError::DataFrame { .. }));
        assert!(!err.is_missing_farm_id());
    }
}
