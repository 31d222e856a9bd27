//! Data model for herd-test processing.
//!
//! Holds the canonical field registry, configuration, datasets, identity
//! keys, filter specifications, the error taxonomy and the boundary
//! `Outcome` type shared by the ingest, filter and report crates.

pub mod config;
pub mod dataset;
pub mod error;
pub mod field;
pub mod filter;
pub mod hooks;
pub mod key;
pub mod outcome;

pub use config::{ArchiveConfig, ExportConfig, HeaderConfig, HerdConfig, ReportConfig, RosterConfig};
pub use dataset::HerdDataset;
pub use error::{DhiError, Result};
pub use field::{
    ColumnResolution, FieldDef, FieldRegistry, Heuristic, MatchKind, ResolvedColumn, ValueType, keys,
};
pub use filter::{FilterKind, FilterSpec, NullPolicy, within};
pub use hooks::{Phase, Progress, RunHooks};
pub use key::{AnimalKey, YearMonth};
pub use outcome::{Outcome, Recovery};
