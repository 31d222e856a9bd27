//! Shared utilities for the herd-test crates.
//!
//! Conversion helpers for Polars `AnyValue`s, lenient numeric parsing, and
//! the sample-date parser used by every ingest path.

pub mod date;
pub mod numeric;
pub mod polars;

pub use date::{parse_sample_date, serial_to_date};
pub use numeric::{mean, parse_f64, parse_i64, round_to, sample_std};
pub use polars::{any_to_f64, any_to_i64, any_to_text, format_numeric};
