//! Cell type coercion into canonical column types.

use polars::prelude::{Column, IntoColumn, NamedFrom, Series};

use dhi_common::{parse_f64, parse_i64, parse_sample_date};
use dhi_model::{HerdConfig, ValueType};

/// A coerced column plus the number of non-blank cells that failed to parse.
#[derive(Debug, Clone)]
pub struct Coerced {
    pub column: Column,
    pub invalid: usize,
}

/// Folds an identity cell to `None` when blank or a configured null literal.
///
/// Leading zeros are kept: `"007"` stays `"007"`.
pub fn identity_text(raw: &str, config: &HerdConfig) -> Option<String> {
    if config.is_null_literal(raw) {
        None
    } else {
        Some(raw.trim().to_string())
    }
}

/// Coerces raw cells for canonical field `key` to its storage type.
///
/// Unparseable values become null; they never fail the column.
pub fn coerce_column(key: &str, value_type: ValueType, raw: &[&str], config: &HerdConfig) -> Coerced {
    let mut invalid = 0usize;
    let mut track = |cell: &str, parsed: bool| {
        if !parsed && !config.is_null_literal(cell) {
            invalid += 1;
        }
    };
    let series = match value_type {
        ValueType::Text => {
            let values: Vec<Option<String>> = raw.iter().copied().map(|cell| identity_text(cell, config)).collect();
            Series::new(key.into(), values)
        }
        ValueType::Number => {
            let values: Vec<Option<f64>> = raw
                .iter()
                .copied()
                .map(|cell| {
                    let parsed = parse_f64(cell);
                    track(cell, parsed.is_some());
                    parsed
                })
                .collect();
            Series::new(key.into(), values)
        }
        ValueType::Integer => {
            let values: Vec<Option<i64>> = raw
                .iter()
                .copied()
                .map(|cell| {
                    let parsed = parse_i64(cell);
                    track(cell, parsed.is_some());
                    parsed
                })
                .collect();
            Series::new(key.into(), values)
        }
        ValueType::Date => {
            let values: Vec<Option<String>> = raw
                .iter()
                .copied()
                .map(|cell| {
                    let parsed = parse_sample_date(cell);
                    track(cell, parsed.is_some());
                    parsed.map(|d| d.format("%Y-%m-%d").to_string())
                })
                .collect();
            Series::new(key.into(), values)
        }
    };
    Coerced {
        column: series.into_column(),
        invalid,
    }
}
