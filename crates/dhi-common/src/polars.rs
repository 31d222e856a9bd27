//! Polars `AnyValue` conversion helpers.
//!
//! Datasets are stored as Polars frames with typed columns. These helpers
//! read single cells back out without caring which physical integer or float
//! type the column happens to use.

use polars::prelude::AnyValue;

use crate::numeric::{parse_f64, parse_i64};

/// Converts a cell to its textual form, `None` for nulls and blank strings.
///
/// Floats are printed without trailing zeros so an identifier that was read
/// as `7.0` does not turn into a different string than `7`.
///
/// # Examples
///
/// ```
/// use polars::prelude::AnyValue;
/// use dhi_common::any_to_text;
///
/// assert_eq!(any_to_text(AnyValue::Null), None);
/// assert_eq!(any_to_text(AnyValue::String("007")), Some("007".to_string()));
/// assert_eq!(any_to_text(AnyValue::Float64(3.50)), Some("3.5".to_string()));
/// ```
pub fn any_to_text(value: AnyValue<'_>) -> Option<String> {
    let text = match value {
        AnyValue::Null => return None,
        AnyValue::Int8(v) => v.to_string(),
        AnyValue::Int16(v) => v.to_string(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt8(v) => v.to_string(),
        AnyValue::UInt16(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        AnyValue::Float32(v) => format_numeric(f64::from(v)),
        AnyValue::Float64(v) => format_numeric(v),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Boolean(b) => b.to_string(),
        other => other.to_string(),
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Formats a floating-point number without trailing zeros.
///
/// ```
/// use dhi_common::format_numeric;
///
/// assert_eq!(format_numeric(1.0), "1");
/// assert_eq!(format_numeric(3.25), "3.25");
/// assert_eq!(format_numeric(0.0), "0");
/// ```
pub fn format_numeric(v: f64) -> String {
    let s = format!("{v}");
    if !s.contains('.') {
        return s;
    }
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Converts a cell to `f64`, `None` for nulls and unparseable text.
pub fn any_to_f64(value: AnyValue<'_>) -> Option<f64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int8(v) => Some(f64::from(v)),
        AnyValue::Int16(v) => Some(f64::from(v)),
        AnyValue::Int32(v) => Some(f64::from(v)),
        AnyValue::Int64(v) => Some(v as f64),
        AnyValue::UInt8(v) => Some(f64::from(v)),
        AnyValue::UInt16(v) => Some(f64::from(v)),
        AnyValue::UInt32(v) => Some(f64::from(v)),
        AnyValue::UInt64(v) => Some(v as f64),
        AnyValue::Float32(v) => Some(f64::from(v)).filter(|f| f.is_finite()),
        AnyValue::Float64(v) => Some(v).filter(|f| f.is_finite()),
        AnyValue::String(s) => parse_f64(s),
        AnyValue::StringOwned(s) => parse_f64(&s),
        _ => None,
    }
}

/// Converts a cell to `i64`. Floats are truncated toward zero.
pub fn any_to_i64(value: AnyValue<'_>) -> Option<i64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int8(v) => Some(i64::from(v)),
        AnyValue::Int16(v) => Some(i64::from(v)),
        AnyValue::Int32(v) => Some(i64::from(v)),
        AnyValue::Int64(v) => Some(v),
        AnyValue::UInt8(v) => Some(i64::from(v)),
        AnyValue::UInt16(v) => Some(i64::from(v)),
        AnyValue::UInt32(v) => Some(i64::from(v)),
        AnyValue::UInt64(v) => i64::try_from(v).ok(),
        AnyValue::Float32(v) if v.is_finite() => Some(v as i64),
        AnyValue::Float64(v) if v.is_finite() => Some(v as i64),
        AnyValue::String(s) => parse_i64(s),
        AnyValue::StringOwned(s) => parse_i64(&s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_keeps_leading_zeros() {
        assert_eq!(any_to_text(AnyValue::String("00042")), Some("00042".to_string()));
    }

    #[test]
    fn text_folds_blank_to_none() {
        assert_eq!(any_to_text(AnyValue::String("   ")), None);
        assert_eq!(any_to_text(AnyValue::Null), None);
    }

    #[test]
    fn text_formats_numbers() {
        assert_eq!(any_to_text(AnyValue::Int64(-12)), Some("-12".to_string()));
        assert_eq!(any_to_text(AnyValue::Float64(7.0)), Some("7".to_string()));
    }

    #[test]
    fn format_numeric_leaves_integers_alone() {
        assert_eq!(format_numeric(100.0), "100");
        assert_eq!(format_numeric(10.5), "10.5");
    }

    #[test]
    fn f64_from_mixed_values() {
        assert_eq!(any_to_f64(AnyValue::Int32(3)), Some(3.0));
        assert_eq!(any_to_f64(AnyValue::String("3.41")), Some(3.41));
        assert_eq!(any_to_f64(AnyValue::String("n/a")), None);
        assert_eq!(any_to_f64(AnyValue::Float64(f64::NAN)), None);
    }

    #[test]
    fn i64_truncates_floats() {
        assert_eq!(any_to_i64(AnyValue::Float64(120.9)), Some(120));
        assert_eq!(any_to_i64(AnyValue::String("45")), Some(45));
        assert_eq!(any_to_i64(AnyValue::Boolean(true)), None);
    }
}
