//! Lenient numeric parsing and small statistics helpers.

/// Parses a spreadsheet cell as `f64`.
///
/// Accepts surrounding whitespace, thousands separators and a trailing `%`.
/// Empty, non-numeric and non-finite values yield `None`.
pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    let parsed = if trimmed.contains(',') {
        trimmed.replace(',', "").parse::<f64>().ok()
    } else {
        trimmed.parse::<f64>().ok()
    };
    parsed.filter(|v| v.is_finite())
}

/// Parses a spreadsheet cell as `i64`.
///
/// Integral text parses directly; decimal text is truncated toward zero so
/// `"120.0"` exported by a spreadsheet still reads as `120`.
pub fn parse_i64(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    let float = parse_f64(trimmed)?;
    if float.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(float.trunc() as i64)
}

/// Rounds to a fixed number of decimal places (half away from zero).
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator), `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_f64_variants() {
        assert_eq!(parse_f64(" 3.42 "), Some(3.42));
        assert_eq!(parse_f64("3.42%"), Some(3.42));
        assert_eq!(parse_f64("1,234.5"), Some(1234.5));
        assert_eq!(parse_f64(""), None);
        assert_eq!(parse_f64("abc"), None);
        assert_eq!(parse_f64("NaN"), None);
        assert_eq!(parse_f64("inf"), None);
    }

    #[test]
    fn parse_i64_variants() {
        assert_eq!(parse_i64("120"), Some(120));
        assert_eq!(parse_i64("120.0"), Some(120));
        assert_eq!(parse_i64("-3.7"), Some(-3));
        assert_eq!(parse_i64("x"), None);
        assert_eq!(parse_i64("  "), None);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(3.666_666, 2), 3.67);
        assert_eq!(round_to(2.25, 1), 2.3);
        assert_eq!(round_to(-1.005, 0), -1.0);
    }

    #[test]
    fn statistics() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(sample_std(&[1.0]), None);
        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((std - 2.138_089_935).abs() < 1e-6);
    }
}
