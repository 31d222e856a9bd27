//! Sample-date parsing for laboratory exports.
//!
//! Exports come from several lab systems and spreadsheet versions, so the
//! same column may hold ISO dates, slash or dot separated dates, CJK dates,
//! datetime strings, or raw spreadsheet serial numbers.

use chrono::{Days, NaiveDate};

/// Serial numbers outside this window are not treated as spreadsheet dates.
const SERIAL_RANGE: std::ops::RangeInclusive<u64> = 20_000..=80_000;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%Y年%m月%d日",
    "%Y%m%d",
    "%m/%d/%Y",
];

/// Parses a sample date, returning `None` for blank or unrecognised values.
///
/// ```
/// use chrono::NaiveDate;
/// use dhi_common::parse_sample_date;
///
/// let expected = NaiveDate::from_ymd_opt(2024, 3, 5);
/// assert_eq!(parse_sample_date("2024-03-05"), expected);
/// assert_eq!(parse_sample_date("2024/3/5 00:00:00"), expected);
/// assert_eq!(parse_sample_date("2024年3月5日"), expected);
/// assert_eq!(parse_sample_date("not a date"), None);
/// ```
pub fn parse_sample_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(date) = parse_serial(trimmed) {
        return Some(date);
    }
    let date_part = trimmed
        .split(|c: char| c == 'T' || c.is_whitespace())
        .next()
        .unwrap_or(trimmed);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Converts a spreadsheet (1900 date system) serial day number to a date.
pub fn serial_to_date(serial: u64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial))
}

fn parse_serial(value: &str) -> Option<NaiveDate> {
    let integral = value.strip_suffix(".0").unwrap_or(value);
    if integral.is_empty() || !integral.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let serial: u64 = integral.parse().ok()?;
    if !SERIAL_RANGE.contains(&serial) {
        return None;
    }
    serial_to_date(serial)
}
