//! Filter specifications.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What to do with a record whose filtered field is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// Null never satisfies the filter.
    #[default]
    Reject,
    /// Null always satisfies the filter.
    Accept,
    /// Fill nulls from the same animal's other records, then reject the rest.
    HistoryFill,
}

/// The test a [`FilterSpec`] applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterKind {
    /// Inclusive numeric bounds; a missing bound is open.
    NumericRange { min: Option<f64>, max: Option<f64> },
    /// Keep rows whose text value is in the set. An empty set keeps all rows.
    Categorical { allowed: Vec<String> },
    /// Inclusive date bounds.
    DateRange {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    /// Inclusive parity bounds, applied per row.
    ParityRange { min: Option<i64>, max: Option<i64> },
    /// The value must be within bounds in at least `min_match_months` of the
    /// animal's months.
    CrossMonth {
        min: f64,
        max: f64,
        min_match_months: usize,
    },
}

/// One filter over one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub field: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub null_policy: NullPolicy,
    #[serde(flatten)]
    pub kind: FilterKind,
}

fn default_enabled() -> bool {
    true
}

impl FilterSpec {
    pub fn new(field: impl Into<String>, kind: FilterKind) -> Self {
        Self {
            field: field.into(),
            enabled: true,
            null_policy: NullPolicy::Reject,
            kind,
        }
    }

    pub fn numeric_range(field: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self::new(field, FilterKind::NumericRange { min, max })
    }

    pub fn categorical(field: impl Into<String>, allowed: Vec<String>) -> Self {
        Self::new(field, FilterKind::Categorical { allowed })
    }

    pub fn date_range(
        field: impl Into<String>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Self {
        Self::new(field, FilterKind::DateRange { start, end })
    }

    pub fn parity_range(field: impl Into<String>, min: Option<i64>, max: Option<i64>) -> Self {
        Self::new(field, FilterKind::ParityRange { min, max })
    }

    pub fn cross_month(field: impl Into<String>, min: f64, max: f64, min_match_months: usize) -> Self {
        Self::new(
            field,
            FilterKind::CrossMonth {
                min,
                max,
                min_match_months,
            },
        )
    }

    pub fn with_null_policy(mut self, policy: NullPolicy) -> Self {
        self.null_policy = policy;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_cross_month(&self) -> bool {
        matches!(self.kind, FilterKind::CrossMonth { .. })
    }
}

/// Inclusive range test with open ends.
pub fn within<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> bool {
    min.is_none_or(|lo| value >= lo) && max.is_none_or(|hi| value <= hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_tagged_specs() {
        let json = r#"[
            {"field": "protein_pct", "kind": "cross_month", "min": 3.0, "max": 4.0,
             "min_match_months": 2, "null_policy": "accept"},
            {"field": "farm_id", "kind": "categorical", "allowed": ["F1"], "enabled": false}
        ]"#;
        let specs: Vec<FilterSpec> = serde_json::from_str(json).unwrap();
        assert_eq!(specs[0], FilterSpec::cross_month("protein_pct", 3.0, 4.0, 2).with_null_policy(NullPolicy::Accept));
        assert!(specs[0].is_cross_month());
        assert!(!specs[1].enabled);
        assert_eq!(specs[1].null_policy, NullPolicy::Reject);
    }

    #[test]
    fn within_is_inclusive() {
        assert!(within(3.0, Some(3.0), Some(4.0)));
        assert!(within(4.0, Some(3.0), Some(4.0)));
        assert!(!within(4.01, Some(3.0), Some(4.0)));
        assert!(within(100, None, None));
    }
}
