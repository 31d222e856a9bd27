//! The report table and its column layout.

use polars::prelude::{AnyValue, DataFrame};
use serde::Serialize;

use dhi_common::{any_to_f64, any_to_i64, any_to_text};
use dhi_model::{HerdConfig, Result, YearMonth};

/// What a report column holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnKind {
    /// `farm_id`, `management_id` or `parity`.
    Identity { field: String },
    RosterParity,
    Month { month: YearMonth, field: String },
    /// Per-animal yield-weighted average.
    Average { field: String },
    LastLactationDays,
    LastSampleDate,
    FutureLactationDays,
}

impl ColumnKind {
    /// Stable column name in the report frame.
    pub fn name(&self) -> String {
        match self {
            Self::Identity { field } => field.clone(),
            Self::RosterParity => "roster_parity".to_string(),
            Self::Month { month, field } => format!("{month}:{field}"),
            Self::Average { field } => format!("avg:{field}"),
            Self::LastLactationDays => "last_lactation_days".to_string(),
            Self::LastSampleDate => "last_sample_date".to_string(),
            Self::FutureLactationDays => "future_lactation_days".to_string(),
        }
    }

    /// Header shown to operators, built from the registry labels and the
    /// report settings.
    pub fn label(&self, config: &HerdConfig) -> String {
        let registry = &config.fields;
        let report = &config.report;
        match self {
            Self::Identity { field } => registry.label(field).to_string(),
            Self::RosterParity => report.roster_parity_label.clone(),
            Self::Month { month, field } => {
                format!("{}{}", month.format(&report.month_label_format), registry.label(field))
            }
            Self::Average { field } => format!("{}{}", report.average_prefix, registry.label(field)),
            Self::LastLactationDays => report.last_lactation_days_label.clone(),
            Self::LastSampleDate => report.last_sample_date_label.clone(),
            Self::FutureLactationDays => report.future_lactation_days_label.clone(),
        }
    }
}

/// One column of a [`ReportTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportColumn {
    pub name: String,
    pub label: String,
    pub kind: ColumnKind,
}

impl ReportColumn {
    pub fn new(kind: ColumnKind, config: &HerdConfig) -> Self {
        Self {
            name: kind.name(),
            label: kind.label(config),
            kind,
        }
    }
}

/// Cohort-wide average of one month column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthAverage {
    pub month: YearMonth,
    pub field: String,
    pub value: Option<f64>,
}

/// Statistics over every animal in a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CohortSummary {
    pub animals: usize,
    /// Yield-weighted averages of the weighted fields, in display order.
    pub weighted_averages: Vec<(String, Option<f64>)>,
    /// Mean parity, 1 decimal.
    pub mean_parity: Option<f64>,
    pub month_averages: Vec<MonthAverage>,
}

impl CohortSummary {
    pub fn weighted_average(&self, field: &str) -> Option<f64> {
        self.weighted_averages
            .iter()
            .find(|(key, _)| key == field)
            .and_then(|(_, value)| *value)
    }

    pub fn month_average(&self, month: YearMonth, field: &str) -> Option<f64> {
        self.month_averages
            .iter()
            .find(|avg| avg.month == month && avg.field == field)
            .and_then(|avg| avg.value)
    }
}

/// One row per animal: identity columns, chronological month blocks, then
/// summary columns.
#[derive(Debug, Clone)]
pub struct ReportTable {
    pub columns: Vec<ReportColumn>,
    /// Columns named by [`ReportColumn::name`], in layout order.
    pub data: DataFrame,
    /// Months present in the source, oldest first.
    pub months: Vec<YearMonth>,
    pub summary: CohortSummary,
}

impl ReportTable {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            data: DataFrame::empty(),
            months: Vec::new(),
            summary: CohortSummary::default(),
        }
    }

    pub fn height(&self) -> usize {
        self.data.height()
    }

    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    pub fn labels(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.label.as_str()).collect()
    }

    pub fn column(&self, kind: &ColumnKind) -> Option<&ReportColumn> {
        self.columns.iter().find(|c| &c.kind == kind)
    }

    pub fn text_values(&self, kind: &ColumnKind) -> Result<Vec<Option<String>>> {
        self.values(kind, any_to_text)
    }

    pub fn f64_values(&self, kind: &ColumnKind) -> Result<Vec<Option<f64>>> {
        self.values(kind, any_to_f64)
    }

    pub fn i64_values(&self, kind: &ColumnKind) -> Result<Vec<Option<i64>>> {
        self.values(kind, any_to_i64)
    }

    fn values<T>(&self, kind: &ColumnKind, convert: impl Fn(AnyValue<'_>) -> Option<T>) -> Result<Vec<Option<T>>> {
        let height = self.data.height();
        let Ok(column) = self.data.column(&kind.name()) else {
            return Ok(std::iter::repeat_with(|| None).take(height).collect());
        };
        let mut values = Vec::with_capacity(height);
        for idx in 0..height {
            values.push(convert(column.get(idx)?));
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use dhi_model::keys;

    use super::*;

    #[test]
    fn labels_follow_registry_and_month_format() {
        let config = HerdConfig::default();
        let month = YearMonth::new(2024, 3).unwrap();
        let column = ReportColumn::new(
            ColumnKind::Month {
                month,
                field: keys::PROTEIN_PCT.to_string(),
            },
            &config,
        );
        assert_eq!(column.name, "2024-03:protein_pct");
        assert_eq!(column.label, "2024年03月蛋白率(%)");

        let average = ColumnKind::Average {
            field: keys::FAT_PCT.to_string(),
        };
        assert_eq!(average.label(&config), "平均乳脂率(%)");
        assert_eq!(
            ColumnKind::Identity {
                field: keys::MANAGEMENT_ID.to_string()
            }
            .label(&config),
            "管理号"
        );
    }
}
