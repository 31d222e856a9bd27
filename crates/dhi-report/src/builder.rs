//! Monthly pivot of a filtered cohort.
//!
//! Each animal becomes one row. Months are laid out oldest first, each as a
//! block of the requested fields, followed by per-animal summary columns.
//! When an animal has several records in one month the latest dated record
//! stands for that month.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use polars::prelude::{Column, DataFrame, IntoColumn, NamedFrom, Series};
use tracing::{debug, info, warn};

use dhi_common::{mean, round_to};
use dhi_ingest::ActiveRoster;
use dhi_model::{
    AnimalKey, DhiError, FieldDef, HerdConfig, HerdDataset, Outcome, Phase, Result, RunHooks, ValueType, YearMonth,
    keys,
};

use crate::projection::{project_lactation_days, projection_within};
use crate::table::{CohortSummary, ColumnKind, MonthAverage, ReportColumn, ReportTable};
use crate::weighted::WeightedMean;

/// Fields that are identity columns rather than month values.
const IDENTITY_FIELDS: [&str; 4] = [keys::FARM_ID, keys::MANAGEMENT_ID, keys::PARITY, keys::SAMPLE_DATE];

/// Builds [`ReportTable`]s from a filtered dataset.
#[derive(Debug, Clone, Copy)]
pub struct MonthlyReportBuilder<'a> {
    config: &'a HerdConfig,
    roster: Option<&'a ActiveRoster>,
    future_range: Option<(Option<i64>, Option<i64>)>,
    hooks: RunHooks<'a>,
}

impl<'a> MonthlyReportBuilder<'a> {
    pub fn new(config: &'a HerdConfig) -> Self {
        Self {
            config,
            roster: None,
            future_range: None,
            hooks: RunHooks::none(),
        }
    }

    /// Adds a roster parity column after the parity column.
    pub fn with_roster(mut self, roster: &'a ActiveRoster) -> Self {
        self.roster = Some(roster);
        self
    }

    /// Keeps only animals whose projected lactation days fall within the
    /// inclusive bounds. Animals without a projection are kept.
    pub fn with_future_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.future_range = Some((min, max));
        self
    }

    pub fn with_hooks(mut self, hooks: RunHooks<'a>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Pivots `dataset` into one row per animal.
    ///
    /// `display_fields` sets the fields of each month block and their order;
    /// identity fields and unknown keys are ignored. Projections are only
    /// computed when `plan_date` is given. A cancelled run returns an empty
    /// report.
    pub fn build(
        &self,
        dataset: &HerdDataset,
        display_fields: &[String],
        plan_date: Option<NaiveDate>,
    ) -> Result<ReportTable> {
        if dataset.is_empty() {
            info!(file = %dataset.source_file, "empty dataset; nothing to report");
            return Ok(ReportTable::empty());
        }
        if self.hooks.is_cancelled() {
            return Ok(cancelled());
        }
        let fields = self.month_fields(display_fields);
        let source = SourceColumns::read(dataset, &fields)?;

        let mut animals = group_animals(&source, &fields, plan_date);
        info!(animals = animals.len(), fields = fields.len(), "grouped records by animal");
        self.hooks.report(Phase::Pivot, 50);

        if let Some((min, max)) = self.future_range {
            if plan_date.is_none() {
                warn!("future lactation range given without a plan date; no animal is excluded");
            }
            let before = animals.len();
            animals.retain(|a| projection_within(a.future_days, min, max));
            info!(before, after = animals.len(), min, max, "future lactation filter applied");
        }
        if self.hooks.is_cancelled() {
            return Ok(cancelled());
        }

        // Months of the reported animals only.
        let months: Vec<YearMonth> = animals
            .iter()
            .flat_map(|a| a.months.keys().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let layout = self.layout(dataset, &fields, &months, plan_date);
        let mut frame_columns: Vec<Column> = Vec::with_capacity(layout.len());
        for column in &layout {
            frame_columns.push(render_column(column, &animals, &fields, &source, self.roster)?);
        }
        let data = DataFrame::new(frame_columns)?;
        let summary = summarize(&animals, &fields, &months, &source);

        info!(animals = data.height(), columns = layout.len(), "monthly report built");
        self.hooks.report(Phase::Done, 100);
        Ok(ReportTable {
            columns: layout,
            data,
            months,
            summary,
        })
    }

    /// [`MonthlyReportBuilder::build`] reported as an [`Outcome`].
    pub fn run(
        &self,
        dataset: &HerdDataset,
        display_fields: &[String],
        plan_date: Option<NaiveDate>,
    ) -> Outcome<ReportTable> {
        Outcome::from_result(
            self.build(dataset, display_fields, plan_date),
            &dataset.source_file,
            |table| {
                format!(
                    "report built for {} animals over {} months",
                    table.height(),
                    table.months.len()
                )
            },
        )
    }

    fn month_fields(&self, display_fields: &[String]) -> Vec<&'a FieldDef> {
        let mut fields: Vec<&FieldDef> = Vec::new();
        for key in display_fields {
            if IDENTITY_FIELDS.contains(&key.as_str()) || fields.iter().any(|f| &f.key == key) {
                continue;
            }
            match self.config.fields.get(key) {
                Some(field) => fields.push(field),
                None => warn!(field = %key, "unknown report field skipped"),
            }
        }
        fields
    }

    fn layout(
        &self,
        dataset: &HerdDataset,
        fields: &[&FieldDef],
        months: &[YearMonth],
        plan_date: Option<NaiveDate>,
    ) -> Vec<ReportColumn> {
        let mut kinds = Vec::new();
        if dataset.has_column(keys::FARM_ID) {
            kinds.push(identity(keys::FARM_ID));
        }
        kinds.push(identity(keys::MANAGEMENT_ID));
        kinds.push(identity(keys::PARITY));
        if self.roster.is_some() {
            kinds.push(ColumnKind::RosterParity);
        }
        for month in months {
            for field in fields {
                kinds.push(ColumnKind::Month {
                    month: *month,
                    field: field.key.clone(),
                });
            }
        }
        for field in fields.iter().filter(|f| f.weighted_by_yield) {
            kinds.push(ColumnKind::Average {
                field: field.key.clone(),
            });
        }
        if fields.iter().any(|f| f.key == keys::LACTATION_DAYS) {
            kinds.push(ColumnKind::LastLactationDays);
        }
        kinds.push(ColumnKind::LastSampleDate);
        if plan_date.is_some() {
            kinds.push(ColumnKind::FutureLactationDays);
        }
        kinds
            .into_iter()
            .map(|kind| ReportColumn::new(kind, self.config))
            .collect()
    }
}

fn identity(field: &str) -> ColumnKind {
    ColumnKind::Identity {
        field: field.to_string(),
    }
}

fn cancelled() -> ReportTable {
    info!("report building cancelled");
    ReportTable::empty()
}

/// Values of one month field, typed by the registry.
enum FieldValues {
    Number(Vec<Option<f64>>),
    Integer(Vec<Option<i64>>),
    Text(Vec<Option<String>>),
}

impl FieldValues {
    fn read(dataset: &HerdDataset, field: &FieldDef) -> Result<Self> {
        Ok(match field.value_type {
            ValueType::Number => Self::Number(dataset.f64_values(&field.key)?),
            ValueType::Integer => Self::Integer(dataset.i64_values(&field.key)?),
            ValueType::Text | ValueType::Date => Self::Text(dataset.text_values(&field.key)?),
        })
    }

    fn number(&self, row: usize) -> Option<f64> {
        match self {
            Self::Number(values) => values[row],
            Self::Integer(values) => values[row].map(|v| v as f64),
            Self::Text(_) => None,
        }
    }

    fn is_numeric(&self) -> bool {
        !matches!(self, Self::Text(_))
    }

    fn column(&self, name: &str, rows: &[Option<usize>]) -> Column {
        match self {
            Self::Number(values) => {
                let picked: Vec<Option<f64>> = rows.iter().map(|r| r.and_then(|r| values[r])).collect();
                Series::new(name.into(), picked).into_column()
            }
            Self::Integer(values) => {
                let picked: Vec<Option<i64>> = rows.iter().map(|r| r.and_then(|r| values[r])).collect();
                Series::new(name.into(), picked).into_column()
            }
            Self::Text(values) => {
                let picked: Vec<Option<String>> = rows.iter().map(|r| r.and_then(|r| values[r].clone())).collect();
                Series::new(name.into(), picked).into_column()
            }
        }
    }
}

/// Source columns read once from the dataset.
struct SourceColumns {
    keys: Vec<Option<AnimalKey>>,
    dates: Vec<Option<NaiveDate>>,
    parity: Vec<Option<i64>>,
    lactation_days: Vec<Option<i64>>,
    milk_yield: Vec<Option<f64>>,
    fields: BTreeMap<String, FieldValues>,
}

impl SourceColumns {
    fn read(dataset: &HerdDataset, fields: &[&FieldDef]) -> Result<Self> {
        let mut values = BTreeMap::new();
        for field in fields {
            values.insert(field.key.clone(), FieldValues::read(dataset, field)?);
        }
        Ok(Self {
            keys: dataset.animal_keys()?,
            dates: dataset.sample_dates()?,
            parity: dataset.i64_values(keys::PARITY)?,
            lactation_days: dataset.i64_values(keys::LACTATION_DAYS)?,
            milk_yield: dataset.f64_values(keys::MILK_YIELD)?,
            fields: values,
        })
    }
}

/// Per-animal state of the pivot.
struct AnimalRow {
    key: AnimalKey,
    parity: Option<i64>,
    /// Row index standing for each month.
    months: BTreeMap<YearMonth, usize>,
    averages: BTreeMap<String, WeightedMean>,
    last_sample_date: Option<NaiveDate>,
    last_lactation_days: Option<i64>,
    future_days: Option<i64>,
}

fn group_animals(source: &SourceColumns, fields: &[&FieldDef], plan_date: Option<NaiveDate>) -> Vec<AnimalRow> {
    let mut grouped: BTreeMap<&AnimalKey, Vec<usize>> = BTreeMap::new();
    let mut unkeyed = 0usize;
    for (row, key) in source.keys.iter().enumerate() {
        match key {
            Some(key) => grouped.entry(key).or_default().push(row),
            None => unkeyed += 1,
        }
    }
    if unkeyed > 0 {
        debug!(rows = unkeyed, "records without a management id left out of the report");
    }

    grouped
        .into_iter()
        .map(|(key, rows)| pivot_animal(key, &rows, source, fields, plan_date))
        .collect()
}

fn pivot_animal(
    key: &AnimalKey,
    rows: &[usize],
    source: &SourceColumns,
    fields: &[&FieldDef],
    plan_date: Option<NaiveDate>,
) -> AnimalRow {
    let mut dated: Vec<(NaiveDate, usize)> = rows
        .iter()
        .filter_map(|&row| source.dates[row].map(|date| (date, row)))
        .collect();
    dated.sort();

    let mut months = BTreeMap::new();
    for (date, row) in &dated {
        months.insert(YearMonth::from_date(*date), *row);
    }

    let parity = dated
        .iter()
        .rev()
        .find_map(|(_, row)| source.parity[*row])
        .or_else(|| rows.iter().rev().find_map(|row| source.parity[*row]));

    let mut averages = BTreeMap::new();
    for field in fields.iter().filter(|f| f.weighted_by_yield) {
        let Some(values) = source.fields.get(&field.key) else {
            continue;
        };
        let mut weighted = WeightedMean::new();
        for row in months.values() {
            weighted.push(values.number(*row), source.milk_yield[*row]);
        }
        averages.insert(field.key.clone(), weighted);
    }

    let last_sample_date = dated.last().map(|(date, _)| *date);
    let lactation_anchor = dated
        .iter()
        .rev()
        .find_map(|(date, row)| source.lactation_days[*row].map(|days| (*date, days)));
    let last_lactation_days = lactation_anchor.map(|(_, days)| days);

    let future_days = plan_date.and_then(|plan| {
        let projected = match lactation_anchor {
            Some((sampled, days)) => project_lactation_days(plan, sampled, Some(days)),
            None => Err(DhiError::ComputationSkipped {
                what: "future lactation days".to_string(),
                reason: "no dated record carries lactation days".to_string(),
            }),
        };
        match projected {
            Ok(days) => Some(days),
            Err(err) => {
                debug!(animal = %key, error = %err, "projection unavailable");
                None
            }
        }
    });

    AnimalRow {
        key: key.clone(),
        parity,
        months,
        averages,
        last_sample_date,
        last_lactation_days,
        future_days,
    }
}

fn render_column(
    column: &ReportColumn,
    animals: &[AnimalRow],
    fields: &[&FieldDef],
    source: &SourceColumns,
    roster: Option<&ActiveRoster>,
) -> Result<Column> {
    let name = column.name.as_str();
    let rendered = match &column.kind {
        ColumnKind::Identity { field } if field == keys::FARM_ID => {
            let values: Vec<Option<String>> = animals.iter().map(|a| a.key.farm_id.clone()).collect();
            Series::new(name.into(), values).into_column()
        }
        ColumnKind::Identity { field } if field == keys::MANAGEMENT_ID => {
            let values: Vec<String> = animals.iter().map(|a| a.key.management_id.clone()).collect();
            Series::new(name.into(), values).into_column()
        }
        ColumnKind::Identity { .. } => {
            let values: Vec<Option<i64>> = animals.iter().map(|a| a.parity).collect();
            Series::new(name.into(), values).into_column()
        }
        ColumnKind::RosterParity => {
            let values: Vec<Option<i64>> = animals
                .iter()
                .map(|a| {
                    roster
                        .and_then(|r| r.parity_of(&a.key.management_id))
                        .or(a.parity)
                })
                .collect();
            Series::new(name.into(), values).into_column()
        }
        ColumnKind::Month { month, field } => {
            let rows: Vec<Option<usize>> = animals.iter().map(|a| a.months.get(month).copied()).collect();
            match source.fields.get(field) {
                Some(values) => values.column(name, &rows),
                None => {
                    return Err(DhiError::DataFrame {
                        message: format!("report field '{field}' was not read"),
                    });
                }
            }
        }
        ColumnKind::Average { field } => {
            let decimals = fields.iter().find(|f| &f.key == field).map_or(2, |f| f.decimals);
            let values: Vec<Option<f64>> = animals
                .iter()
                .map(|a| {
                    a.averages
                        .get(field)
                        .and_then(WeightedMean::value)
                        .map(|v| round_to(v, decimals))
                })
                .collect();
            Series::new(name.into(), values).into_column()
        }
        ColumnKind::LastLactationDays => {
            let values: Vec<Option<i64>> = animals.iter().map(|a| a.last_lactation_days).collect();
            Series::new(name.into(), values).into_column()
        }
        ColumnKind::LastSampleDate => {
            let values: Vec<Option<String>> = animals
                .iter()
                .map(|a| a.last_sample_date.map(|d| d.format("%Y-%m-%d").to_string()))
                .collect();
            Series::new(name.into(), values).into_column()
        }
        ColumnKind::FutureLactationDays => {
            let values: Vec<Option<i64>> = animals.iter().map(|a| a.future_days).collect();
            Series::new(name.into(), values).into_column()
        }
    };
    Ok(rendered)
}

fn summarize(
    animals: &[AnimalRow],
    fields: &[&FieldDef],
    months: &[YearMonth],
    source: &SourceColumns,
) -> CohortSummary {
    let weighted_averages = fields
        .iter()
        .filter(|f| f.weighted_by_yield)
        .map(|field| {
            let mut cohort = WeightedMean::new();
            for animal in animals {
                if let Some(mean) = animal.averages.get(&field.key) {
                    cohort.merge(mean);
                }
            }
            (field.key.clone(), cohort.value().map(|v| round_to(v, field.decimals)))
        })
        .collect();

    let parities: Vec<f64> = animals.iter().filter_map(|a| a.parity).map(|p| p as f64).collect();
    let mean_parity = mean(&parities).map(|v| round_to(v, 1));

    let milk_displayed = fields.iter().any(|f| f.key == keys::MILK_YIELD);
    let mut month_averages = Vec::new();
    for month in months {
        for field in fields {
            let Some(values) = source.fields.get(&field.key).filter(|v| v.is_numeric()) else {
                continue;
            };
            let reps = animals.iter().filter_map(|a| a.months.get(month).copied());
            let value = if field.weighted_by_yield && milk_displayed {
                let mut weighted = WeightedMean::new();
                for row in reps {
                    weighted.push(values.number(row), source.milk_yield[row]);
                }
                weighted.value()
            } else {
                let observed: Vec<f64> = reps.filter_map(|row| values.number(row)).collect();
                mean(&observed)
            };
            month_averages.push(MonthAverage {
                month: *month,
                field: field.key.clone(),
                value: value.map(|v| round_to(v, field.decimals)),
            });
        }
    }

    CohortSummary {
        animals: animals.len(),
        weighted_averages,
        mean_parity,
        month_averages,
    }
}
