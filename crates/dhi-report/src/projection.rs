//! Projected lactation days at a planned regrouping date.

use chrono::NaiveDate;

use dhi_model::{DhiError, Result, within};

/// Lactation days the animal will have reached on `plan_date`.
///
/// `last_sample` is the latest sample date that carried a lactation-days
/// value, and `last_days` that value. A missing value or a projection that
/// is not positive yields [`DhiError::ComputationSkipped`].
///
/// ```
/// use chrono::NaiveDate;
/// use dhi_report::project_lactation_days;
///
/// let sampled = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// let plan = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
/// assert_eq!(project_lactation_days(plan, sampled, Some(100)).unwrap(), 110);
/// ```
pub fn project_lactation_days(plan_date: NaiveDate, last_sample: NaiveDate, last_days: Option<i64>) -> Result<i64> {
    let Some(last_days) = last_days else {
        return Err(skipped("no lactation days on the last sample"));
    };
    let projected = (plan_date - last_sample).num_days() + last_days;
    if projected <= 0 {
        return Err(skipped(&format!("projection {projected} is not positive")));
    }
    Ok(projected)
}

fn skipped(reason: &str) -> DhiError {
    DhiError::ComputationSkipped {
        what: "future lactation days".to_string(),
        reason: reason.to_string(),
    }
}

/// True when `days` lies inside the inclusive bounds; a missing projection
/// always passes.
pub fn projection_within(days: Option<i64>, min: Option<i64>, max: Option<i64>) -> bool {
    days.is_none_or(|days| within(days, min, max))
}
