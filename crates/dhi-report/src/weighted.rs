//! Yield-weighted averages.

use serde::Serialize;

/// Running weighted mean. Pairs with a missing value or weight are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WeightedMean {
    weighted_sum: f64,
    total_weight: f64,
    pairs: usize,
}

impl WeightedMean {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Option<f64>, weight: Option<f64>) {
        if let (Some(value), Some(weight)) = (value, weight)
            && value.is_finite()
            && weight.is_finite()
        {
            self.weighted_sum += value * weight;
            self.total_weight += weight;
            self.pairs += 1;
        }
    }

    pub fn merge(&mut self, other: &Self) {
        self.weighted_sum += other.weighted_sum;
        self.total_weight += other.total_weight;
        self.pairs += other.pairs;
    }

    /// Number of accepted pairs.
    pub fn pairs(&self) -> usize {
        self.pairs
    }

    /// The mean, or `None` without pairs or with a non-positive total weight.
    pub fn value(&self) -> Option<f64> {
        (self.pairs > 0 && self.total_weight > 0.0).then(|| self.weighted_sum / self.total_weight)
    }
}

/// Mean of `value` weighted by `weight` over complete pairs.
///
/// ```
/// use dhi_report::weighted_average;
///
/// let avg = weighted_average(&[(Some(3.0), Some(10.0)), (Some(4.0), Some(20.0))]).unwrap();
/// assert!((avg - 3.667).abs() < 1e-3);
/// assert_eq!(weighted_average(&[(Some(3.0), None)]), None);
/// ```
pub fn weighted_average(pairs: &[(Option<f64>, Option<f64>)]) -> Option<f64> {
    let mut mean = WeightedMean::new();
    for (value, weight) in pairs {
        mean.push(*value, *weight);
    }
    mean.value()
}

#[cfg(test)]
mod tests {
    use dhi_common::round_to;

    use super::*;

    #[test]
    fn yield_weighted_protein() {
        let avg = weighted_average(&[(Some(3.0), Some(10.0)), (Some(4.0), Some(20.0))]).unwrap();
        assert_eq!(round_to(avg, 2), 3.67);
    }

    #[test]
    fn incomplete_pairs_are_skipped() {
        let mut mean = WeightedMean::new();
        mean.push(Some(3.0), None);
        mean.push(None, Some(25.0));
        assert_eq!(mean.value(), None);
        mean.push(Some(3.2), Some(25.0));
        assert_eq!(mean.pairs(), 1);
        assert_eq!(mean.value(), Some(3.2));
    }

    #[test]
    fn zero_weight_has_no_mean() {
        assert_eq!(weighted_average(&[(Some(3.0), Some(0.0))]), None);
    }

    #[test]
    fn merge_combines_totals() {
        let mut a = WeightedMean::new();
        a.push(Some(3.0), Some(10.0));
        let mut b = WeightedMean::new();
        b.push(Some(4.0), Some(20.0));
        a.merge(&b);
        assert_eq!(a.pairs(), 2);
        assert_eq!(a.value(), weighted_average(&[(Some(3.0), Some(10.0)), (Some(4.0), Some(20.0))]));
    }
}
