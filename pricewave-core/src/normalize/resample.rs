//! SeriesNormalizer — sub-monthly observations to one value per calendar month.
//!
//! The aggregation rule is chosen per source by configuration, never inferred
//! from the data. Months without a single finite observation stay missing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{MonthlySeries, RawObservation, YearMonth};

/// How several readings inside one month collapse into a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationRule {
    /// Arithmetic mean (prices sampled weekly or daily).
    #[default]
    Mean,
    /// Latest reading in the month (month-end snapshots).
    Last,
    /// Earliest reading in the month.
    First,
    /// Total of all readings (counts).
    Sum,
    Median,
}

impl AggregationRule {
    /// Aggregate readings already sorted by timestamp. `None` for an empty slice.
    pub fn apply(&self, sorted: &[f64]) -> Option<f64> {
        if sorted.is_empty() {
            return None;
        }
        let value = match self {
            AggregationRule::Mean => sorted.iter().sum::<f64>() / sorted.len() as f64,
            AggregationRule::Last => sorted[sorted.len() - 1],
            AggregationRule::First => sorted[0],
            AggregationRule::Sum => sorted.iter().sum(),
            AggregationRule::Median => {
                let mut v = sorted.to_vec();
                v.sort_by(|a, b| a.total_cmp(b));
                let mid = v.len() / 2;
                if v.len() % 2 == 0 {
                    (v[mid - 1] + v[mid]) / 2.0
                } else {
                    v[mid]
                }
            }
        };
        Some(value)
    }
}

/// Resamples one metric's raw observations onto the monthly calendar.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesNormalizer {
    rule: AggregationRule,
}

impl SeriesNormalizer {
    pub fn new(rule: AggregationRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> AggregationRule {
        self.rule
    }

    /// Group by calendar month and aggregate. Input order does not matter.
    pub fn normalize(&self, metric: &str, observations: &[RawObservation]) -> MonthlySeries {
        let mut sorted: Vec<&RawObservation> = observations
            .iter()
            .filter(|o| o.value.is_finite())
            .collect();
        let dropped = observations.len() - sorted.len();
        // ties on one timestamp are ordered by value so the result never
        // depends on input order
        sorted.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.value.total_cmp(&b.value))
        });

        let mut by_month: BTreeMap<YearMonth, Vec<f64>> = BTreeMap::new();
        for obs in sorted {
            by_month.entry(obs.month()).or_default().push(obs.value);
        }

        let points = by_month
            .iter()
            .filter_map(|(month, values)| self.rule.apply(values).map(|v| (*month, v)));
        let series = MonthlySeries::from_points(metric, points);

        debug!(
            metric,
            rule = ?self.rule,
            observations = observations.len(),
            non_finite_dropped = dropped,
            months = series.observed_count(),
            "normalized sub-monthly series"
        );
        series
    }
}
