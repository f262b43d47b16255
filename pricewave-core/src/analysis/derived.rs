//! DerivedMetrics — stateless per-metric summaries and month-wise combinations
//! of two metrics (gender gap, misery index).
//!
//! Combined series are ordinary `MonthlySeries`, so they can be added to a
//! panel with `Panel::with_metric` and fed back into the lag and break engines.

use serde::{Deserialize, Serialize};

use super::stats;
use crate::domain::{MonthlySeries, YearMonth};
use crate::panel::Panel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub metric: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; needs two observations.
    pub std: Option<f64>,
    pub skewness: Option<f64>,
    /// Coefficient of variation (volatility): std / mean.
    pub cv: Option<f64>,
}

/// Summary of one series' observed values; `None` when it has none.
pub fn describe(series: &MonthlySeries) -> Option<DescriptiveStats> {
    let values = series.observed_values();
    let mean = stats::mean(&values)?;
    let median = stats::median(&values)?;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(DescriptiveStats {
        metric: series.name().to_string(),
        count: values.len(),
        mean,
        median,
        min,
        max,
        std: stats::sample_std(&values),
        skewness: stats::skewness(&values),
        cv: stats::coefficient_of_variation(&values),
    })
}

/// `describe` for every panel metric with at least one value, in name order.
pub fn describe_panel(panel: &Panel) -> Vec<DescriptiveStats> {
    panel.series().filter_map(describe).collect()
}

/// Coefficient of variation of a series' observed values.
pub fn volatility(series: &MonthlySeries) -> Option<f64> {
    stats::coefficient_of_variation(&series.observed_values())
}

pub fn skewness(series: &MonthlySeries) -> Option<f64> {
    stats::skewness(&series.observed_values())
}

/// Month-wise `f(a[t], b[t])`, present only where both inputs are.
///
/// The result spans the union of both calendars.
pub fn combine(
    name: impl Into<String>,
    a: &MonthlySeries,
    b: &MonthlySeries,
    f: impl Fn(f64, f64) -> f64,
) -> MonthlySeries {
    let name = name.into();
    let start = match (a.start(), b.start()) {
        (Some(x), Some(y)) => x.min(y),
        _ => return MonthlySeries::empty(name),
    };
    let end = match (a.end(), b.end()) {
        (Some(x), Some(y)) => x.max(y),
        _ => return MonthlySeries::empty(name),
    };
    let values = YearMonth::range_inclusive(start, end)
        .into_iter()
        .map(|m| Some(f(a.get(m)?, b.get(m)?)))
        .collect();
    MonthlySeries::from_slots(name, start, values)
}

/// `female[t] - male[t]` per month.
pub fn gender_gap(
    name: impl Into<String>,
    female: &MonthlySeries,
    male: &MonthlySeries,
) -> MonthlySeries {
    combine(name, female, male, |f, m| f - m)
}

/// `unemployment[t] + inflation_yoy[t]` per month.
pub fn misery_index(
    name: impl Into<String>,
    unemployment: &MonthlySeries,
    inflation_yoy: &MonthlySeries,
) -> MonthlySeries {
    combine(name, unemployment, inflation_yoy, |u, i| u + i)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapSummary {
    pub metric: String,
    pub months: usize,
    pub mean_gap: f64,
    pub max_gap: f64,
    /// Earliest month at which `max_gap` occurred.
    pub max_month: YearMonth,
}

pub fn summarize_gap(gap: &MonthlySeries) -> Option<GapSummary> {
    let values = gap.observed_values();
    let mean_gap = stats::mean(&values)?;
    let (max_month, max_gap) = gap
        .observed()
        .fold(None, |best: Option<(YearMonth, f64)>, (m, v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((m, v)),
        })?;
    Some(GapSummary {
        metric: gap.name().to_string(),
        months: values.len(),
        mean_gap,
        max_gap,
        max_month,
    })
}
