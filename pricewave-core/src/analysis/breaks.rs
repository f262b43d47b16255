//! StructuralBreakTester — compare a pair's correlation before and after a
//! boundary month, plus a trailing rolling correlation for the same pair.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::stats::{paired_where, pearson};
use crate::domain::{MonthlySeries, YearMonth};
use crate::error::{AnalysisError, Period, Scope};
use crate::panel::Panel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakConfig {
    /// First month of the `post` partition.
    pub boundary: YearMonth,
    /// Minimum paired months required in each partition.
    pub min_sample: usize,
    /// `|post - pre|` above this flags a regime shift.
    pub shift_threshold: f64,
}

impl Default for BreakConfig {
    fn default() -> Self {
        Self {
            boundary: YearMonth::first_of_year(2020),
            min_sample: 6,
            shift_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakTestResult {
    pub series_a: String,
    pub series_b: String,
    pub period: Period,
    pub correlation: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakTest {
    pub series_a: String,
    pub series_b: String,
    pub boundary: YearMonth,
    pub pre: Result<BreakTestResult, AnalysisError>,
    pub post: Result<BreakTestResult, AnalysisError>,
    /// `post - pre`, when both partitions succeeded.
    pub difference: Option<f64>,
    pub regime_shift: Option<bool>,
}

impl BreakTest {
    /// Both partitions, or the first partition failure.
    pub fn partitions(&self) -> Result<(&BreakTestResult, &BreakTestResult), &AnalysisError> {
        match (&self.pre, &self.post) {
            (Ok(pre), Ok(post)) => Ok((pre, post)),
            (Err(e), _) | (_, Err(e)) => Err(e),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StructuralBreakTester {
    config: BreakConfig,
}

impl StructuralBreakTester {
    pub fn new(config: BreakConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BreakConfig {
        &self.config
    }

    pub fn test(
        &self,
        panel: &Panel,
        series_a: &str,
        series_b: &str,
    ) -> Result<BreakTest, AnalysisError> {
        let a = panel.get(series_a)?;
        let b = panel.get(series_b)?;
        Ok(self.test_series(a, b))
    }

    pub fn test_series(&self, a: &MonthlySeries, b: &MonthlySeries) -> BreakTest {
        let boundary = self.config.boundary;
        let pre = self.partition(a, b, Period::Pre, |m| m < boundary);
        let post = self.partition(a, b, Period::Post, |m| m >= boundary);

        let difference = match (&pre, &post) {
            (Ok(p), Ok(q)) => Some(q.correlation - p.correlation),
            _ => None,
        };
        let regime_shift = difference.map(|d| d.abs() > self.config.shift_threshold);

        debug!(
            series_a = a.name(),
            series_b = b.name(),
            boundary = %boundary,
            difference,
            regime_shift,
            "structural break test"
        );

        BreakTest {
            series_a: a.name().to_string(),
            series_b: b.name().to_string(),
            boundary,
            pre,
            post,
            difference,
            regime_shift,
        }
    }

    fn partition(
        &self,
        a: &MonthlySeries,
        b: &MonthlySeries,
        period: Period,
        keep: impl Fn(YearMonth) -> bool,
    ) -> Result<BreakTestResult, AnalysisError> {
        let pairs = paired_where(a, b, keep);
        let required = self.config.min_sample.max(2);
        let scope = Scope::Partition { period };
        if pairs.len() < required {
            return Err(AnalysisError::InsufficientData {
                series_a: a.name().to_string(),
                series_b: b.name().to_string(),
                scope,
                available: pairs.len(),
                required,
            });
        }
        let correlation = pearson(&pairs).ok_or_else(|| AnalysisError::ZeroVariance {
            series_a: a.name().to_string(),
            series_b: b.name().to_string(),
            scope,
        })?;
        Ok(BreakTestResult {
            series_a: a.name().to_string(),
            series_b: b.name().to_string(),
            period,
            correlation,
            sample_size: pairs.len(),
        })
    }
}

/// Trailing `window`-month Pearson correlation of `a` and `b` on the panel
/// calendar.
///
/// A month is present only when all `window` months ending there are paired
/// and neither side is constant over them.
pub fn rolling_correlation(
    panel: &Panel,
    series_a: &str,
    series_b: &str,
    window: usize,
) -> Result<MonthlySeries, AnalysisError> {
    let a = panel.get(series_a)?.slots();
    let b = panel.get(series_b)?.slots();
    let name = format!("rolling_corr_{series_a}_{series_b}");
    let window = window.max(2);

    let values = (0..panel.len())
        .map(|t| {
            if t + 1 < window {
                return None;
            }
            let pairs: Option<Vec<(f64, f64)>> = (t + 1 - window..=t)
                .map(|i| Some((a[i]?, b[i]?)))
                .collect();
            pearson(&pairs?)
        })
        .collect();

    Ok(MonthlySeries::from_slots(name, panel.start(), values))
}
