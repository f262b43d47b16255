//! Sensitivity regression: how strongly one metric moves with another, as an
//! ordinary least squares slope on same-month pairs.

use serde::{Deserialize, Serialize};

use super::stats::{ols, paired_lagged};
use crate::error::{AnalysisError, Scope};
use crate::panel::Panel;

/// Default minimum: strictly more than ten paired months.
pub const MIN_REGRESSION_PAIRS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Minimum same-month pairs required for a fit.
    pub min_pairs: usize,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            min_pairs: MIN_REGRESSION_PAIRS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityFit {
    /// Explanatory metric.
    pub x: String,
    /// Response metric.
    pub y: String,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub n: usize,
}

pub fn regress(
    panel: &Panel,
    x: &str,
    y: &str,
    config: RegressionConfig,
) -> Result<SensitivityFit, AnalysisError> {
    let xs = panel.get(x)?;
    let ys = panel.get(y)?;
    let pairs = paired_lagged(xs, ys, 0);
    if pairs.len() < config.min_pairs {
        return Err(AnalysisError::InsufficientData {
            series_a: x.to_string(),
            series_b: y.to_string(),
            scope: Scope::Regression,
            available: pairs.len(),
            required: config.min_pairs,
        });
    }
    let fit = ols(&pairs).ok_or_else(|| AnalysisError::ZeroVariance {
        series_a: x.to_string(),
        series_b: y.to_string(),
        scope: Scope::Regression,
    })?;
    Ok(SensitivityFit {
        x: x.to_string(),
        y: y.to_string(),
        slope: fit.slope,
        intercept: fit.intercept,
        r_squared: fit.r_squared,
        n: fit.n,
    })
}
