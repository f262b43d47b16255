//! Error taxonomy for the integration and analysis stages.
//!
//! All failures are local validation failures raised by the component that
//! detects them. None are retried: the engine performs no I/O.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures while reshaping or aligning source data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    /// A wide-matrix row does not carry the declared number of cells.
    #[error("shape error in '{metric}': row {row} (year {year}) has {found} cells, expected {expected}")]
    Shape {
        metric: String,
        row: usize,
        year: String,
        expected: usize,
        found: usize,
    },

    /// Month headers of a wide matrix cannot be mapped one-to-one onto 1..=12.
    #[error("header error in '{metric}': {reason}")]
    Header { metric: String, reason: String },

    /// A wide-matrix row label is not a usable year.
    #[error("row {row} of '{metric}' has label '{label}': {reason}")]
    RowLabel {
        metric: String,
        row: usize,
        label: String,
        reason: String,
    },

    /// The shared month index would be empty.
    #[error("alignment error: no shared months across [{}]: {detail}", metrics.join(", "))]
    Alignment { metrics: Vec<String>, detail: String },

    #[error("metric '{0}' supplied more than once")]
    DuplicateMetric(String),

    /// Pre-aligned columns do not form a contiguous shared calendar.
    #[error("calendar error: {detail}")]
    Calendar { detail: String },
}

/// Which slice of a pairwise statistic an analysis failure concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    Lag { lag: usize },
    Partition { period: Period },
    Regression,
    Whole,
}

/// Side of a structural-break boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Strictly before the boundary month.
    Pre,
    /// The boundary month and after.
    Post,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Pre => write!(f, "pre"),
            Period::Post => write!(f, "post"),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Lag { lag } => write!(f, "lag {lag}"),
            Scope::Partition { period } => write!(f, "{period} partition"),
            Scope::Regression => write!(f, "regression"),
            Scope::Whole => write!(f, "full sample"),
        }
    }
}

/// Failures of the analysis engines, scoped to one pair and one slice.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum AnalysisError {
    #[error(
        "insufficient data for ({series_a}, {series_b}) at {scope}: {available} paired months, {required} required"
    )]
    InsufficientData {
        series_a: String,
        series_b: String,
        scope: Scope,
        available: usize,
        required: usize,
    },

    /// One of the paired series has zero variance over the paired months.
    #[error("correlation undefined for ({series_a}, {series_b}) at {scope}: constant series")]
    ZeroVariance {
        series_a: String,
        series_b: String,
        scope: Scope,
    },

    #[error("metric '{0}' is not in the panel")]
    UnknownMetric(String),
}
