//! Analysis engines. All of them borrow a built `Panel` read-only and return
//! new result values; failures are scoped to one pair and one lag/partition.

pub mod breaks;
pub mod derived;
pub mod lag;
pub mod sensitivity;
pub mod stats;

pub use breaks::{
    rolling_correlation, BreakConfig, BreakTest, BreakTestResult, StructuralBreakTester,
};
pub use derived::{
    describe, describe_panel, gender_gap, misery_index, summarize_gap, DescriptiveStats, GapSummary,
};
pub use lag::{LagConfig, LagCorrelationEngine, LagResult, LagScan};
pub use sensitivity::{regress, RegressionConfig, SensitivityFit, MIN_REGRESSION_PAIRS};
