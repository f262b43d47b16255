//! RawObservation — one sub-monthly reading handed over by the ingestion layer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::YearMonth;

/// A single reading at its native granularity (daily, weekly, or a
/// month-cell stamped on the first of the month).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub timestamp: NaiveDate,
    pub value: f64,
    pub source_id: String,
}

impl RawObservation {
    pub fn new(timestamp: NaiveDate, value: f64, source_id: impl Into<String>) -> Self {
        Self {
            timestamp,
            value,
            source_id: source_id.into(),
        }
    }

    pub fn month(&self) -> YearMonth {
        YearMonth::from_date(self.timestamp)
    }
}
