//! Panel — every metric aligned on one shared, contiguous monthly calendar.
//!
//! A panel is immutable once built. Analyses borrow it read-only; adding a
//! derived metric produces a new panel.

pub mod integrate;

pub use integrate::{GapFill, IndexPolicy, IntegrationOptions, PanelIntegrator, YOY_SUFFIX};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{MonthlySeries, YearMonth};
use crate::error::{AnalysisError, IntegrationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    months: Vec<YearMonth>,
    series: BTreeMap<String, MonthlySeries>,
    derived: BTreeSet<String>,
}

impl Panel {
    /// Assemble from series already reindexed onto `months`.
    pub(crate) fn assemble(
        months: Vec<YearMonth>,
        series: BTreeMap<String, MonthlySeries>,
        derived: BTreeSet<String>,
    ) -> Self {
        Self {
            months,
            series,
            derived,
        }
    }

    /// Build from pre-aligned columns, e.g. a panel read back from disk.
    ///
    /// `months` must be strictly consecutive and every column must hold one
    /// slot per month. Columns named in `derived` are flagged as derived.
    pub fn from_columns(
        months: Vec<YearMonth>,
        columns: Vec<(String, Vec<Option<f64>>)>,
        derived: &[String],
    ) -> Result<Self, IntegrationError> {
        let Some(start) = months.first().copied() else {
            return Err(IntegrationError::Alignment {
                metrics: columns.into_iter().map(|(n, _)| n).collect(),
                detail: "panel has no months".into(),
            });
        };
        for pair in months.windows(2) {
            if pair[1] != pair[0].succ() {
                return Err(IntegrationError::Calendar {
                    detail: format!(
                        "{} is followed by {}, expected consecutive months",
                        pair[0], pair[1]
                    ),
                });
            }
        }

        let mut series = BTreeMap::new();
        for (name, slots) in columns {
            if slots.len() != months.len() {
                return Err(IntegrationError::Calendar {
                    detail: format!(
                        "column '{name}' has {} slots for {} months",
                        slots.len(),
                        months.len()
                    ),
                });
            }
            if series.contains_key(&name) {
                return Err(IntegrationError::DuplicateMetric(name));
            }
            series.insert(name.clone(), MonthlySeries::from_slots(name, start, slots));
        }
        let derived = derived
            .iter()
            .filter(|d| series.contains_key(*d))
            .cloned()
            .collect();

        Ok(Self::assemble(months, series, derived))
    }

    pub fn months(&self) -> &[YearMonth] {
        &self.months
    }

    pub fn start(&self) -> YearMonth {
        self.months[0]
    }

    pub fn end(&self) -> YearMonth {
        self.months[self.months.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    /// Metric names in sorted order.
    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn contains(&self, metric: &str) -> bool {
        self.series.contains_key(metric)
    }

    pub fn get(&self, metric: &str) -> Result<&MonthlySeries, AnalysisError> {
        self.series
            .get(metric)
            .ok_or_else(|| AnalysisError::UnknownMetric(metric.to_string()))
    }

    pub fn series(&self) -> impl Iterator<Item = &MonthlySeries> {
        self.series.values()
    }

    /// True for columns computed by the integrator or added later
    /// (YoY, gender gap, ...), false for source metrics.
    pub fn is_derived(&self, metric: &str) -> bool {
        self.derived.contains(metric)
    }

    pub fn derived_names(&self) -> impl Iterator<Item = &str> {
        self.derived.iter().map(String::as_str)
    }

    /// A new panel with `series` added as a derived metric.
    ///
    /// The series is reindexed onto this panel's calendar; months it does
    /// not cover become missing.
    pub fn with_metric(&self, series: MonthlySeries) -> Result<Panel, IntegrationError> {
        let name = series.name().to_string();
        if self.series.contains_key(&name) {
            return Err(IntegrationError::DuplicateMetric(name));
        }
        let mut next = self.clone();
        next.series
            .insert(name.clone(), series.reindex(self.start(), self.len()));
        next.derived.insert(name);
        Ok(next)
    }

    /// Row-major view: each month with one slot per metric in sorted order.
    pub fn rows(&self) -> impl Iterator<Item = (YearMonth, Vec<Option<f64>>)> + '_ {
        self.months.iter().enumerate().map(move |(i, m)| {
            let row = self.series.values().map(|s| s.slots()[i]).collect();
            (*m, row)
        })
    }

    /// Deterministic BLAKE3 hash over the calendar and every value.
    ///
    /// Metrics are hashed in sorted order, so the hash is independent of the
    /// order sources were supplied in.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for m in &self.months {
            hasher.update(m.to_string().as_bytes());
        }
        for (name, series) in &self.series {
            hasher.update(name.as_bytes());
            for slot in series.slots() {
                match slot {
                    Some(v) => {
                        hasher.update(&[1]);
                        hasher.update(&v.to_le_bytes());
                    }
                    None => {
                        hasher.update(&[0]);
                    }
                }
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}
