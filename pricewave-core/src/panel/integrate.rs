//! PanelIntegrator — merge normalized series onto one monthly calendar.
//!
//! Steps:
//! 1. Optional interior gap fill per source (off unless configured)
//! 2. Shared index from source observed ranges (intersection or union),
//!    clipped to the analysis window
//! 3. YoY % change for CPI-family metrics, computed on the full source
//!    history so the window's first year is not lost
//! 4. Every metric reindexed onto the shared index; absent months are `None`

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::Panel;
use crate::domain::{MonthlySeries, YearMonth};
use crate::error::IntegrationError;

/// Suffix appended to a metric name for its YoY column.
pub const YOY_SUFFIX: &str = "_yoy";

/// How source ranges combine into the shared month index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexPolicy {
    /// Months covered by every source. Avoids missing-filled edges.
    #[default]
    Intersection,
    /// Months covered by any source; edges are padded with missing.
    Union,
}

/// Missing-value treatment inside a source's own observed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapFill {
    /// Leave gaps missing.
    #[default]
    None,
    /// Linear interpolation between the nearest observed neighbours.
    /// Range edges are never extrapolated.
    LinearInterior,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationOptions {
    pub index_policy: IndexPolicy,
    pub gap_fill: GapFill,
    /// Earliest month admitted to the shared index.
    pub window_start: Option<YearMonth>,
    /// Latest month admitted to the shared index.
    pub window_end: Option<YearMonth>,
    /// Metrics whose names start with this prefix are CPI-family.
    pub cpi_prefix: String,
    /// Additional metrics that get a YoY column.
    pub yoy_metrics: Vec<String>,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self {
            index_policy: IndexPolicy::Intersection,
            gap_fill: GapFill::None,
            window_start: None,
            window_end: None,
            cpi_prefix: "cpi_".into(),
            yoy_metrics: Vec::new(),
        }
    }
}

impl IntegrationOptions {
    fn wants_yoy(&self, metric: &str) -> bool {
        (!self.cpi_prefix.is_empty() && metric.starts_with(&self.cpi_prefix))
            || self.yoy_metrics.iter().any(|m| m == metric)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PanelIntegrator {
    options: IntegrationOptions,
}

impl PanelIntegrator {
    pub fn new(options: IntegrationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &IntegrationOptions {
        &self.options
    }

    /// Build the aligned panel.
    ///
    /// Fails with `Alignment` if no series is supplied or the shared index
    /// would be empty, and with `DuplicateMetric` if two inputs (or an input
    /// and a YoY column) share a name.
    pub fn integrate(&self, sources: Vec<MonthlySeries>) -> Result<Panel, IntegrationError> {
        let mut names = BTreeSet::new();
        for s in &sources {
            if !names.insert(s.name().to_string()) {
                return Err(IntegrationError::DuplicateMetric(s.name().to_string()));
            }
        }

        let sources: Vec<MonthlySeries> = match self.options.gap_fill {
            GapFill::None => sources,
            GapFill::LinearInterior => sources.iter().map(fill_interior_linear).collect(),
        };

        let (start, end) = self.shared_range(&sources)?;
        let len = (start.months_until(end) + 1) as usize;

        let mut series = BTreeMap::new();
        let mut derived = BTreeSet::new();
        for source in &sources {
            if self.options.wants_yoy(source.name()) {
                let yoy = year_over_year(source);
                let yoy_name = yoy.name().to_string();
                if names.contains(&yoy_name) {
                    return Err(IntegrationError::DuplicateMetric(yoy_name));
                }
                series.insert(yoy_name.clone(), yoy.reindex(start, len));
                derived.insert(yoy_name);
            }
            series.insert(source.name().to_string(), source.reindex(start, len));
        }

        info!(
            start = %start,
            end = %end,
            months = len,
            sources = sources.len(),
            yoy_columns = derived.len(),
            policy = ?self.options.index_policy,
            "integrated monthly panel"
        );

        Ok(Panel::assemble(
            YearMonth::range_inclusive(start, end),
            series,
            derived,
        ))
    }

    /// Shared `(start, end)` months after applying the policy and window.
    fn shared_range(
        &self,
        sources: &[MonthlySeries],
    ) -> Result<(YearMonth, YearMonth), IntegrationError> {
        let metric_names = || sources.iter().map(|s| s.name().to_string()).collect::<Vec<_>>();

        if sources.is_empty() {
            return Err(IntegrationError::Alignment {
                metrics: Vec::new(),
                detail: "no series supplied".into(),
            });
        }

        let mut ranges = Vec::with_capacity(sources.len());
        for s in sources {
            match s.observed_range() {
                Some(r) => ranges.push(r),
                None if self.options.index_policy == IndexPolicy::Intersection => {
                    return Err(IntegrationError::Alignment {
                        metrics: metric_names(),
                        detail: format!("'{}' has no observations", s.name()),
                    });
                }
                None => {}
            }
        }

        let combined = match self.options.index_policy {
            IndexPolicy::Intersection => ranges
                .iter()
                .copied()
                .reduce(|(s1, e1), (s2, e2)| (s1.max(s2), e1.min(e2))),
            IndexPolicy::Union => ranges
                .iter()
                .copied()
                .reduce(|(s1, e1), (s2, e2)| (s1.min(s2), e1.max(e2))),
        };
        let Some((mut start, mut end)) = combined else {
            return Err(IntegrationError::Alignment {
                metrics: metric_names(),
                detail: "no series has observations".into(),
            });
        };

        if let Some(ws) = self.options.window_start {
            start = start.max(ws);
        }
        if let Some(we) = self.options.window_end {
            end = end.min(we);
        }
        if start > end {
            let spans: Vec<String> = sources
                .iter()
                .filter_map(|s| s.observed_range().map(|(a, b)| format!("{}: {a}..{b}", s.name())))
                .collect();
            return Err(IntegrationError::Alignment {
                metrics: metric_names(),
                detail: format!(
                    "ranges do not overlap within window {}..{} ({})",
                    self.options
                        .window_start
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "*".into()),
                    self.options
                        .window_end
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "*".into()),
                    spans.join("; ")
                ),
            });
        }
        Ok((start, end))
    }
}

/// `(v[t] - v[t-12]) / v[t-12] * 100`, missing when either month is missing
/// or the base is zero. The first twelve months of any series are missing.
pub fn year_over_year(series: &MonthlySeries) -> MonthlySeries {
    let name = format!("{}{YOY_SUFFIX}", series.name());
    let Some(start) = series.start() else {
        return MonthlySeries::empty(name);
    };
    let slots = series.slots();
    let values = (0..slots.len())
        .map(|t| {
            let prev = slots.get(t.checked_sub(12)?).copied().flatten()?;
            let cur = slots[t]?;
            (prev != 0.0).then(|| (cur - prev) / prev * 100.0)
        })
        .collect();
    MonthlySeries::from_slots(name, start, values)
}

/// Linear interpolation of `None` slots strictly between two observed months.
pub fn fill_interior_linear(series: &MonthlySeries) -> MonthlySeries {
    let Some(start) = series.start() else {
        return series.clone();
    };
    let mut values = series.slots().to_vec();
    let mut last_seen: Option<usize> = None;
    for i in 0..values.len() {
        let Some(right) = values[i] else {
            continue;
        };
        if let Some(l) = last_seen {
            if i - l > 1 {
                let left = values[l].unwrap_or(right);
                let span = (i - l) as f64;
                for (k, slot) in values.iter_mut().enumerate().take(i).skip(l + 1) {
                    let frac = (k - l) as f64 / span;
                    *slot = Some(left + (right - left) * frac);
                }
            }
        }
        last_seen = Some(i);
    }
    MonthlySeries::from_slots(series.name(), start, values)
}
