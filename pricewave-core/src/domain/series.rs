//! MonthlySeries — one named metric on a contiguous monthly calendar.
//!
//! Storage is a start month plus one slot per consecutive month, so keys are
//! strictly increasing and duplicate-free by construction. A month inside the
//! range with no reading is an explicit `None`; nothing is zero-filled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::YearMonth;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySeries {
    name: String,
    start: Option<YearMonth>,
    values: Vec<Option<f64>>,
}

impl MonthlySeries {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: None,
            values: Vec::new(),
        }
    }

    /// Build from sparse `(month, value)` points.
    ///
    /// The resulting range spans the first to the last finite point; months
    /// in between without a point become `None`. Non-finite values are
    /// treated as absent. If a month appears twice the later point wins.
    pub fn from_points<I>(name: impl Into<String>, points: I) -> Self
    where
        I: IntoIterator<Item = (YearMonth, f64)>,
    {
        let map: BTreeMap<YearMonth, f64> = points
            .into_iter()
            .filter(|(_, v)| v.is_finite())
            .collect();
        let name = name.into();

        let (Some(first), Some(last)) = (map.keys().next().copied(), map.keys().last().copied())
        else {
            return Self::empty(name);
        };

        let values = YearMonth::range_inclusive(first, last)
            .into_iter()
            .map(|m| map.get(&m).copied())
            .collect();

        Self {
            name,
            start: Some(first),
            values,
        }
    }

    /// Build from an already-contiguous slot vector starting at `start`.
    ///
    /// Non-finite slots are normalized to `None`. Edge slots may be `None`
    /// (used for series reindexed onto a shared calendar).
    pub fn from_slots(name: impl Into<String>, start: YearMonth, values: Vec<Option<f64>>) -> Self {
        let values: Vec<Option<f64>> = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        Self {
            name: name.into(),
            start: if values.is_empty() { None } else { Some(start) },
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn start(&self) -> Option<YearMonth> {
        self.start
    }

    pub fn end(&self) -> Option<YearMonth> {
        self.start.map(|s| s.offset(self.values.len() as i64 - 1))
    }

    /// Number of month slots, present or missing.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of months holding a value.
    pub fn observed_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn slots(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Value for `month`; `None` when missing or outside the range.
    pub fn get(&self, month: YearMonth) -> Option<f64> {
        let start = self.start?;
        let idx = start.months_until(month);
        if idx < 0 {
            return None;
        }
        self.values.get(idx as usize).copied().flatten()
    }

    /// Every slot with its month, in calendar order.
    pub fn iter(&self) -> impl Iterator<Item = (YearMonth, Option<f64>)> + '_ {
        let start = self.start;
        self.values
            .iter()
            .enumerate()
            .filter_map(move |(i, v)| start.map(|s| (s.offset(i as i64), *v)))
    }

    /// Only the months holding a value.
    pub fn observed(&self) -> impl Iterator<Item = (YearMonth, f64)> + '_ {
        self.iter().filter_map(|(m, v)| v.map(|x| (m, x)))
    }

    pub fn observed_values(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }

    /// First and last months holding a value.
    pub fn observed_range(&self) -> Option<(YearMonth, YearMonth)> {
        let first = self.observed().next()?.0;
        let last = self.observed().last()?.0;
        Some((first, last))
    }

    /// Project onto the contiguous calendar `start..start+len`.
    ///
    /// Months the series does not cover are `None`; values never move.
    pub fn reindex(&self, start: YearMonth, len: usize) -> Self {
        let values = (0..len)
            .map(|i| self.get(start.offset(i as i64)))
            .collect();
        Self::from_slots(self.name.clone(), start, values)
    }

    /// Apply `f` to every present value, keeping missing slots missing.
    pub fn map_values(&self, name: impl Into<String>, f: impl Fn(f64) -> f64) -> Self {
        let values = self.values.iter().map(|v| v.map(&f)).collect();
        match self.start {
            Some(start) => Self::from_slots(name, start, values),
            None => Self::empty(name),
        }
    }
}
