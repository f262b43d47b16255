//! MatrixMelter — year-by-month wide tables into a long monthly series.
//!
//! The wide table is first validated into a [`YearMonthGrid`], whose rows are
//! fixed-size `[Cell; 12]` arrays. Shape and header problems are rejected at
//! that boundary; melting a grid cannot fail.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{MonthlySeries, YearMonth};
use crate::error::IntegrationError;

pub const MONTHS_PER_YEAR: usize = 12;

const MONTH_NAMES: [&str; MONTHS_PER_YEAR] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Summary columns that may trail the month columns and are not months.
const AGGREGATE_HEADERS: [&str; 5] = ["annual", "annual avg", "avg", "half1", "half2"];

/// One cell of the wide table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Value(f64),
    /// Empty, or a dash meaning "not reported".
    Blank,
    /// Non-numeric text kept for diagnostics.
    Placeholder(String),
}

impl Cell {
    /// Parse a raw cell. A trailing preliminary marker such as `"3.9(P)"`
    /// is stripped; the reading itself is still a published value.
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        if text.is_empty() || text == "-" || text == "--" || text == "—" {
            return Cell::Blank;
        }
        let numeric = match text.find('(') {
            Some(idx) if text.ends_with(')') => text[..idx].trim(),
            _ => text,
        };
        match numeric.parse::<f64>() {
            Ok(v) if v.is_finite() => Cell::Value(v),
            _ => Cell::Placeholder(text.to_string()),
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Cell::Value(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderKind {
    Month(usize),
    Aggregate,
}

fn classify_header(raw: &str) -> Option<HeaderKind> {
    let h = raw.trim().to_ascii_lowercase();
    if AGGREGATE_HEADERS.contains(&h.as_str()) {
        return Some(HeaderKind::Aggregate);
    }
    // "M01".."M12" as used by BLS period codes
    if let Some(code) = h.strip_prefix('m') {
        if let Ok(n) = code.parse::<usize>() {
            return (1..=MONTHS_PER_YEAR)
                .contains(&n)
                .then_some(HeaderKind::Month(n - 1));
        }
    }
    if let Ok(n) = h.parse::<usize>() {
        return (1..=MONTHS_PER_YEAR)
            .contains(&n)
            .then_some(HeaderKind::Month(n - 1));
    }
    let h = h.trim_end_matches('.');
    if h.len() < 3 {
        return None;
    }
    let mut matches = MONTH_NAMES
        .iter()
        .enumerate()
        .filter(|(_, name)| name.starts_with(h));
    match (matches.next(), matches.next()) {
        (Some((i, _)), None) => Some(HeaderKind::Month(i)),
        _ => None,
    }
}

/// A validated year x month table: one row per year, exactly twelve cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearMonthGrid {
    metric: String,
    years: Vec<i32>,
    rows: Vec<[Cell; MONTHS_PER_YEAR]>,
}

impl YearMonthGrid {
    /// Validate a raw table.
    ///
    /// `header[0]` must label the year column. The remaining headers must map
    /// one-to-one onto the twelve calendar months; recognised summary columns
    /// (`Annual`, `HALF1`, `HALF2`) are allowed and ignored. Every row must
    /// have exactly `header.len()` cells.
    pub fn from_table(
        metric: &str,
        header: &[String],
        rows: &[Vec<String>],
    ) -> Result<Self, IntegrationError> {
        let header_err = |reason: String| IntegrationError::Header {
            metric: metric.to_string(),
            reason,
        };

        match header.first() {
            Some(h) if h.trim().eq_ignore_ascii_case("year") => {}
            Some(h) => return Err(header_err(format!("first column must be 'Year', found '{h}'"))),
            None => return Err(header_err("table has no header row".into())),
        }

        let mut column_month: Vec<Option<usize>> = Vec::with_capacity(header.len() - 1);
        let mut seen = [false; MONTHS_PER_YEAR];
        for h in &header[1..] {
            match classify_header(h) {
                Some(HeaderKind::Month(m)) => {
                    if seen[m] {
                        return Err(header_err(format!(
                            "header '{h}' maps to {} which already has a column",
                            MONTH_NAMES[m]
                        )));
                    }
                    seen[m] = true;
                    column_month.push(Some(m));
                }
                Some(HeaderKind::Aggregate) => column_month.push(None),
                None => {
                    return Err(header_err(format!(
                        "header '{h}' is not a calendar month"
                    )))
                }
            }
        }
        let month_columns = seen.iter().filter(|s| **s).count();
        if month_columns != MONTHS_PER_YEAR {
            let missing: Vec<&str> = seen
                .iter()
                .enumerate()
                .filter(|(_, s)| !**s)
                .map(|(i, _)| MONTH_NAMES[i])
                .collect();
            return Err(header_err(format!(
                "{month_columns} month columns, expected {MONTHS_PER_YEAR} (missing: {})",
                missing.join(", ")
            )));
        }

        let mut years = Vec::with_capacity(rows.len());
        let mut grid_rows = Vec::with_capacity(rows.len());
        let mut seen_years = BTreeSet::new();
        for (i, row) in rows.iter().enumerate() {
            let label = row.first().map(|s| s.trim().to_string()).unwrap_or_default();
            if row.len() != header.len() {
                return Err(IntegrationError::Shape {
                    metric: metric.to_string(),
                    row: i,
                    year: label,
                    expected: header.len(),
                    found: row.len(),
                });
            }
            let year: i32 = label.parse().map_err(|_| IntegrationError::RowLabel {
                metric: metric.to_string(),
                row: i,
                label: label.clone(),
                reason: "not a four-digit year".into(),
            })?;
            if !seen_years.insert(year) {
                return Err(IntegrationError::RowLabel {
                    metric: metric.to_string(),
                    row: i,
                    label,
                    reason: "year appears on more than one row".into(),
                });
            }

            let mut cells: [Cell; MONTHS_PER_YEAR] = std::array::from_fn(|_| Cell::Blank);
            for (raw, month) in row[1..].iter().zip(&column_month) {
                if let Some(m) = month {
                    cells[*m] = Cell::parse(raw);
                }
            }
            years.push(year);
            grid_rows.push(cells);
        }

        Ok(Self {
            metric: metric.to_string(),
            years,
            rows: grid_rows,
        })
    }

    /// Rebuild a grid from a monthly series (missing months become blank).
    pub fn from_series(series: &MonthlySeries) -> Self {
        let mut years: Vec<i32> = Vec::new();
        let mut rows: Vec<[Cell; MONTHS_PER_YEAR]> = Vec::new();
        for (month, value) in series.iter() {
            if years.last() != Some(&month.year()) {
                years.push(month.year());
                rows.push(std::array::from_fn(|_| Cell::Blank));
            }
            if let (Some(v), Some(row)) = (value, rows.last_mut()) {
                row[month.month() as usize - 1] = Cell::Value(v);
            }
        }
        Self {
            metric: series.name().to_string(),
            years,
            rows,
        }
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn rows(&self) -> &[[Cell; MONTHS_PER_YEAR]] {
        &self.rows
    }

    pub fn cell(&self, year: i32, month: u32) -> Option<&Cell> {
        let row = self.years.iter().position(|y| *y == year)?;
        self.rows[row].get(month.checked_sub(1)? as usize)
    }
}

/// Melts validated grids, optionally ignoring cells after the last
/// reported month.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatrixMelter {
    reported_through: Option<YearMonth>,
}

impl MatrixMelter {
    pub fn new(reported_through: Option<YearMonth>) -> Self {
        Self { reported_through }
    }

    /// Emit one observation per present numeric cell. Blank, placeholder and
    /// not-yet-reported cells leave their month missing.
    pub fn melt(&self, grid: &YearMonthGrid) -> MonthlySeries {
        let mut points = Vec::with_capacity(grid.years.len() * MONTHS_PER_YEAR);
        let mut placeholders = 0usize;
        let mut future = 0usize;

        for (year, row) in grid.years.iter().zip(&grid.rows) {
            for (i, cell) in row.iter().enumerate() {
                let Ok(month) = YearMonth::new(*year, i as u32 + 1) else {
                    continue;
                };
                if self.reported_through.is_some_and(|cutoff| month > cutoff) {
                    future += 1;
                    continue;
                }
                match cell {
                    Cell::Value(v) => points.push((month, *v)),
                    Cell::Placeholder(_) => placeholders += 1,
                    Cell::Blank => {}
                }
            }
        }

        debug!(
            metric = grid.metric.as_str(),
            years = grid.years.len(),
            cells = points.len(),
            placeholders,
            future,
            "melted year x month grid"
        );
        MonthlySeries::from_points(grid.metric.clone(), points)
    }
}
