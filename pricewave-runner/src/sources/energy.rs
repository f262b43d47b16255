//! EIA weekly price tables delivered as a JSON list of lists.
//!
//! Each row starts with a label naming the month (`"2023-Oct"`, `"Oct-2023"`,
//! `"2023-10"` or a bare year) followed by `("MM/DD", "price")` pairs. Blank
//! cells and a trailing unpaired cell are skipped. Readings are then
//! resampled to one value per month.

use std::path::Path;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use pricewave_core::domain::{MonthlySeries, RawObservation};
use pricewave_core::normalize::{AggregationRule, SeriesNormalizer};

use super::SourceError;

const MONTH_ABBREV: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Year and, when the label carries one, month of a row label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowLabel {
    year: i32,
    month: Option<u32>,
}

fn parse_month_token(token: &str) -> Option<u32> {
    let lower = token.trim().to_ascii_lowercase();
    if let Ok(n) = lower.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    MONTH_ABBREV
        .iter()
        .position(|m| lower.starts_with(m))
        .map(|i| i as u32 + 1)
}

fn parse_year_token(token: &str) -> Option<i32> {
    let t = token.trim();
    (t.len() == 4)
        .then(|| t.parse::<i32>().ok())
        .flatten()
}

fn parse_label(raw: &str) -> Option<RowLabel> {
    let raw = raw.trim();
    if let Some(year) = parse_year_token(raw) {
        return Some(RowLabel { year, month: None });
    }
    let (left, right) = raw.split_once(&['-', ' ', '/'][..])?;
    if let (Some(year), Some(month)) = (parse_year_token(left), parse_month_token(right)) {
        return Some(RowLabel {
            year,
            month: Some(month),
        });
    }
    if let (Some(month), Some(year)) = (parse_month_token(left), parse_year_token(right)) {
        return Some(RowLabel {
            year,
            month: Some(month),
        });
    }
    None
}

/// Date of one `"MM/DD"` cell under `label`.
///
/// A week listed under December whose date falls in January belongs to the
/// following year.
fn pair_date(label: RowLabel, cell: &str) -> Option<NaiveDate> {
    let (m, d) = cell.trim().split_once(&['/', '-'][..])?;
    let month: u32 = m.trim().parse().ok()?;
    let day: u32 = d.trim().parse().ok()?;
    let year = match label.month {
        Some(header) if month < header => label.year + 1,
        _ => label.year,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn cell_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode one energy table into a monthly series named `metric`.
pub fn decode_energy(
    path: &Path,
    content: &str,
    metric: &str,
    rule: AggregationRule,
) -> Result<MonthlySeries, SourceError> {
    let rows: Vec<Value> = serde_json::from_str(content).map_err(|source| SourceError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let mut observations = Vec::new();
    let mut unlabeled = 0usize;
    let mut bad_pairs = 0usize;
    for row in &rows {
        let Some(cells) = row.as_array() else {
            unlabeled += 1;
            continue;
        };
        let Some(label) = cells
            .first()
            .and_then(cell_text)
            .and_then(|s| parse_label(&s))
        else {
            unlabeled += 1;
            continue;
        };
        for pair in cells[1..].chunks_exact(2) {
            let reading = cell_text(&pair[0])
                .and_then(|d| pair_date(label, &d))
                .zip(cell_text(&pair[1]).and_then(|p| p.parse::<f64>().ok()));
            match reading {
                Some((date, price)) => observations.push(RawObservation::new(date, price, metric)),
                None => bad_pairs += 1,
            }
        }
    }

    if observations.is_empty() {
        return Err(SourceError::format(path, "no dated price readings found"));
    }
    debug!(
        metric,
        rows = rows.len(),
        readings = observations.len(),
        unlabeled,
        bad_pairs,
        "decoded energy table"
    );
    Ok(SeriesNormalizer::new(rule).normalize(metric, &observations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricewave_core::YearMonth;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[test]
    fn labels_in_several_layouts() {
        assert_eq!(
            parse_label("2023-Oct"),
            Some(RowLabel { year: 2023, month: Some(10) })
        );
        assert_eq!(
            parse_label("Oct-2023"),
            Some(RowLabel { year: 2023, month: Some(10) })
        );
        assert_eq!(
            parse_label("2023-10"),
            Some(RowLabel { year: 2023, month: Some(10) })
        );
        assert_eq!(parse_label("2023"), Some(RowLabel { year: 2023, month: None }));
        assert_eq!(parse_label("Weekly"), None);
    }

    #[test]
    fn weekly_pairs_average_per_month() {
        let body = r#"[
            ["Year-Month", "Week 1", "", "Week 2", ""],
            ["2023-Oct", "10/02", "3.80", "10/09", "3.60", "10/16"],
            ["2023-Nov", "11/06", "3.40", "", ""]
        ]"#;
        let s = decode_energy(Path::new("gas.json"), body, "gas_price", AggregationRule::Mean)
            .unwrap();
        assert_eq!(s.name(), "gas_price");
        assert!((s.get(ym("2023-10")).unwrap() - 3.7).abs() < 1e-12);
        assert_eq!(s.get(ym("2023-11")), Some(3.4));
    }

    #[test]
    fn january_week_under_december_rolls_into_next_year() {
        let body = r#"[["2022-Dec", "12/26", "3.10", "01/02", "3.30"]]"#;
        let s = decode_energy(Path::new("gas.json"), body, "gas_price", AggregationRule::Mean)
            .unwrap();
        assert_eq!(s.get(ym("2022-12")), Some(3.1));
        assert_eq!(s.get(ym("2023-01")), Some(3.3));
    }

    #[test]
    fn numeric_price_cells_are_accepted() {
        let body = r#"[["2021-Mar", "03/01", 2.75]]"#;
        let s = decode_energy(Path::new("oil.json"), body, "oil_price", AggregationRule::Mean)
            .unwrap();
        assert_eq!(s.get(ym("2021-03")), Some(2.75));
    }

    #[test]
    fn table_without_readings_is_a_format_error() {
        let err = decode_energy(
            Path::new("gas.json"),
            r#"[["header"], []]"#,
            "gas_price",
            AggregationRule::Mean,
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::Format { .. }));
    }
}
