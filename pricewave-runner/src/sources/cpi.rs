//! BLS time-series JSON: `Results.series[].data[]` with one entry per period.
//!
//! Only monthly periods `M01`..`M12` are kept; the annual average `M13` and
//! any other period code is skipped. Series ids without a configured metric
//! name are skipped with a warning.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use pricewave_core::domain::{MonthlySeries, RawObservation};
use pricewave_core::normalize::{AggregationRule, SeriesNormalizer};

use super::{Scalar, SourceError};

#[derive(Debug, Deserialize)]
struct BlsResponse {
    #[serde(rename = "Results")]
    results: BlsResults,
}

#[derive(Debug, Deserialize)]
struct BlsResults {
    #[serde(default)]
    series: Vec<BlsSeries>,
}

#[derive(Debug, Deserialize)]
struct BlsSeries {
    #[serde(rename = "seriesID")]
    series_id: String,
    #[serde(default)]
    data: Vec<BlsPoint>,
}

#[derive(Debug, Deserialize)]
struct BlsPoint {
    year: Scalar,
    period: String,
    value: Scalar,
}

impl BlsPoint {
    /// First-of-month date for a monthly period, `None` for anything else.
    fn date(&self) -> Option<NaiveDate> {
        let month: u32 = self.period.strip_prefix('M')?.parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        let year: i32 = self.year.as_text().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, 1)
    }
}

/// Decode a BLS response into one monthly series per mapped series id.
///
/// `series` maps BLS ids to metric names. Output is in metric-name order.
pub fn decode_cpi(
    path: &Path,
    content: &str,
    series: &BTreeMap<String, String>,
    rule: AggregationRule,
) -> Result<Vec<MonthlySeries>, SourceError> {
    let response: BlsResponse =
        serde_json::from_str(content).map_err(|source| SourceError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let normalizer = SeriesNormalizer::new(rule);
    let mut by_metric: BTreeMap<&str, Vec<RawObservation>> = BTreeMap::new();
    for s in &response.results.series {
        let Some(metric) = series.get(&s.series_id) else {
            warn!(
                series_id = s.series_id.as_str(),
                path = %path.display(),
                "unmapped CPI series skipped"
            );
            continue;
        };
        let observations = by_metric.entry(metric.as_str()).or_default();
        let mut skipped = 0usize;
        for point in &s.data {
            match (point.date(), point.value.as_f64()) {
                (Some(date), Some(value)) => {
                    observations.push(RawObservation::new(date, value, s.series_id.as_str()))
                }
                _ => skipped += 1,
            }
        }
        debug!(
            series_id = s.series_id.as_str(),
            metric,
            points = s.data.len(),
            skipped,
            "decoded CPI series"
        );
    }

    if by_metric.is_empty() {
        return Err(SourceError::format(
            path,
            "no configured CPI series id present in response",
        ));
    }

    Ok(by_metric
        .into_iter()
        .map(|(metric, obs)| normalizer.normalize(metric, &obs))
        .collect())
}
