//! LagCorrelationEngine — lead-lag Pearson scan between two panel metrics.
//!
//! At lag `k` the leader's value in month `t - k` is paired with the
//! follower's value in month `t`; only months where both are present count.
//! Lags run from 0 through `max_lag` inclusive.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::stats::{paired_lagged, pearson};
use crate::domain::MonthlySeries;
use crate::error::{AnalysisError, Scope};
use crate::panel::Panel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LagConfig {
    pub max_lag: usize,
    /// Minimum paired months required at each lag.
    pub min_pairs: usize,
}

impl Default for LagConfig {
    fn default() -> Self {
        Self {
            max_lag: 6,
            min_pairs: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagResult {
    pub series_a: String,
    pub series_b: String,
    pub lag: usize,
    pub correlation: f64,
    /// Paired months behind the coefficient.
    pub pairs: usize,
}

/// Every lag of one pair, failures included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagScan {
    pub series_a: String,
    pub series_b: String,
    /// One entry per lag, in lag order.
    pub lags: Vec<Result<LagResult, AnalysisError>>,
}

impl LagScan {
    /// Lag with maximal |r|; ties go to the smallest lag.
    pub fn best(&self) -> Option<&LagResult> {
        let mut best: Option<&LagResult> = None;
        for r in self.successes() {
            match best {
                Some(b) if r.correlation.abs() <= b.correlation.abs() => {}
                _ => best = Some(r),
            }
        }
        best
    }

    pub fn successes(&self) -> impl Iterator<Item = &LagResult> {
        self.lags.iter().filter_map(|r| r.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &AnalysisError> {
        self.lags.iter().filter_map(|r| r.as_ref().err())
    }

    /// Coefficient at `lag`, if that lag succeeded.
    pub fn correlation_at(&self, lag: usize) -> Option<f64> {
        self.successes()
            .find(|r| r.lag == lag)
            .map(|r| r.correlation)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LagCorrelationEngine {
    config: LagConfig,
}

impl LagCorrelationEngine {
    pub fn new(config: LagConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LagConfig {
        &self.config
    }

    /// Scan `leader` against `follower` from the panel.
    ///
    /// Only an unknown metric fails the whole scan; everything else is
    /// reported per lag.
    pub fn scan(
        &self,
        panel: &Panel,
        leader: &str,
        follower: &str,
    ) -> Result<LagScan, AnalysisError> {
        let a = panel.get(leader)?;
        let b = panel.get(follower)?;
        Ok(self.scan_series(a, b))
    }

    pub fn scan_series(&self, a: &MonthlySeries, b: &MonthlySeries) -> LagScan {
        let lags: Vec<_> = (0..=self.config.max_lag)
            .map(|lag| self.correlate_at(a, b, lag))
            .collect();
        let scan = LagScan {
            series_a: a.name().to_string(),
            series_b: b.name().to_string(),
            lags,
        };
        debug!(
            series_a = a.name(),
            series_b = b.name(),
            ok = scan.successes().count(),
            failed = scan.failures().count(),
            best_lag = scan.best().map(|r| r.lag),
            "lag scan complete"
        );
        scan
    }

    fn correlate_at(
        &self,
        a: &MonthlySeries,
        b: &MonthlySeries,
        lag: usize,
    ) -> Result<LagResult, AnalysisError> {
        let pairs = paired_lagged(a, b, lag);
        let required = self.config.min_pairs.max(2);
        if pairs.len() < required {
            return Err(AnalysisError::InsufficientData {
                series_a: a.name().to_string(),
                series_b: b.name().to_string(),
                scope: Scope::Lag { lag },
                available: pairs.len(),
                required,
            });
        }
        let correlation = pearson(&pairs).ok_or_else(|| AnalysisError::ZeroVariance {
            series_a: a.name().to_string(),
            series_b: b.name().to_string(),
            scope: Scope::Lag { lag },
        })?;
        Ok(LagResult {
            series_a: a.name().to_string(),
            series_b: b.name().to_string(),
            lag,
            correlation,
            pairs: pairs.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::YearMonth;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    fn series(name: &str, values: &[Option<f64>]) -> MonthlySeries {
        MonthlySeries::from_slots(name, ym("2016-01"), values.to_vec())
    }

    fn zigzag(n: usize) -> Vec<Option<f64>> {
        // deterministic, non-periodic within the scanned lags
        (0..n)
            .map(|i| Some(((i * i * 7 + i * 3) % 17) as f64))
            .collect()
    }

    #[test]
    fn scans_every_lag_inclusive() {
        let a = series("a", &zigzag(40));
        let b = series("b", &zigzag(40));
        let scan = LagCorrelationEngine::default().scan_series(&a, &b);
        assert_eq!(scan.lags.len(), 7);
        assert!((scan.correlation_at(0).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(scan.best().unwrap().lag, 0);
    }

    #[test]
    fn leader_shifted_by_two_peaks_at_two() {
        let base = zigzag(60);
        let mut shifted = vec![None, None];
        shifted.extend_from_slice(&base[..58]);
        let a = series("a", &base);
        let b = series("b", &shifted);
        let scan = LagCorrelationEngine::default().scan_series(&a, &b);
        let best = scan.best().unwrap();
        assert_eq!(best.lag, 2);
        assert!((best.correlation - 1.0).abs() < 1e-12);
        assert_eq!(best.pairs, 58);
    }

    #[test]
    fn short_overlap_fails_per_lag_with_counts() {
        let a = series("a", &zigzag(14));
        let b = series("b", &zigzag(14));
        let scan = LagCorrelationEngine::default().scan_series(&a, &b);
        // lags 0..=2 have 14, 13, 12 pairs; lag 3 has 11
        assert!(scan.lags[2].is_ok());
        match &scan.lags[3] {
            Err(AnalysisError::InsufficientData {
                scope,
                available,
                required,
                ..
            }) => {
                assert_eq!(*scope, Scope::Lag { lag: 3 });
                assert_eq!(*available, 11);
                assert_eq!(*required, 12);
            }
            other => panic!("expected insufficient data, got {other:?}"),
        }
    }

    #[test]
    fn missing_months_are_excluded_from_pairs() {
        let mut values = zigzag(30);
        values[5] = None;
        values[6] = None;
        let a = series("a", &values);
        let b = series("b", &zigzag(30));
        let scan = LagCorrelationEngine::default().scan_series(&a, &b);
        assert_eq!(scan.lags[0].as_ref().unwrap().pairs, 28);
    }

    #[test]
    fn constant_series_reports_zero_variance() {
        let a = series("a", &vec![Some(1.0); 20]);
        let b = series("b", &zigzag(20));
        let scan = LagCorrelationEngine::default().scan_series(&a, &b);
        assert!(matches!(scan.lags[0], Err(AnalysisError::ZeroVariance { .. })));
        assert!(scan.best().is_none());
    }

    #[test]
    fn ties_resolve_to_smallest_lag() {
        let scan = LagScan {
            series_a: "a".into(),
            series_b: "b".into(),
            lags: [0.5, -0.8, 0.8, 0.1]
                .iter()
                .enumerate()
                .map(|(lag, r)| {
                    Ok(LagResult {
                        series_a: "a".into(),
                        series_b: "b".into(),
                        lag,
                        correlation: *r,
                        pairs: 20,
                    })
                })
                .collect(),
        };
        assert_eq!(scan.best().unwrap().lag, 1);
    }

    #[test]
    fn unknown_metric_fails_scan() {
        let panel = Panel::from_columns(
            YearMonth::range_inclusive(ym("2016-01"), ym("2016-02")),
            vec![("a".into(), vec![Some(1.0), Some(2.0)])],
            &[],
        )
        .unwrap();
        let err = LagCorrelationEngine::default()
            .scan(&panel, "a", "missing")
            .unwrap_err();
        assert_eq!(err, AnalysisError::UnknownMetric("missing".into()));
    }
}
