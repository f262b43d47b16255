//! The analysis study over a built panel.
//!
//! Derived metrics (gender gap, misery index, rolling correlations) are added
//! first so the engines can use them like any source metric. Chain scans and
//! break tests are independent and run in parallel; each failure stays inside
//! its own combination and is reported rather than aborting the study.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use pricewave_core::analysis::{
    describe_panel, gender_gap, misery_index, regress, rolling_correlation, summarize_gap,
    BreakTest, DescriptiveStats, GapSummary, LagCorrelationEngine, LagScan, SensitivityFit,
    StructuralBreakTester,
};
use pricewave_core::domain::{MonthlySeries, YearMonth};
use pricewave_core::panel::Panel;
use pricewave_core::{AnalysisError, Scope};

use crate::config::{ChainLink, ConfigHash, StudyConfig};

/// Version of the persisted `StudyReport` layout.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainResult {
    pub label: String,
    pub leader: String,
    pub follower: String,
    pub scan: Result<LagScan, AnalysisError>,
}

impl ChainResult {
    pub fn best_lag(&self) -> Option<usize> {
        self.scan.as_ref().ok()?.best().map(|r| r.lag)
    }
}

/// Whether a derived metric made it into the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedOutcome {
    pub metric: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyReport {
    pub schema_version: u32,
    pub config_hash: ConfigHash,
    pub panel_fingerprint: String,
    pub start: YearMonth,
    pub end: YearMonth,
    pub months: usize,
    pub descriptive: Vec<DescriptiveStats>,
    pub chains: Vec<ChainResult>,
    pub breaks: Vec<Result<BreakTest, AnalysisError>>,
    pub regressions: Vec<Result<SensitivityFit, AnalysisError>>,
    pub gender_gap: Option<GapSummary>,
    pub derived: Vec<DerivedOutcome>,
}

impl StudyReport {
    /// Every per-combination failure in the report, in report order.
    pub fn failures(&self) -> Vec<&AnalysisError> {
        let chains = self.chains.iter().flat_map(|c| match &c.scan {
            Ok(scan) => scan.failures().collect::<Vec<_>>(),
            Err(e) => vec![e],
        });
        let breaks = self.breaks.iter().flat_map(|b| match b {
            Ok(test) => [&test.pre, &test.post]
                .into_iter()
                .filter_map(|p| p.as_ref().err())
                .collect::<Vec<_>>(),
            Err(e) => vec![e],
        });
        let regressions = self.regressions.iter().filter_map(|r| r.as_ref().err());
        chains.chain(breaks).chain(regressions).collect()
    }
}

/// Panel after derived metrics were added, plus the study results.
#[derive(Debug, Clone)]
pub struct StudyOutput {
    pub panel: Panel,
    pub report: StudyReport,
}

fn add_derived(
    panel: Panel,
    name: &str,
    build: impl FnOnce(&Panel) -> Result<MonthlySeries, AnalysisError>,
    outcomes: &mut Vec<DerivedOutcome>,
) -> Panel {
    let result = build(&panel)
        .map_err(|e| e.to_string())
        .and_then(|series| panel.with_metric(series).map_err(|e| e.to_string()));
    match result {
        Ok(next) => {
            outcomes.push(DerivedOutcome {
                metric: name.to_string(),
                error: None,
            });
            next
        }
        Err(err) => {
            warn!(
                metric = name,
                scope = %Scope::Whole,
                error = err.as_str(),
                "derived metric skipped"
            );
            outcomes.push(DerivedOutcome {
                metric: name.to_string(),
                error: Some(err),
            });
            panel
        }
    }
}

fn scan_chain(engine: &LagCorrelationEngine, panel: &Panel, link: &ChainLink) -> ChainResult {
    let scan = engine.scan(panel, &link.leader, &link.follower);
    match &scan {
        Ok(scan) => {
            for failure in scan.failures() {
                warn!(chain = link.label.as_str(), error = %failure, "lag skipped");
            }
        }
        Err(e) => warn!(chain = link.label.as_str(), error = %e, "chain link skipped"),
    }
    ChainResult {
        label: link.label.clone(),
        leader: link.leader.clone(),
        follower: link.follower.clone(),
        scan,
    }
}

/// Add derived metrics, then run every configured analysis over `panel`.
pub fn run_study(panel: Panel, config: &StudyConfig) -> StudyOutput {
    let mut derived = Vec::new();
    let mut panel = panel;

    if let Some(gap) = &config.gender_gap {
        panel = add_derived(
            panel,
            &gap.output,
            |p| Ok(gender_gap(gap.output.as_str(), p.get(&gap.female)?, p.get(&gap.male)?)),
            &mut derived,
        );
    }
    if let Some(misery) = &config.misery {
        panel = add_derived(
            panel,
            &misery.output,
            |p| {
                Ok(misery_index(
                    misery.output.as_str(),
                    p.get(&misery.unemployment)?,
                    p.get(&misery.inflation)?,
                ))
            },
            &mut derived,
        );
    }
    for pair in &config.break_pairs {
        let name = format!("rolling_corr_{}_{}", pair.a, pair.b);
        panel = add_derived(
            panel,
            &name,
            |p| rolling_correlation(p, &pair.a, &pair.b, config.breaks.rolling_window),
            &mut derived,
        );
    }

    let engine = LagCorrelationEngine::new(config.lag);
    let tester = StructuralBreakTester::new(config.breaks.tester_config());

    let chains: Vec<ChainResult> = config
        .chains
        .par_iter()
        .map(|link| scan_chain(&engine, &panel, link))
        .collect();
    let breaks: Vec<Result<BreakTest, AnalysisError>> = config
        .break_pairs
        .par_iter()
        .map(|pair| tester.test(&panel, &pair.a, &pair.b))
        .collect();
    for err in breaks.iter().filter_map(|b| b.as_ref().err()) {
        warn!(error = %err, "break test skipped");
    }
    let regressions: Vec<Result<SensitivityFit, AnalysisError>> = config
        .regressions
        .iter()
        .map(|spec| regress(&panel, &spec.x, &spec.y, config.regression))
        .collect();

    let gender_gap = config
        .gender_gap
        .as_ref()
        .and_then(|g| panel.get(&g.output).ok())
        .and_then(summarize_gap);

    let report = StudyReport {
        schema_version: SCHEMA_VERSION,
        config_hash: config.config_hash(),
        panel_fingerprint: panel.fingerprint(),
        start: panel.start(),
        end: panel.end(),
        months: panel.len(),
        descriptive: describe_panel(&panel),
        chains,
        breaks,
        regressions,
        gender_gap,
        derived,
    };
    info!(
        chains = report.chains.len(),
        breaks = report.breaks.len(),
        failures = report.failures().len(),
        "study complete"
    );
    StudyOutput { panel, report }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricewave_core::panel::PanelIntegrator;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    fn series(name: &str, values: impl Iterator<Item = f64>) -> MonthlySeries {
        let start = ym("2018-01");
        MonthlySeries::from_points(
            name,
            values
                .enumerate()
                .map(|(i, v)| (start.offset(i as i64), v)),
        )
    }

    fn study_panel() -> Panel {
        let n = 48;
        PanelIntegrator::default()
            .integrate(vec![
                series("cpi_total", (0..n).map(|i| 100.0 + i as f64 + (i % 3) as f64)),
                series("gas_price", (0..n).map(|i| 2.0 + ((i * 7) % 11) as f64 * 0.1)),
                series("oil_price", (0..n).map(|i| 50.0 + ((i * 5) % 13) as f64)),
                series("unemployment_total", (0..n).map(|i| 4.0 + (i % 4) as f64 * 0.2)),
                series("unemployment_women", (0..n).map(|i| 4.5 + (i % 5) as f64 * 0.1)),
                series("unemployment_men", (0..n).map(|_| 4.0)),
            ])
            .unwrap()
    }

    #[test]
    fn derived_metrics_join_the_panel() {
        let out = run_study(study_panel(), &StudyConfig::default());
        assert!(out.panel.contains("gender_gap"));
        assert!(out.panel.contains("misery_index"));
        assert!(out.panel.contains("rolling_corr_gas_price_cpi_total_yoy"));
        assert!(out.report.derived.iter().all(|d| d.error.is_none()));
        assert!(out.report.gender_gap.is_some());
    }

    #[test]
    fn missing_metrics_are_reported_not_fatal() {
        // no fear_index or diesel_price in the panel
        let out = run_study(study_panel(), &StudyConfig::default());
        let fear_link = out
            .report
            .chains
            .iter()
            .find(|c| c.follower == "fear_index")
            .unwrap();
        assert_eq!(
            fear_link.scan,
            Err(AnalysisError::UnknownMetric("fear_index".into()))
        );
        let energy_link = &out.report.chains[0];
        assert!(energy_link.scan.is_ok());
        assert!(!out.report.failures().is_empty());
    }

    #[test]
    fn chains_keep_configuration_order() {
        let config = StudyConfig::default();
        let out = run_study(study_panel(), &config);
        let labels: Vec<&str> = out.report.chains.iter().map(|c| c.label.as_str()).collect();
        let expected: Vec<&str> = config.chains.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn report_is_stamped_with_schema_and_hashes() {
        let config = StudyConfig::default();
        let out = run_study(study_panel(), &config);
        assert_eq!(out.report.schema_version, SCHEMA_VERSION);
        assert_eq!(out.report.config_hash, config.config_hash());
        assert_eq!(out.report.panel_fingerprint, out.panel.fingerprint());
        assert_eq!(out.report.regressions.len(), 1);
    }
}
