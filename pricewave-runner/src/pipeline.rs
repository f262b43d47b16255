//! Panel build: decode every configured source file, derive the fear index
//! and integrate the result onto one monthly calendar.
//!
//! Source files are independent, so they are decoded in parallel. The
//! fear index and the integrator only run once every decode has finished.
//! A file that fails to decode is reported and skipped; the build only fails
//! when nothing usable is left or the integrator rejects the inputs.

use std::collections::BTreeSet;
use std::path::PathBuf;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use pricewave_core::domain::{MonthlySeries, YearMonth};
use pricewave_core::normalize::{Article, BatchWindow, TextFearIndexer};
use pricewave_core::panel::{Panel, PanelIntegrator};
use pricewave_core::IntegrationError;

use crate::config::{ConfigHash, CpiSource, EnergySource, LaborSource, StudyConfig};
use crate::sources::{
    decode_cpi, decode_energy, decode_labor, decode_news, read_to_string, ArticleBatch,
    SourceError, SourceKind,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no usable series: {failed} source file(s) failed and nothing else was configured")]
    NoSeries { failed: usize },

    #[error("panel integration failed: {0}")]
    Integration(#[from] IntegrationError),
}

// ─── Jobs ───────────────────────────────────────────────────────────

/// One file to decode.
#[derive(Debug, Clone, Copy)]
enum SourceJob<'a> {
    Cpi(&'a CpiSource),
    Energy(&'a EnergySource),
    Labor(&'a LaborSource),
    News(&'a std::path::Path, BatchWindow),
}

enum Decoded {
    Series(Vec<MonthlySeries>),
    Articles(ArticleBatch),
}

impl<'a> SourceJob<'a> {
    fn kind(&self) -> SourceKind {
        match self {
            SourceJob::Cpi(_) => SourceKind::Cpi,
            SourceJob::Energy(_) => SourceKind::Energy,
            SourceJob::Labor(_) => SourceKind::Labor,
            SourceJob::News(..) => SourceKind::News,
        }
    }

    fn path(&self) -> &'a std::path::Path {
        match *self {
            SourceJob::Cpi(s) => &s.path,
            SourceJob::Energy(s) => &s.path,
            SourceJob::Labor(s) => &s.path,
            SourceJob::News(p, _) => p,
        }
    }

    fn run(&self, config: &StudyConfig) -> Result<Decoded, SourceError> {
        let path = config.resolve(self.path());
        let content = read_to_string(&path)?;
        match self {
            SourceJob::Cpi(s) => {
                decode_cpi(&path, &content, &s.series, s.aggregation).map(Decoded::Series)
            }
            SourceJob::Energy(s) => decode_energy(&path, &content, &s.metric, s.aggregation)
                .map(|series| Decoded::Series(vec![series])),
            SourceJob::Labor(s) => decode_labor(&path, &content, &s.metric, s.reported_through)
                .map(|series| Decoded::Series(vec![series])),
            SourceJob::News(_, batch) => {
                decode_news(&path, &content, *batch).map(Decoded::Articles)
            }
        }
    }
}

fn jobs(config: &StudyConfig) -> Vec<SourceJob<'_>> {
    let sources = &config.sources;
    sources
        .cpi
        .iter()
        .map(SourceJob::Cpi)
        .chain(sources.energy.iter().map(SourceJob::Energy))
        .chain(sources.labor.iter().map(SourceJob::Labor))
        .chain(
            sources
                .news
                .iter()
                .flat_map(|n| n.paths().into_iter().map(move |p| SourceJob::News(p, n.batch))),
        )
        .collect()
}

// ─── Report ─────────────────────────────────────────────────────────

/// Outcome of decoding one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub kind: SourceKind,
    pub path: PathBuf,
    /// Metrics produced (empty for news files and failures).
    pub metrics: Vec<String>,
    pub articles: Option<usize>,
    pub error: Option<String>,
}

impl SourceStatus {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A decoded series left out of the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedMetric {
    pub metric: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FearSummary {
    pub articles_seen: usize,
    pub articles_counted: usize,
    pub duplicates_dropped: usize,
    pub undated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSummary {
    pub start: YearMonth,
    pub end: YearMonth,
    pub months: usize,
    pub metrics: Vec<String>,
    pub derived: Vec<String>,
    pub fingerprint: String,
}

impl PanelSummary {
    pub fn of(panel: &Panel) -> Self {
        Self {
            start: panel.start(),
            end: panel.end(),
            months: panel.len(),
            metrics: panel.metric_names().map(str::to_string).collect(),
            derived: panel.derived_names().map(str::to_string).collect(),
            fingerprint: panel.fingerprint(),
        }
    }
}

/// Everything the build observed, for logging and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub config_hash: ConfigHash,
    pub sources: Vec<SourceStatus>,
    pub dropped: Vec<DroppedMetric>,
    pub fear: Option<FearSummary>,
    pub panel: PanelSummary,
}

impl BuildReport {
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceStatus> {
        self.sources.iter().filter(|s| !s.is_ok())
    }
}

#[derive(Debug, Clone)]
pub struct PanelBuild {
    pub panel: Panel,
    pub report: BuildReport,
}

// ─── Builder ────────────────────────────────────────────────────────

/// Series and statuses gathered from all source files, before integration.
#[derive(Debug, Default)]
pub struct DecodedSources {
    pub series: Vec<MonthlySeries>,
    pub articles: Vec<Article>,
    pub undated: usize,
    pub news_files: usize,
    pub sources: Vec<SourceStatus>,
}

pub struct PanelBuilder<'a> {
    config: &'a StudyConfig,
    parallel: bool,
}

impl<'a> PanelBuilder<'a> {
    pub fn new(config: &'a StudyConfig) -> Self {
        Self {
            config,
            parallel: true,
        }
    }

    /// Enables or disables parallel decoding.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Decode every configured file. Results keep configuration order
    /// regardless of which decode finishes first.
    pub fn decode(&self) -> DecodedSources {
        let jobs = jobs(self.config);
        let outcomes: Vec<Result<Decoded, SourceError>> = if self.parallel {
            jobs.par_iter().map(|job| job.run(self.config)).collect()
        } else {
            jobs.iter().map(|job| job.run(self.config)).collect()
        };

        let mut decoded = DecodedSources::default();
        for (job, outcome) in jobs.iter().zip(outcomes) {
            let mut status = SourceStatus {
                kind: job.kind(),
                path: job.path().to_path_buf(),
                metrics: Vec::new(),
                articles: None,
                error: None,
            };
            match outcome {
                Ok(Decoded::Series(series)) => {
                    status.metrics = series.iter().map(|s| s.name().to_string()).collect();
                    info!(kind = %job.kind(), metrics = ?status.metrics, "source decoded");
                    decoded.series.extend(series);
                }
                Ok(Decoded::Articles(batch)) => {
                    status.articles = Some(batch.articles.len());
                    info!(kind = %job.kind(), articles = batch.articles.len(), "source decoded");
                    decoded.undated += batch.undated;
                    decoded.news_files += 1;
                    decoded.articles.extend(batch.articles);
                }
                Err(err) => {
                    warn!(kind = %job.kind(), error = %err, "source file skipped");
                    status.error = Some(err.to_string());
                }
            }
            decoded.sources.push(status);
        }
        decoded
    }

    /// Decode, index news, drop unusable series and integrate.
    pub fn build(&self) -> Result<PanelBuild, PipelineError> {
        let DecodedSources {
            mut series,
            articles,
            undated,
            news_files,
            sources,
        } = self.decode();

        let fear = (news_files > 0).then(|| {
            let indexer =
                TextFearIndexer::new(self.config.fear.metric.clone(), self.config.keyword_set());
            let index = indexer.index(&articles);
            series.push(index.total);
            if self.config.fear.per_keyword {
                series.extend(index.per_keyword);
            }
            FearSummary {
                articles_seen: articles.len(),
                articles_counted: index.articles_counted,
                duplicates_dropped: index.duplicates_dropped,
                undated,
            }
        });

        let (kept, dropped) = screen_series(series);
        if kept.is_empty() {
            let failed = sources.iter().filter(|s| !s.is_ok()).count();
            return Err(PipelineError::NoSeries { failed });
        }

        let panel = PanelIntegrator::new(self.config.integration_options()).integrate(kept)?;
        let report = BuildReport {
            config_hash: self.config.config_hash(),
            sources,
            dropped,
            fear,
            panel: PanelSummary::of(&panel),
        };
        info!(
            start = %report.panel.start,
            end = %report.panel.end,
            months = report.panel.months,
            metrics = report.panel.metrics.len(),
            failed_sources = report.failed_sources().count(),
            "panel built"
        );
        Ok(PanelBuild { panel, report })
    }
}

/// Drop series with no observations and repeated metric names (first wins).
fn screen_series(series: Vec<MonthlySeries>) -> (Vec<MonthlySeries>, Vec<DroppedMetric>) {
    let mut seen = BTreeSet::new();
    let mut kept = Vec::with_capacity(series.len());
    let mut dropped = Vec::new();
    for s in series {
        let reason = if s.observed_count() == 0 {
            Some("no observations")
        } else if !seen.insert(s.name().to_string()) {
            Some("metric produced by an earlier source")
        } else {
            None
        };
        match reason {
            Some(reason) => {
                warn!(metric = s.name(), reason, "series dropped before integration");
                dropped.push(DroppedMetric {
                    metric: s.name().to_string(),
                    reason: reason.to_string(),
                });
            }
            None => kept.push(s),
        }
    }
    (kept, dropped)
}

/// Build the panel described by `config` with parallel decoding.
pub fn build_panel(config: &StudyConfig) -> Result<PanelBuild, PipelineError> {
    PanelBuilder::new(config).build()
}
