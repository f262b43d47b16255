//! Study configuration, loaded from TOML.
//!
//! Every section has defaults, so an empty file describes the standard
//! study: 2016-01 through 2025-12, intersection index, the four-link causal
//! chain and a 2020-01 structural break.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pricewave_core::analysis::{BreakConfig, LagConfig, RegressionConfig};
use pricewave_core::domain::YearMonth;
use pricewave_core::normalize::{AggregationRule, BatchWindow, KeywordSet};
use pricewave_core::panel::{GapFill, IndexPolicy, IntegrationOptions};

/// Content hash of a configuration (BLAKE3 hex).
pub type ConfigHash = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub window: WindowConfig,
    pub panel: PanelConfig,
    pub sources: SourcesConfig,
    pub fear: FearConfig,
    pub lag: LagConfig,
    pub breaks: BreakSettings,
    pub regression: RegressionConfig,
    pub chains: Vec<ChainLink>,
    pub break_pairs: Vec<MetricPair>,
    pub regressions: Vec<RegressionSpec>,
    pub gender_gap: Option<GenderGapConfig>,
    pub misery: Option<MiseryConfig>,

    /// Directory relative source paths are resolved against. Set by
    /// `from_file`; not part of the hashed configuration.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            panel: PanelConfig::default(),
            sources: SourcesConfig::default(),
            fear: FearConfig::default(),
            lag: LagConfig::default(),
            breaks: BreakSettings::default(),
            regression: RegressionConfig::default(),
            chains: default_chains(),
            break_pairs: vec![MetricPair {
                a: "gas_price".into(),
                b: "cpi_total_yoy".into(),
            }],
            regressions: vec![RegressionSpec {
                x: "oil_price".into(),
                y: "cpi_total_yoy".into(),
            }],
            gender_gap: Some(GenderGapConfig::default()),
            misery: Some(MiseryConfig::default()),
            base_dir: None,
        }
    }
}

impl StudyConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: StudyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from disk; relative source paths resolve against the file's
    /// directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(s), Some(e)) = (self.window.start, self.window.end) {
            if s > e {
                return Err(ConfigError::Invalid(format!(
                    "window start {s} is after window end {e}"
                )));
            }
        }
        if self.breaks.rolling_window < 2 {
            return Err(ConfigError::Invalid(format!(
                "breaks.rolling_window must be at least 2, got {}",
                self.breaks.rolling_window
            )));
        }
        if self.regression.min_pairs < 3 {
            return Err(ConfigError::Invalid(format!(
                "regression.min_pairs must be at least 3, got {}",
                self.regression.min_pairs
            )));
        }
        if self.fear.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid("fear.keywords is empty".into()));
        }
        for news in &self.sources.news {
            if news.paths().is_empty() {
                return Err(ConfigError::Invalid("a [[sources.news]] entry has no path".into()));
            }
        }
        Ok(())
    }

    /// Deterministic BLAKE3 over the canonical JSON form.
    pub fn config_hash(&self) -> ConfigHash {
        let json = serde_json::to_string(self).expect("StudyConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn integration_options(&self) -> IntegrationOptions {
        IntegrationOptions {
            index_policy: self.panel.index_policy,
            gap_fill: self.panel.gap_fill,
            window_start: self.window.start,
            window_end: self.window.end,
            cpi_prefix: self.panel.cpi_prefix.clone(),
            yoy_metrics: self.panel.yoy_metrics.clone(),
        }
    }

    pub fn keyword_set(&self) -> KeywordSet {
        KeywordSet::new(&self.fear.keywords)
    }
}

// ─── Sections ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub start: Option<YearMonth>,
    pub end: Option<YearMonth>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start: Some(YearMonth::first_of_year(2016)),
            end: Some(YearMonth::last_of_year(2025)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub index_policy: IndexPolicy,
    pub gap_fill: GapFill,
    /// Metrics with this prefix get a YoY column.
    pub cpi_prefix: String,
    /// Extra metrics that get a YoY column.
    pub yoy_metrics: Vec<String>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        let opts = IntegrationOptions::default();
        Self {
            index_policy: opts.index_policy,
            gap_fill: opts.gap_fill,
            cpi_prefix: opts.cpi_prefix,
            yoy_metrics: opts.yoy_metrics,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub cpi: Vec<CpiSource>,
    pub energy: Vec<EnergySource>,
    pub labor: Vec<LaborSource>,
    pub news: Vec<NewsSource>,
}

/// BLS-style CPI JSON; each series id maps to one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpiSource {
    pub path: PathBuf,
    #[serde(default = "default_cpi_series")]
    pub series: BTreeMap<String, String>,
    #[serde(default = "default_cpi_rule")]
    pub aggregation: AggregationRule,
}

/// Weekly retail price rows (`["Oct-2023", "10/02", "3.801", ...]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergySource {
    pub path: PathBuf,
    pub metric: String,
    #[serde(default)]
    pub aggregation: AggregationRule,
}

/// Year x month CSV table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaborSource {
    pub path: PathBuf,
    pub metric: String,
    /// Cells after this month are treated as not yet reported.
    #[serde(default)]
    pub reported_through: Option<YearMonth>,
}

/// One or more article JSON files from the same collection method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSource {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub batch: BatchWindow,
}

impl NewsSource {
    pub fn paths(&self) -> Vec<&Path> {
        self.path
            .iter()
            .chain(self.paths.iter())
            .map(PathBuf::as_path)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FearConfig {
    pub metric: String,
    pub keywords: Vec<String>,
    /// Add one series per keyword next to the total.
    pub per_keyword: bool,
}

impl Default for FearConfig {
    fn default() -> Self {
        Self {
            metric: "fear_index".into(),
            keywords: [
                "inflation",
                "recession",
                "crisis",
                "high price",
                "layoff",
                "unemployment",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            per_keyword: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakSettings {
    pub boundary: YearMonth,
    pub min_sample: usize,
    pub shift_threshold: f64,
    /// Trailing window of the rolling correlation, in months.
    pub rolling_window: usize,
}

impl Default for BreakSettings {
    fn default() -> Self {
        let core = BreakConfig::default();
        Self {
            boundary: core.boundary,
            min_sample: core.min_sample,
            shift_threshold: core.shift_threshold,
            rolling_window: 12,
        }
    }
}

impl BreakSettings {
    pub fn tester_config(&self) -> BreakConfig {
        BreakConfig {
            boundary: self.boundary,
            min_sample: self.min_sample,
            shift_threshold: self.shift_threshold,
        }
    }
}

/// One link of the causal chain: does `leader` move before `follower`?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainLink {
    pub label: String,
    pub leader: String,
    pub follower: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPair {
    pub a: String,
    pub b: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionSpec {
    pub x: String,
    pub y: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenderGapConfig {
    pub female: String,
    pub male: String,
    pub output: String,
}

impl Default for GenderGapConfig {
    fn default() -> Self {
        Self {
            female: "unemployment_women".into(),
            male: "unemployment_men".into(),
            output: "gender_gap".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiseryConfig {
    pub unemployment: String,
    pub inflation: String,
    pub output: String,
}

impl Default for MiseryConfig {
    fn default() -> Self {
        Self {
            unemployment: "unemployment_total".into(),
            inflation: "cpi_total_yoy".into(),
            output: "misery_index".into(),
        }
    }
}

// ─── Defaults ───────────────────────────────────────────────────────

fn default_cpi_series() -> BTreeMap<String, String> {
    [
        ("CUUR0000SA0", "cpi_total"),
        ("CUUR0000SAF1", "cpi_food"),
        ("CUUR0000SA0E", "cpi_energy"),
        ("CUUR0000SAH1", "cpi_shelter"),
    ]
    .iter()
    .map(|(id, metric)| (id.to_string(), metric.to_string()))
    .collect()
}

fn default_cpi_rule() -> AggregationRule {
    AggregationRule::Last
}

fn default_chains() -> Vec<ChainLink> {
    [
        ("Energy -> Inflation", "gas_price", "cpi_total_yoy"),
        ("Inflation -> Labor", "cpi_total_yoy", "unemployment_total"),
        ("Labor -> News Fear", "unemployment_total", "fear_index"),
        ("Diesel -> Food", "diesel_price", "cpi_food_yoy"),
    ]
    .iter()
    .map(|(label, leader, follower)| ChainLink {
        label: label.to_string(),
        leader: leader.to_string(),
        follower: follower.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = StudyConfig::from_toml("").unwrap();
        assert_eq!(cfg, StudyConfig::default());
        assert_eq!(cfg.lag.max_lag, 6);
        assert_eq!(cfg.lag.min_pairs, 12);
        assert_eq!(cfg.breaks.boundary, YearMonth::first_of_year(2020));
        assert_eq!(cfg.breaks.min_sample, 6);
        assert_eq!(cfg.window.end, Some(YearMonth::last_of_year(2025)));
        assert_eq!(cfg.chains.len(), 4);
        assert_eq!(cfg.fear.keywords.len(), 6);
    }

    #[test]
    fn parses_sources_and_overrides() {
        let cfg = StudyConfig::from_toml(
            r#"
            [window]
            start = "2018-01"

            [panel]
            index_policy = "union"
            gap_fill = "linear_interior"

            [lag]
            max_lag = 3

            [breaks]
            boundary = "2021-03"

            [[sources.energy]]
            path = "gas.json"
            metric = "gas_price"
            aggregation = "median"

            [[sources.labor]]
            path = "unemployment.csv"
            metric = "unemployment_total"
            reported_through = "2025-08"

            [[sources.news]]
            paths = ["nyt_2016.json", "nyt_2017.json"]
            batch = "historical"

            [[chains]]
            label = "Gas -> CPI"
            leader = "gas_price"
            follower = "cpi_total_yoy"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.start, Some("2018-01".parse::<YearMonth>().unwrap()));
        assert_eq!(cfg.panel.index_policy, IndexPolicy::Union);
        assert_eq!(cfg.panel.gap_fill, GapFill::LinearInterior);
        assert_eq!(cfg.lag.max_lag, 3);
        assert_eq!(cfg.lag.min_pairs, 12);
        assert_eq!(cfg.breaks.boundary, "2021-03".parse::<YearMonth>().unwrap());
        assert_eq!(cfg.breaks.shift_threshold, 0.3);
        assert_eq!(cfg.sources.energy[0].aggregation, AggregationRule::Median);
        assert_eq!(cfg.sources.news[0].paths().len(), 2);
        assert_eq!(cfg.chains.len(), 1);
    }

    #[test]
    fn cpi_source_defaults_to_last_and_standard_series() {
        let cfg = StudyConfig::from_toml(
            r#"
            [[sources.cpi]]
            path = "cpi.json"
            "#,
        )
        .unwrap();
        let cpi = &cfg.sources.cpi[0];
        assert_eq!(cpi.aggregation, AggregationRule::Last);
        assert_eq!(cpi.series.get("CUUR0000SA0").map(String::as_str), Some("cpi_total"));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let err = StudyConfig::from_toml(
            r#"
            [window]
            start = "2025-01"
            end = "2020-01"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_month_is_a_parse_error() {
        let err = StudyConfig::from_toml("[breaks]\nboundary = \"2020-13\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn config_hash_is_stable_and_sensitive() {
        let a = StudyConfig::default();
        let mut b = StudyConfig::default();
        assert_eq!(a.config_hash(), b.config_hash());
        b.lag.max_lag = 4;
        assert_ne!(a.config_hash(), b.config_hash());
    }

    #[test]
    fn base_dir_does_not_change_hash() {
        let a = StudyConfig::default();
        let b = StudyConfig {
            base_dir: Some(PathBuf::from("/tmp/study")),
            ..StudyConfig::default()
        };
        assert_eq!(a.config_hash(), b.config_hash());
        assert_eq!(b.resolve(Path::new("cpi.json")), PathBuf::from("/tmp/study/cpi.json"));
        assert_eq!(b.resolve(Path::new("/abs/cpi.json")), PathBuf::from("/abs/cpi.json"));
    }

    #[test]
    fn regression_minimum_is_configurable() {
        let cfg = StudyConfig::from_toml("[regression]\nmin_pairs = 24\n").unwrap();
        assert_eq!(cfg.regression.min_pairs, 24);
        assert_eq!(StudyConfig::default().regression.min_pairs, 11);
        assert_ne!(cfg.config_hash(), StudyConfig::default().config_hash());

        let err = StudyConfig::from_toml("[regression]\nmin_pairs = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn config_hash_is_full_blake3_hex() {
        let hash = StudyConfig::default().config_hash();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(hash, blake3::hash(b"").to_hex().to_string());
    }
}
