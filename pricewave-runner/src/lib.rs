//! Price Wave Runner — study configuration, source decoding, orchestration
//! and artifact export.
//!
//! This crate builds on `pricewave-core` to provide:
//! - TOML study configuration with defaults for every section
//! - Decoders for the four raw source shapes (CPI, energy, labor, news)
//! - The parallel panel build with per-source failure isolation
//! - The analysis study (causal chain, structural breaks, derived metrics)
//! - CSV / JSON / Markdown artifacts

pub mod config;
pub mod export;
pub mod pipeline;
pub mod sources;
pub mod study;

pub use config::{ConfigError, ConfigHash, StudyConfig};
pub use pipeline::{build_panel, BuildReport, PanelBuild, PanelBuilder, PipelineError, SourceStatus};
pub use sources::{SourceError, SourceKind};
pub use study::{run_study, ChainResult, StudyOutput, StudyReport, SCHEMA_VERSION};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<StudyConfig>();
        assert_sync::<StudyConfig>();
    }

    #[test]
    fn reports_are_send_sync() {
        assert_send::<BuildReport>();
        assert_sync::<BuildReport>();
        assert_send::<StudyReport>();
        assert_sync::<StudyReport>();
        assert_send::<ChainResult>();
        assert_sync::<ChainResult>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<SourceError>();
        assert_sync::<SourceError>();
        assert_send::<PipelineError>();
        assert_sync::<PipelineError>();
        assert_send::<ConfigError>();
        assert_sync::<ConfigError>();
    }
}
