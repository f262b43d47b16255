//! Pricewave Core — monthly panel integration and lead-lag analysis.
//!
//! This crate is the pure engine, with no file or network I/O:
//! - Domain types (months, raw observations, monthly series)
//! - Source normalizers (sub-monthly resampling, year x month melting,
//!   news keyword indexing)
//! - Panel integration onto one shared calendar, with YoY features
//! - Lead-lag correlation, structural-break tests and derived metrics

pub mod analysis;
pub mod domain;
pub mod error;
pub mod normalize;
pub mod panel;

pub use domain::{MonthlySeries, RawObservation, YearMonth};
pub use error::{AnalysisError, IntegrationError, Period, Scope};
pub use panel::Panel;
