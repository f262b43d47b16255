//! Source normalizers: everything that turns a raw source shape into a
//! `MonthlySeries`.
//!
//! - `resample`: daily/weekly observations, aggregated per month
//! - `melt`: year x month wide tables
//! - `fear`: keyword hits in news articles

pub mod fear;
pub mod melt;
pub mod resample;

pub use fear::{Article, BatchWindow, FearIndex, KeywordSet, TextFearIndexer};
pub use melt::{Cell, MatrixMelter, YearMonthGrid, MONTHS_PER_YEAR};
pub use resample::{AggregationRule, SeriesNormalizer};
