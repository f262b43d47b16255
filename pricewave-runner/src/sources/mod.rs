//! Raw source decoding — already-fetched files into core inputs.
//!
//! Each decoder reads one file and returns either monthly series or article
//! batches. A decoder failure is confined to its own file; the pipeline
//! reports it and carries on with the other sources.

pub mod cpi;
pub mod energy;
pub mod labor;
pub mod news;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pricewave_core::IntegrationError;

pub use cpi::decode_cpi;
pub use energy::decode_energy;
pub use labor::decode_labor;
pub use news::{decode_news, ArticleBatch};

/// Errors from decoding one raw source file.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid CSV in '{}': {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unexpected layout in '{}': {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    #[error("'{}': {source}", path.display())]
    Table {
        path: PathBuf,
        #[source]
        source: IntegrationError,
    },
}

impl SourceError {
    pub(crate) fn format(path: &Path, reason: impl Into<String>) -> Self {
        SourceError::Format {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Which of the four raw shapes a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Cpi,
    Energy,
    Labor,
    News,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::Cpi => "cpi",
            SourceKind::Energy => "energy",
            SourceKind::Labor => "labor",
            SourceKind::News => "news",
        };
        f.pad(s)
    }
}

pub(crate) fn read_to_string(path: &Path) -> Result<String, SourceError> {
    std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// A JSON scalar that may arrive as text or as a number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(v) => Some(*v).filter(|v| v.is_finite()),
            Scalar::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    pub(crate) fn as_text(&self) -> String {
        match self {
            Scalar::Number(v) => v.to_string(),
            Scalar::Text(s) => s.trim().to_string(),
        }
    }
}
