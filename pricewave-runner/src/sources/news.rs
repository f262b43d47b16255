//! News archive JSON: a flat array of article records, or an archive
//! envelope `{"response": {"docs": [...]}}`.
//!
//! The searchable body is the snippet; the lead paragraph stands in when the
//! snippet is empty. Articles whose date cannot be read are counted and
//! dropped.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::debug;

use pricewave_core::normalize::{Article, BatchWindow};

use super::SourceError;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NewsFile {
    Flat(Vec<RawArticle>),
    Envelope { response: Docs },
}

#[derive(Debug, Deserialize)]
struct Docs {
    #[serde(default)]
    docs: Vec<RawArticle>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawArticle {
    #[serde(rename = "_id")]
    id: Option<String>,
    uri: Option<String>,
    pub_date: Option<String>,
    date: Option<String>,
    headline: Option<Headline>,
    snippet: Option<String>,
    lead_paragraph: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Headline {
    Text(String),
    Main { main: Option<String> },
}

impl Headline {
    fn text(&self) -> &str {
        match self {
            Headline::Text(s) => s,
            Headline::Main { main } => main.as_deref().unwrap_or(""),
        }
    }
}

impl RawArticle {
    fn publish_date(&self) -> Option<NaiveDate> {
        self.date
            .as_deref()
            .or(self.pub_date.as_deref())
            .and_then(parse_publish_date)
    }

    fn into_article(self, batch: BatchWindow) -> Option<Article> {
        let publish_date = self.publish_date()?;
        let text = match self.snippet.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => self.lead_paragraph.unwrap_or_default(),
        };
        Some(Article {
            id: self.id.or(self.uri),
            publish_date,
            title: self
                .headline
                .as_ref()
                .map(|h| h.text().to_string())
                .unwrap_or_default(),
            text,
            batch,
        })
    }
}

/// Publication date of a timestamp, taken in its own offset's calendar day
/// converted to UTC.
pub(crate) fn parse_publish_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.naive_utc().date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc().date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Articles decoded from one news file.
#[derive(Debug, Clone)]
pub struct ArticleBatch {
    pub path: PathBuf,
    pub batch: BatchWindow,
    pub articles: Vec<Article>,
    /// Records dropped because no publish date could be read.
    pub undated: usize,
}

pub fn decode_news(
    path: &Path,
    content: &str,
    batch: BatchWindow,
) -> Result<ArticleBatch, SourceError> {
    let file: NewsFile = serde_json::from_str(content).map_err(|source| SourceError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let records = match file {
        NewsFile::Flat(records) => records,
        NewsFile::Envelope { response } => response.docs,
    };

    let total = records.len();
    let articles: Vec<Article> = records
        .into_iter()
        .filter_map(|r| r.into_article(batch))
        .collect();
    let undated = total - articles.len();
    debug!(path = %path.display(), ?batch, articles = articles.len(), undated, "decoded news file");

    Ok(ArticleBatch {
        path: path.to_path_buf(),
        batch,
        articles,
        undated,
    })
}
