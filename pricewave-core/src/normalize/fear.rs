//! TextFearIndexer — keyword hits in news text, summed per calendar month.
//!
//! Articles can arrive from two overlapping collection methods (bulk archive
//! retrieval and sparse recent sampling). Each article is counted once: by its
//! stable identifier when it has one, otherwise by publish date plus
//! normalized title.
//!
//! Sparse recent sampling is not reweighted, so recent months are
//! undersampled relative to archive months. This is a known limitation of
//! the index, not something corrected here.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{MonthlySeries, YearMonth};

/// Which collection method supplied an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchWindow {
    /// Bulk month-by-month archive retrieval.
    #[default]
    Historical,
    /// Sparse sampling of recent date windows.
    Recent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: Option<String>,
    pub publish_date: NaiveDate,
    pub title: String,
    pub text: String,
    pub batch: BatchWindow,
}

impl Article {
    /// Text searched for keywords: title followed by body.
    fn searchable(&self) -> String {
        normalize_whitespace(&format!("{} {}", self.title, self.text).to_lowercase())
    }

    fn title_key(&self) -> Option<(NaiveDate, String)> {
        let normalized: String = self
            .title
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let normalized = normalize_whitespace(&normalized);
        (!normalized.is_empty()).then_some((self.publish_date, normalized))
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive keyword phrases, deduplicated, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSet {
    phrases: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let phrases = phrases
            .into_iter()
            .map(|p| normalize_whitespace(&p.as_ref().to_lowercase()))
            .filter(|p| !p.is_empty() && seen.insert(p.clone()))
            .collect();
        Self { phrases }
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Non-overlapping occurrences of each phrase in `lowered` text.
    fn hits(&self, lowered: &str) -> Vec<usize> {
        self.phrases
            .iter()
            .map(|p| lowered.matches(p.as_str()).count())
            .collect()
    }
}

/// Monthly fear index plus its per-keyword breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FearIndex {
    /// Sum of all keyword hits per month.
    pub total: MonthlySeries,
    /// One series per keyword, same months as `total`.
    pub per_keyword: Vec<MonthlySeries>,
    pub articles_counted: usize,
    pub duplicates_dropped: usize,
}

#[derive(Debug, Clone)]
pub struct TextFearIndexer {
    metric: String,
    keywords: KeywordSet,
}

impl TextFearIndexer {
    pub fn new(metric: impl Into<String>, keywords: KeywordSet) -> Self {
        Self {
            metric: metric.into(),
            keywords,
        }
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    /// Name of the per-keyword series for `phrase`.
    pub fn keyword_metric(&self, phrase: &str) -> String {
        format!("{}_{}", self.metric, phrase.replace(' ', "_"))
    }

    /// Deduplicate, count, and accumulate by publish month.
    ///
    /// A month with at least one article but no hits scores 0; a month with no
    /// articles at all is missing.
    pub fn index<'a, I>(&self, articles: I) -> FearIndex
    where
        I: IntoIterator<Item = &'a Article>,
    {
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut seen_titles: HashSet<(NaiveDate, String)> = HashSet::new();
        let mut monthly: BTreeMap<YearMonth, Vec<usize>> = BTreeMap::new();
        let mut counted = 0usize;
        let mut duplicates = 0usize;

        for article in articles {
            let id = article
                .id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty());
            let title_key = article.title_key();

            // Either key marks a copy, whichever batch supplied it first.
            let duplicate = id.is_some_and(|id| seen_ids.contains(id))
                || title_key.as_ref().is_some_and(|key| seen_titles.contains(key));
            if duplicate {
                duplicates += 1;
                continue;
            }
            if let Some(id) = id {
                seen_ids.insert(id.to_string());
            }
            if let Some(key) = title_key {
                seen_titles.insert(key);
            }

            let hits = self.keywords.hits(&article.searchable());
            let slot = monthly
                .entry(YearMonth::from_date(article.publish_date))
                .or_insert_with(|| vec![0; self.keywords.phrases.len()]);
            for (acc, h) in slot.iter_mut().zip(hits) {
                *acc += h;
            }
            counted += 1;
        }

        let total = MonthlySeries::from_points(
            self.metric.clone(),
            monthly
                .iter()
                .map(|(m, hits)| (*m, hits.iter().sum::<usize>() as f64)),
        );
        let per_keyword = self
            .keywords
            .phrases
            .iter()
            .enumerate()
            .map(|(k, phrase)| {
                MonthlySeries::from_points(
                    self.keyword_metric(phrase),
                    monthly.iter().map(|(m, hits)| (*m, hits[k] as f64)),
                )
            })
            .collect();

        debug!(
            metric = self.metric.as_str(),
            articles = counted,
            duplicates,
            months = total.observed_count(),
            "indexed article batches"
        );

        FearIndex {
            total,
            per_keyword,
            articles_counted: counted,
            duplicates_dropped: duplicates,
        }
    }
}
