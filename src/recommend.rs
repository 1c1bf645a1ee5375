//! Ranks articles against a reader's declared interests.
//!
//! Scoring is additive per article:
//! - `keyword` points for each distinct preference keyword in title + description
//! - `favorite_source` points when the article's source slug is a favorite
//! - up to `freshness_max` points for articles younger than
//!   `freshness_window_hours`, decaying by one point every
//!   `freshness_decay_hours`
//!
//! The weights are product constants and can be overridden in `[scoring]`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{Article, ScoredArticle};

pub const FAVORITE_SOURCE_REASON: &str = "favorite source";
pub const RECENT_REASON: &str = "recent";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub keyword: f64,
    pub favorite_source: f64,
    pub freshness_max: f64,
    pub freshness_decay_hours: f64,
    pub freshness_window_hours: f64,
    pub recent_hours: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            keyword: 10.0,
            favorite_source: 5.0,
            freshness_max: 3.0,
            freshness_decay_hours: 8.0,
            freshness_window_hours: 24.0,
            recent_hours: 6.0,
        }
    }
}

/// Read-only view of a reader's preferences, supplied per call by whoever
/// owns their persistence.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferenceSnapshot {
    pub keywords: Vec<String>,
    pub favorite_sources: HashSet<String>,
    #[serde(alias = "readNews")]
    pub read_articles: HashSet<String>,
}

impl PreferenceSnapshot {
    pub fn is_cold_start(&self) -> bool {
        self.keywords.iter().all(|k| k.trim().is_empty()) && self.favorite_sources.is_empty()
    }

    fn has_read(&self, article: &Article) -> bool {
        self.read_articles.contains(&article.id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scorer {
    weights: ScoringWeights,
}

impl Scorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Score every unread article, drop zero scores and sort by descending
    /// score. Equal scores keep their input order.
    pub fn recommend(
        &self,
        articles: &[Article],
        prefs: &PreferenceSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<ScoredArticle> {
        if prefs.is_cold_start() {
            return Vec::new();
        }

        let keywords = distinct_keywords(&prefs.keywords);

        let mut scored: Vec<ScoredArticle> = articles
            .iter()
            .filter(|a| !prefs.has_read(a))
            .map(|a| self.score(a, &keywords, prefs, now))
            .filter(|s| s.score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }

    pub fn top_recommendations(
        &self,
        articles: &[Article],
        prefs: &PreferenceSnapshot,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<ScoredArticle> {
        let mut scored = self.recommend(articles, prefs, now);
        scored.truncate(limit);
        scored
    }

    fn score(
        &self,
        article: &Article,
        keywords: &[String],
        prefs: &PreferenceSnapshot,
        now: DateTime<Utc>,
    ) -> ScoredArticle {
        let mut score = 0.0;
        let mut matched_keywords = Vec::new();
        let mut reasons = Vec::new();

        let text = format!("{} {}", article.title, article.description).to_lowercase();
        for keyword in keywords {
            if text.contains(&keyword.to_lowercase()) {
                score += self.weights.keyword;
                reasons.push(format!("keyword: {}", keyword));
                matched_keywords.push(keyword.clone());
            }
        }

        if prefs.favorite_sources.contains(&article.source.slug()) {
            score += self.weights.favorite_source;
            reasons.push(FAVORITE_SOURCE_REASON.to_string());
        }

        let hours_ago = hours_since(article.published, now);
        if hours_ago < self.weights.freshness_window_hours {
            let freshness =
                (self.weights.freshness_max - hours_ago / self.weights.freshness_decay_hours)
                    .max(0.0);
            score += freshness;

            if hours_ago < self.weights.recent_hours {
                reasons.push(RECENT_REASON.to_string());
            }
        }

        ScoredArticle {
            article: article.clone(),
            score,
            matched_keywords,
            reasons,
        }
    }
}

/// Unread articles containing `keyword` anywhere in their text, newest first.
pub fn recommend_by_keyword(
    articles: &[Article],
    prefs: &PreferenceSnapshot,
    keyword: &str,
) -> Vec<Article> {
    let keyword = keyword.to_lowercase();
    let mut matched: Vec<Article> = articles
        .iter()
        .filter(|a| !prefs.has_read(a))
        .filter(|a| {
            let text = format!(
                "{} {} {}",
                a.title,
                a.description,
                a.content.as_deref().unwrap_or_default()
            )
            .to_lowercase();
            text.contains(&keyword)
        })
        .cloned()
        .collect();

    sort_newest_first(&mut matched);
    matched
}

/// Unread articles whose source slug equals `source_id`, newest first.
pub fn recommend_by_source(
    articles: &[Article],
    prefs: &PreferenceSnapshot,
    source_id: &str,
) -> Vec<Article> {
    let mut matched: Vec<Article> = articles
        .iter()
        .filter(|a| !prefs.has_read(a))
        .filter(|a| a.source.slug() == source_id)
        .cloned()
        .collect();

    sort_newest_first(&mut matched);
    matched
}

/// Articles related to `current`: +2 for the same source, +1 per shared
/// category, +1 per title word (longer than two characters) found in the
/// other article's title or description.
pub fn recommend_similar(current: &Article, articles: &[Article], limit: usize) -> Vec<Article> {
    let title_words: Vec<String> = current
        .title
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect();

    let mut scored: Vec<(usize, &Article)> = articles
        .iter()
        .filter(|a| a.id != current.id)
        .map(|a| {
            let mut similarity = 0;

            if a.source.name == current.source.name {
                similarity += 2;
            }

            similarity += a
                .categories
                .iter()
                .filter(|c| current.categories.contains(c))
                .count();

            let text = format!("{} {}", a.title, a.description).to_lowercase();
            similarity += title_words
                .iter()
                .filter(|w| text.contains(w.as_str()))
                .count();

            (similarity, a)
        })
        .filter(|(similarity, _)| *similarity > 0)
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, a)| a.clone())
        .collect()
}

fn distinct_keywords(keywords: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Hours between `published` and `now`; future timestamps count as zero.
fn hours_since(published: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - published).num_milliseconds().max(0);
    millis as f64 / 3_600_000.0
}

fn sort_newest_first(articles: &mut [Article]) {
    articles.sort_by(|a, b| b.published.cmp(&a.published));
}
