use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::config::Source;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// A normalized article. Produced once per aggregation pass and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    /// Plain text, at most 300 characters.
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub link: String,
    #[serde(rename = "pubDate")]
    pub published: DateTime<Utc>,
    pub source: SourceRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(rename = "category")]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

impl SourceRef {
    pub fn from_source(source: &Source) -> Self {
        let favicon = Url::parse(&source.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .map(|host| format!("https://www.google.com/s2/favicons?domain={}", host));

        Self {
            id: source.id.clone(),
            name: source.name.clone(),
            url: source.url.clone(),
            favicon,
        }
    }

    /// Identifier derived from the display name: lower-cased, whitespace runs
    /// replaced by a single hyphen. "The Verge" becomes "the-verge".
    pub fn slug(&self) -> String {
        WHITESPACE_RUN
            .replace_all(&self.name.to_lowercase(), "-")
            .into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredArticle {
    #[serde(flatten)]
    pub article: Article,
    pub score: f64,
    pub matched_keywords: Vec<String>,
    pub reasons: Vec<String>,
}

/// One page of a larger result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}
