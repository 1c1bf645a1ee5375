//! Pure operations over an already-fetched article sequence.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{NewsError, Result};
use crate::models::{Article, Page};

pub const MIN_LIMIT: i64 = 1;
pub const MAX_LIMIT: i64 = 100;

/// Optional narrowing applied on top of the text query.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Matched case-insensitively as substrings of the source display name.
    pub sources: Vec<String>,
    pub from: Option<DateTime<Utc>>,
    /// Inclusive through the end of this calendar day.
    pub to: Option<DateTime<Utc>>,
}

pub fn validate_page_params(limit: i64, offset: i64) -> Result<(usize, usize)> {
    if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        return Err(NewsError::validation(format!(
            "Limit must be between {} and {}",
            MIN_LIMIT, MAX_LIMIT
        )));
    }
    if offset < 0 {
        return Err(NewsError::validation("Offset must be non-negative"));
    }
    Ok((limit as usize, offset as usize))
}

/// Return the `[offset, offset + limit)` slice of `items`.
pub fn paginate<T: Clone>(items: &[T], limit: i64, offset: i64) -> Result<Page<T>> {
    let (limit, offset) = validate_page_params(limit, offset)?;
    let total = items.len();

    let page = items
        .iter()
        .skip(offset)
        .take(limit)
        .cloned()
        .collect();

    Ok(Page {
        items: page,
        total,
        limit,
        offset,
        has_more: offset + limit < total,
    })
}

pub fn search(articles: &[Article], query: &str, filter: &SearchFilter) -> Vec<Article> {
    let needle = query.to_lowercase();
    let source_terms: Vec<String> = filter.sources.iter().map(|s| s.to_lowercase()).collect();
    let to = filter.to.map(end_of_day);

    articles
        .iter()
        .filter(|a| matches_text(a, &needle))
        .filter(|a| {
            if source_terms.is_empty() {
                return true;
            }
            let name = a.source.name.to_lowercase();
            source_terms.iter().any(|term| name.contains(term.as_str()))
        })
        .filter(|a| filter.from.map_or(true, |from| a.published >= from))
        .filter(|a| to.map_or(true, |to| a.published <= to))
        .cloned()
        .collect()
}

fn matches_text(article: &Article, needle: &str) -> bool {
    article.title.to_lowercase().contains(needle)
        || article.description.to_lowercase().contains(needle)
        || article
            .content
            .as_ref()
            .map_or(false, |c| c.to_lowercase().contains(needle))
}

pub fn find_by_id<'a>(articles: &'a [Article], id: &str) -> Result<&'a Article> {
    articles
        .iter()
        .find(|a| a.id == id)
        .ok_or_else(|| NewsError::not_found("News not found"))
}

/// 23:59:59.999 on the same calendar day.
pub fn end_of_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .map(|end| end.and_utc())
        .unwrap_or(ts)
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date_param(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .ok_or_else(|| NewsError::validation(format!("Invalid date: {}", value)))
}

/// Split a comma-separated source filter into trimmed, non-empty terms.
pub fn parse_source_filter(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
