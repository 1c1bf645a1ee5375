//! Turns one raw feed item into a canonical [`Article`].
//!
//! Provider-specific fields arrive as [`MediaHint`] variants; thumbnails are
//! chosen by walking [`THUMBNAIL_RULES`] in order and taking the first hit.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::config::Source;
use crate::models::{Article, SourceRef};

pub const DESCRIPTION_MAX_CHARS: usize = 300;
const ELLIPSIS: &str = "...";
const UNTITLED: &str = "Untitled";

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static INLINE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img[^>]+src="([^">]+)""#).expect("valid regex"));

/// Decoded in this order; `&nbsp;` first so `&amp;nbsp;` survives as text.
const ENTITIES: [(&str, &str); 6] = [
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
];

/// A media reference attached to an item by its provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaHint {
    /// `<media:content url="...">`
    Content(String),
    /// `<media:thumbnail url="...">`
    Thumbnail(String),
    /// `<enclosure url="...">`
    Enclosure(String),
}

/// Provider-agnostic view of one feed item, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    /// The item's `<description>` / summary, possibly HTML.
    pub summary: Option<String>,
    /// Full HTML body (`content:encoded`).
    pub content: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub categories: Vec<String>,
    pub media: Vec<MediaHint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailRule {
    MediaContent,
    MediaThumbnail,
    Enclosure,
    InlineImage,
}

pub const THUMBNAIL_RULES: [ThumbnailRule; 4] = [
    ThumbnailRule::MediaContent,
    ThumbnailRule::MediaThumbnail,
    ThumbnailRule::Enclosure,
    ThumbnailRule::InlineImage,
];

impl ThumbnailRule {
    pub fn extract(&self, item: &RawItem) -> Option<String> {
        match self {
            ThumbnailRule::MediaContent => item.media.iter().find_map(|m| match m {
                MediaHint::Content(url) => Some(url.clone()),
                _ => None,
            }),
            ThumbnailRule::MediaThumbnail => item.media.iter().find_map(|m| match m {
                MediaHint::Thumbnail(url) => Some(url.clone()),
                _ => None,
            }),
            ThumbnailRule::Enclosure => item.media.iter().find_map(|m| match m {
                MediaHint::Enclosure(url) => Some(url.clone()),
                _ => None,
            }),
            ThumbnailRule::InlineImage => {
                let html = item.content.as_deref().or(item.summary.as_deref())?;
                INLINE_IMAGE
                    .captures(html)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
            }
        }
    }
}

pub fn extract_thumbnail(item: &RawItem) -> Option<String> {
    THUMBNAIL_RULES
        .iter()
        .find_map(|rule| rule.extract(item))
        .filter(|url| !url.trim().is_empty())
}

/// Strip tags, decode common entities, collapse whitespace and cap the length.
pub fn clean_description(html: &str) -> String {
    let mut cleaned = TAG.replace_all(html, "").into_owned();

    for (entity, replacement) in ENTITIES {
        cleaned = cleaned.replace(entity, replacement);
    }

    let cleaned = WHITESPACE_RUN.replace_all(&cleaned, " ");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() > DESCRIPTION_MAX_CHARS {
        let keep = DESCRIPTION_MAX_CHARS - ELLIPSIS.len();
        let mut truncated: String = cleaned.chars().take(keep).collect();
        truncated.push_str(ELLIPSIS);
        truncated
    } else {
        cleaned.to_string()
    }
}

/// Build an article from a raw item. Never fails: missing data degrades the
/// corresponding field only.
pub fn normalize(item: RawItem, source: &Source, now: DateTime<Utc>) -> Article {
    let thumbnail = extract_thumbnail(&item);

    let title = item
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let description = clean_description(
        item.summary
            .as_deref()
            .or(item.content.as_deref())
            .unwrap_or_default(),
    );

    let categories = if item.categories.is_empty() {
        vec![source.category.clone()]
    } else {
        item.categories
    };

    Article {
        id: Uuid::new_v4().to_string(),
        title,
        description,
        content: item.content.or(item.summary),
        link: item.link.unwrap_or_default(),
        published: item.published.unwrap_or(now),
        source: SourceRef::from_source(source),
        thumbnail,
        author: item.author.filter(|a| !a.trim().is_empty()),
        categories,
    }
}
