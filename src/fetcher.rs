use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::{Config, Source};
use crate::error::{NewsError, Result};
use crate::models::Article;
use crate::normalizer::{normalize, MediaHint, RawItem};

static ITEM_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<(?:item|entry)\b[^>]*>(.*?)</(?:item|entry)>").expect("valid regex")
});
static MEDIA_CONTENT_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<media:content\b[^>]*?\burl\s*=\s*["']([^"']+)["']"#).expect("valid regex")
});
static MEDIA_THUMBNAIL_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<media:thumbnail\b[^>]*?\burl\s*=\s*["']([^"']+)["']"#).expect("valid regex")
});
static ENCLOSURE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<enclosure\b[^>]*?\burl\s*=\s*["']([^"']+)["']"#).expect("valid regex")
});

/// Fetches and parses a single source. One instance is shared by every
/// aggregation pass.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(config.fetch_timeout(), &config.user_agent)
    }

    /// Fetch one source and normalize every item in it. Any failure is
    /// reported as [`NewsError::FeedFetch`] for this source only.
    pub async fn fetch(&self, source: &Source) -> Result<Vec<Article>> {
        info!("Fetching feed: {} ({})", source.name, source.url);

        let bytes = self
            .fetch_bytes(&source.url)
            .await
            .map_err(|e| NewsError::feed_fetch(&source.id, e))?;

        let articles = Self::parse_feed(&bytes, source, Utc::now())
            .map_err(|e| NewsError::feed_fetch(&source.id, e))?;

        if articles.is_empty() {
            warn!("No items found in feed: {}", source.name);
        } else {
            info!("Parsed {} items from feed '{}'", articles.len(), source.name);
        }

        Ok(articles)
    }

    async fn fetch_bytes(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Parse a feed document into articles. `now` stands in for missing
    /// publication dates.
    pub fn parse_feed(
        bytes: &[u8],
        source: &Source,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Article>> {
        // feed_rs merges media:content, media:thumbnail and enclosure into one
        // list, so the provider-specific attributes are read from the raw XML.
        let media_map = Self::extract_media_from_xml(bytes);

        let parsed = parser::parse(bytes)?;

        let articles = parsed
            .entries
            .into_iter()
            .map(|entry| normalize(Self::raw_item_from_entry(entry, &media_map), source, now))
            .collect();

        Ok(articles)
    }

    pub fn raw_item_from_entry(
        entry: feed_rs::model::Entry,
        media_map: &HashMap<String, Vec<MediaHint>>,
    ) -> RawItem {
        let link = entry.links.first().map(|l| l.href.clone());

        let mut media = link
            .as_ref()
            .and_then(|l| media_map.get(l))
            .cloned()
            .unwrap_or_default();
        if media.is_empty() {
            media = Self::media_from_entry(&entry);
        }

        let categories = entry
            .categories
            .into_iter()
            .map(|c| c.term)
            .filter(|t| !t.trim().is_empty())
            .collect();

        RawItem {
            title: entry.title.map(|t| t.content),
            link,
            summary: entry.summary.map(|t| t.content),
            content: entry.content.and_then(|c| c.body),
            published: entry.published.or(entry.updated),
            author: entry.authors.into_iter().next().map(|p| p.name),
            categories,
            media,
        }
    }

    /// Media references as feed_rs models them, used when the raw scan found
    /// nothing for an entry (Atom feeds, items without a plain `<link>`).
    fn media_from_entry(entry: &feed_rs::model::Entry) -> Vec<MediaHint> {
        let mut media = Vec::new();
        for object in &entry.media {
            for content in &object.content {
                if let Some(url) = &content.url {
                    media.push(MediaHint::Content(url.to_string()));
                }
            }
            for thumbnail in &object.thumbnails {
                media.push(MediaHint::Thumbnail(thumbnail.image.uri.clone()));
            }
        }
        media
    }

    /// Scan raw feed XML for media attributes, keyed by item link.
    pub fn extract_media_from_xml(xml_bytes: &[u8]) -> HashMap<String, Vec<MediaHint>> {
        let mut media_map = HashMap::new();
        let xml_str = match std::str::from_utf8(xml_bytes) {
            Ok(s) => s,
            Err(_) => return media_map,
        };

        for block in ITEM_BLOCK.captures_iter(xml_str) {
            let item = match block.get(1) {
                Some(m) => m.as_str(),
                None => continue,
            };

            let link = match Self::extract_xml_element(item, "link") {
                Some(link) if !link.is_empty() => link,
                _ => continue,
            };

            let mut media = Vec::new();
            media.extend(Self::attribute_urls(&MEDIA_CONTENT_URL, item).map(MediaHint::Content));
            media.extend(
                Self::attribute_urls(&MEDIA_THUMBNAIL_URL, item).map(MediaHint::Thumbnail),
            );
            media.extend(Self::attribute_urls(&ENCLOSURE_URL, item).map(MediaHint::Enclosure));

            if !media.is_empty() {
                debug!("Found {} media hints for {}", media.len(), link);
                media_map.insert(link, media);
            }
        }

        media_map
    }

    fn attribute_urls<'a>(pattern: &'a Regex, xml: &'a str) -> impl Iterator<Item = String> + 'a {
        pattern
            .captures_iter(xml)
            .filter_map(|c| c.get(1))
            .map(|m| decode_xml_text(m.as_str().trim()))
    }

    /// Text of the first `<tag>...</tag>` element, with CDATA unwrapped.
    pub fn extract_xml_element(xml: &str, tag: &str) -> Option<String> {
        let start_tag = format!("<{}>", tag);
        let end_tag = format!("</{}>", tag);

        let start = xml.find(&start_tag)? + start_tag.len();
        let end = xml[start..].find(&end_tag)? + start;

        let text = xml[start..end].trim();
        let text = text
            .strip_prefix("<![CDATA[")
            .and_then(|t| t.strip_suffix("]]>"))
            .unwrap_or(text);

        Some(decode_xml_text(text.trim()))
    }
}

fn decode_xml_text(text: &str) -> String {
    text.replace("&amp;", "&")
}
