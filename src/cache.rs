//! In-process TTL cache for article sequences.
//!
//! Keys are derived from an operation name and its parameters with the
//! parameters sorted by name, so the same request always maps to the same
//! entry. Entries are never updated in place; a recomputation replaces them.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::Expiry;
use serde::Serialize;
use tracing::{debug, info};

use crate::models::Article;

pub const DEFAULT_TTL: Duration = Duration::from_secs(900);
pub const SEARCH_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

pub type CachedArticles = Arc<Vec<Article>>;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedArticles,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.created_at.elapsed())
    }
}

/// Each entry expires after the ttl it was stored with, so listing and
/// search entries share one cache.
struct EntryTtl;

impl Expiry<String, CacheEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub keys: usize,
}

pub struct CacheStore {
    entries: Cache<String, CacheEntry>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl CacheStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES, default_ttl)
    }

    pub fn with_capacity(max_entries: u64, default_ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryTtl)
            .build();

        Self {
            entries,
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a live entry. Expired entries count as a miss.
    pub async fn get(&self, key: &str) -> Option<CachedArticles> {
        match self.entries.get(key).await {
            Some(entry) => {
                debug!("Cache hit: {}", key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value)
            }
            None => {
                debug!("Cache miss: {}", key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Time left before `key` expires, without touching the hit/miss counters.
    pub async fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        self.entries.get(key).await.map(|entry| entry.remaining())
    }

    /// Store `value` under `key`, replacing any previous entry. `None` uses
    /// the store's default TTL.
    pub async fn set(&self, key: &str, value: CachedArticles, ttl: Option<Duration>) -> bool {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.is_zero() {
            return false;
        }

        let len = value.len();
        let entry = CacheEntry {
            value,
            created_at: Instant::now(),
            ttl,
        };
        self.entries.insert(key.to_string(), entry).await;
        debug!("Cache set: {} ({} items, ttl {:?})", key, len, ttl);
        true
    }

    pub async fn delete(&self, key: &str) -> usize {
        let removed = self.entries.remove(key).await.is_some();
        if removed {
            debug!("Cache deleted: {}", key);
        }
        usize::from(removed)
    }

    pub async fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
        info!("Cache cleared");
    }

    /// Evict expired entries now instead of waiting for moka's housekeeping.
    pub async fn sweep_expired(&self) {
        self.entries.run_pending_tasks().await;
    }

    pub async fn stats(&self) -> CacheStats {
        self.entries.run_pending_tasks().await;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            keys: self.entries.iter().count(),
        }
    }
}

pub async fn start_background_sweep(cache: Arc<CacheStore>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        cache.sweep_expired().await;
        debug!("Cache sweep done, {} live entries", cache.entries.entry_count());
    }
}

/// `operation` alone when there are no parameters, otherwise
/// `operation:name:value|name:value` with names in sorted order.
pub fn cache_key<K, V, I>(operation: &str, params: I) -> String
where
    K: Into<String>,
    V: Display,
    I: IntoIterator<Item = (K, Option<V>)>,
{
    let sorted: BTreeMap<String, String> = params
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.into(), v.to_string())))
        .collect();

    if sorted.is_empty() {
        return operation.to_string();
    }

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect::<Vec<_>>()
        .join("|");

    format!("{}:{}", operation, joined)
}

pub fn feed_cache_key(limit: i64, offset: i64, source: &str) -> String {
    cache_key(
        "feeds",
        [
            ("limit", Some(limit.to_string())),
            ("offset", Some(offset.to_string())),
            ("source", Some(source.to_string())),
        ],
    )
}

pub fn news_cache_key(news_id: &str) -> String {
    format!("news:{}", news_id)
}

pub fn search_cache_key<K, V, I>(query: &str, params: I) -> String
where
    K: Into<String>,
    V: Display,
    I: IntoIterator<Item = (K, Option<V>)>,
{
    let params = params
        .into_iter()
        .map(|(k, v)| (k.into(), v.map(|v| v.to_string())))
        .chain(std::iter::once(("q".to_string(), Some(query.to_string()))));
    cache_key("search", params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceRef;
    use chrono::Utc;

    fn article(id: &str) -> Article {
        Article {
            id: id.to_string(),
            title: format!("Article {}", id),
            description: String::new(),
            content: None,
            link: format!("https://a.com/{}", id),
            published: Utc::now(),
            source: SourceRef {
                id: "a".to_string(),
                name: "A".to_string(),
                url: "https://a.com/rss".to_string(),
                favicon: None,
            },
            thumbnail: None,
            author: None,
            categories: vec![],
        }
    }

    fn articles(n: usize) -> CachedArticles {
        Arc::new((0..n).map(|i| article(&i.to_string())).collect())
    }

    mod key_tests {
        use super::*;

        #[test]
        fn test_key_is_independent_of_parameter_order() {
            let a = cache_key(
                "feeds",
                [("limit", Some(30)), ("offset", Some(0)), ("source", None)],
            );
            let b = cache_key(
                "feeds",
                [("source", None), ("offset", Some(0)), ("limit", Some(30))],
            );
            assert_eq!(a, b);
        }

        #[test]
        fn test_feed_key_determinism() {
            let a = cache_key(
                "feeds",
                [
                    ("limit", Some("30")),
                    ("offset", Some("0")),
                    ("source", Some("all")),
                ],
            );
            let b = cache_key(
                "feeds",
                [
                    ("source", Some("all")),
                    ("offset", Some("0")),
                    ("limit", Some("30")),
                ],
            );
            assert_eq!(a, b);
            assert_eq!(a, "feeds:limit:30|offset:0|source:all");
            assert_eq!(feed_cache_key(30, 0, "all"), a);
        }

        #[test]
        fn test_key_without_params_is_operation() {
            let params: [(&str, Option<u32>); 0] = [];
            assert_eq!(cache_key("feeds", params), "feeds");
        }

        #[test]
        fn test_missing_values_are_omitted() {
            let key = cache_key("search", [("from", None), ("q", Some("rust"))]);
            assert_eq!(key, "search:q:rust");
        }

        #[test]
        fn test_news_key() {
            assert_eq!(news_cache_key("abc"), "news:abc");
        }

        #[test]
        fn test_search_key_includes_query() {
            let key = search_cache_key(
                "rust",
                [("limit", Some(20)), ("offset", Some(0)), ("to", None)],
            );
            assert_eq!(key, "search:limit:20|offset:0|q:rust");
        }
    }

    mod store_tests {
        use super::*;

        #[tokio::test]
        async fn test_set_then_get() {
            let cache = CacheStore::default();
            assert!(cache.set("k", articles(3), None).await);

            let hit = cache.get("k").await.unwrap();
            assert_eq!(hit.len(), 3);
            assert_eq!(hit[0].id, "0");
        }

        #[tokio::test]
        async fn test_get_missing_is_none() {
            let cache = CacheStore::default();
            assert!(cache.get("missing").await.is_none());
        }

        #[tokio::test]
        async fn test_set_replaces_entry() {
            let cache = CacheStore::default();
            cache.set("k", articles(3), None).await;
            cache.set("k", articles(1), None).await;
            assert_eq!(cache.get("k").await.unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_zero_ttl_is_rejected() {
            let cache = CacheStore::default();
            assert!(!cache.set("k", articles(1), Some(Duration::ZERO)).await);
            assert!(cache.get("k").await.is_none());
        }

        #[tokio::test]
        async fn test_expired_entry_is_a_miss() {
            let cache = CacheStore::default();
            cache
                .set("short", articles(2), Some(Duration::from_millis(20)))
                .await;
            cache.set("long", articles(2), None).await;

            tokio::time::sleep(Duration::from_millis(60)).await;

            assert!(cache.get("short").await.is_none());
            assert!(cache.get("long").await.is_some());
            assert_eq!(cache.stats().await.keys, 1);
        }

        #[tokio::test]
        async fn test_sweep_removes_only_expired() {
            let cache = CacheStore::default();
            cache
                .set("a", articles(1), Some(Duration::from_millis(10)))
                .await;
            cache
                .set("b", articles(1), Some(Duration::from_millis(10)))
                .await;
            cache.set("c", articles(1), None).await;

            tokio::time::sleep(Duration::from_millis(40)).await;

            cache.sweep_expired().await;
            assert_eq!(cache.entries.entry_count(), 1);
            assert_eq!(cache.stats().await.keys, 1);
        }

        #[tokio::test]
        async fn test_mixed_ttls_share_one_store() {
            let cache = CacheStore::new(Duration::from_millis(200));
            cache
                .set("search", articles(1), Some(Duration::from_millis(20)))
                .await;
            cache.set("feeds", articles(1), None).await;

            tokio::time::sleep(Duration::from_millis(60)).await;

            assert!(cache.get("search").await.is_none());
            assert!(cache.get("feeds").await.is_some());

            tokio::time::sleep(Duration::from_millis(200)).await;
            assert!(cache.get("feeds").await.is_none());
        }

        #[tokio::test]
        async fn test_replacing_entry_resets_its_ttl() {
            let cache = CacheStore::default();
            cache
                .set("k", articles(1), Some(Duration::from_millis(30)))
                .await;
            cache.set("k", articles(2), None).await;

            tokio::time::sleep(Duration::from_millis(60)).await;
            assert_eq!(cache.get("k").await.unwrap().len(), 2);
        }

        #[tokio::test]
        async fn test_remaining_ttl() {
            let cache = CacheStore::default();
            assert!(cache.remaining_ttl("k").await.is_none());

            cache
                .set("k", articles(1), Some(Duration::from_secs(10)))
                .await;
            let remaining = cache.remaining_ttl("k").await.unwrap();
            assert!(remaining <= Duration::from_secs(10));
            assert!(remaining > Duration::from_secs(9));

            let stats = cache.stats().await;
            assert_eq!((stats.hits, stats.misses), (0, 0));
        }

        #[tokio::test]
        async fn test_delete_and_clear() {
            let cache = CacheStore::default();
            cache.set("a", articles(1), None).await;
            cache.set("b", articles(1), None).await;

            assert_eq!(cache.delete("a").await, 1);
            assert_eq!(cache.delete("a").await, 0);
            assert!(cache.get("a").await.is_none());

            cache.clear().await;
            assert!(cache.get("b").await.is_none());
            assert_eq!(cache.stats().await.keys, 0);
        }

        #[tokio::test]
        async fn test_stats_count_hits_and_misses() {
            let cache = CacheStore::default();
            cache.set("a", articles(1), None).await;
            cache.get("a").await;
            cache.get("a").await;
            cache.get("b").await;

            let stats = cache.stats().await;
            assert_eq!(stats.hits, 2);
            assert_eq!(stats.misses, 1);
            assert_eq!(stats.keys, 1);
        }

        #[tokio::test]
        async fn test_concurrent_get_and_set_see_whole_entries() {
            let cache = Arc::new(CacheStore::default());
            let mut handles = Vec::new();
            for i in 0..20 {
                let cache = cache.clone();
                handles.push(tokio::spawn(async move {
                    if i % 2 == 0 {
                        cache.set("shared", articles(5), None).await;
                    } else if let Some(hit) = cache.get("shared").await {
                        assert_eq!(hit.len(), 5);
                    }
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }
            assert_eq!(cache.get("shared").await.unwrap().len(), 5);
        }
    }
}
