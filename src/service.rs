use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::aggregator::Aggregator;
use crate::cache::{
    feed_cache_key, news_cache_key, search_cache_key, CacheStats, CacheStore, CachedArticles,
};
use crate::config::{Config, Source};
use crate::error::{NewsError, Result};
use crate::fetcher::Fetcher;
use crate::models::{Article, Page, ScoredArticle};
use crate::query::{self, SearchFilter};
use crate::recommend::{
    recommend_by_keyword, recommend_by_source, recommend_similar, PreferenceSnapshot, Scorer,
};
use crate::sources::SourceRegistry;

/// Size of the canonical "all sources" aggregate that search, detail lookups
/// and recommendations read from.
const AGGREGATE_LIMIT: i64 = 100;
const ALL_SOURCES: &str = "all";

fn aggregate_key() -> String {
    feed_cache_key(AGGREGATE_LIMIT, 0, ALL_SOURCES)
}

/// A result plus whether it was served from the cache.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub value: T,
    pub cached: bool,
}

impl<T> Fetched<T> {
    fn new(value: T, cached: bool) -> Self {
        Self { value, cached }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub filter: SearchFilter,
    pub limit: i64,
    pub offset: i64,
}

pub struct NewsService {
    registry: SourceRegistry,
    cache: Arc<CacheStore>,
    aggregator: Aggregator,
    scorer: Scorer,
    search_ttl: Duration,
}

impl NewsService {
    pub fn new(
        registry: SourceRegistry,
        cache: Arc<CacheStore>,
        aggregator: Aggregator,
        scorer: Scorer,
        search_ttl: Duration,
    ) -> Self {
        Self {
            registry,
            cache,
            aggregator,
            scorer,
            search_ttl,
        }
    }

    /// Wire up a service from configuration, sharing `cache` with the caller.
    pub fn from_config(config: &Config, cache: Arc<CacheStore>) -> anyhow::Result<Self> {
        let fetcher = Arc::new(Fetcher::from_config(config)?);
        Ok(Self::new(
            SourceRegistry::new(config.sources.clone()),
            cache,
            Aggregator::new(fetcher),
            Scorer::new(config.scoring.clone()),
            config.cache.search_ttl(),
        ))
    }

    pub fn sources(&self) -> &[Source] {
        self.registry.all()
    }

    /// Enabled sources publishing in `language`.
    pub fn sources_by_language(&self, language: &str) -> Vec<Source> {
        self.registry.by_language(language)
    }

    pub async fn list_articles(
        &self,
        limit: i64,
        offset: i64,
        source_id: Option<&str>,
    ) -> Result<Fetched<Page<Article>>> {
        query::validate_page_params(limit, offset)?;

        let id = match source_id {
            Some(id) => id,
            None => {
                let all = self.load_all().await?;
                let page = query::paginate(&all.value, limit, offset)?;
                return Ok(Fetched::new(page, all.cached));
            }
        };

        let key = feed_cache_key(limit, offset, id);
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(Fetched::new(query::paginate(&cached, limit, offset)?, true));
        }

        let articles = self.load_source(id).await?;
        self.cache.set(&key, articles.clone(), None).await;
        Ok(Fetched::new(query::paginate(&articles, limit, offset)?, false))
    }

    pub async fn get_article_by_id(&self, id: &str) -> Result<Fetched<Article>> {
        if id.trim().is_empty() {
            return Err(NewsError::validation("News ID is required"));
        }

        let key = news_cache_key(id);
        if let Some(cached) = self.cache.get(&key).await {
            if let Some(article) = cached.first() {
                return Ok(Fetched::new(article.clone(), true));
            }
        }

        let all = self.load_all().await?.value;
        let article = query::find_by_id(&all, id)?.clone();

        let ttl = self.derived_ttl(None).await;
        self.cache
            .set(&key, Arc::new(vec![article.clone()]), Some(ttl))
            .await;
        Ok(Fetched::new(article, false))
    }

    pub async fn search_articles(&self, request: &SearchRequest) -> Result<Fetched<Page<Article>>> {
        let query_text = request.query.trim();
        if query_text.is_empty() {
            return Err(NewsError::validation("Search query is required"));
        }
        query::validate_page_params(request.limit, request.offset)?;

        let filter = &request.filter;
        let sources = (!filter.sources.is_empty()).then(|| filter.sources.join(","));
        let key = search_cache_key(
            query_text,
            [
                ("source", sources),
                ("from", filter.from.map(|d| d.to_rfc3339())),
                ("to", filter.to.map(|d| d.to_rfc3339())),
                ("limit", Some(request.limit.to_string())),
                ("offset", Some(request.offset.to_string())),
            ],
        );

        if let Some(cached) = self.cache.get(&key).await {
            let page = query::paginate(&cached, request.limit, request.offset)?;
            return Ok(Fetched::new(page, true));
        }

        let all = self.load_all().await?.value;
        let results = query::search(&all, query_text, filter);
        debug!("Search '{}' matched {} articles", query_text, results.len());

        let page = query::paginate(&results, request.limit, request.offset)?;
        let ttl = self.derived_ttl(Some(self.search_ttl)).await;
        self.cache.set(&key, Arc::new(results), Some(ttl)).await;
        Ok(Fetched::new(page, false))
    }

    pub async fn get_recommendations(
        &self,
        prefs: &PreferenceSnapshot,
        limit: i64,
    ) -> Result<Fetched<Vec<ScoredArticle>>> {
        let (limit, _) = query::validate_page_params(limit, 0)?;

        if prefs.is_cold_start() {
            return Ok(Fetched::new(Vec::new(), false));
        }

        let all = self.load_all().await?;
        let scored = self
            .scorer
            .top_recommendations(&all.value, prefs, limit, Utc::now());
        Ok(Fetched::new(scored, all.cached))
    }

    /// Articles related to `id`, most similar first.
    pub async fn get_similar_articles(&self, id: &str, limit: i64) -> Result<Fetched<Vec<Article>>> {
        let (limit, _) = query::validate_page_params(limit, 0)?;

        let all = self.load_all().await?;
        let current = query::find_by_id(&all.value, id)?;
        let similar = recommend_similar(current, &all.value, limit);
        Ok(Fetched::new(similar, all.cached))
    }

    pub async fn get_recommendations_by_keyword(
        &self,
        keyword: &str,
        prefs: &PreferenceSnapshot,
        limit: i64,
    ) -> Result<Fetched<Vec<Article>>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(NewsError::validation("Keyword is required"));
        }
        let (limit, _) = query::validate_page_params(limit, 0)?;

        let all = self.load_all().await?;
        let mut matched = recommend_by_keyword(&all.value, prefs, keyword);
        matched.truncate(limit);
        Ok(Fetched::new(matched, all.cached))
    }

    /// `source_id` is the slug of a source display name, as in favorites.
    pub async fn get_recommendations_by_source(
        &self,
        source_id: &str,
        prefs: &PreferenceSnapshot,
        limit: i64,
    ) -> Result<Fetched<Vec<Article>>> {
        let source_id = source_id.trim();
        if source_id.is_empty() {
            return Err(NewsError::validation("Source ID is required"));
        }
        let (limit, _) = query::validate_page_params(limit, 0)?;

        let all = self.load_all().await?;
        let mut matched = recommend_by_source(&all.value, prefs, source_id);
        matched.truncate(limit);
        Ok(Fetched::new(matched, all.cached))
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// TTL for an entry built from the canonical aggregate: never longer than
    /// the aggregate itself has left, so cached ids always resolve. Zero when
    /// the aggregate is not cached, which skips caching the entry.
    async fn derived_ttl(&self, wanted: Option<Duration>) -> Duration {
        let left = self
            .cache
            .remaining_ttl(&aggregate_key())
            .await
            .unwrap_or(Duration::ZERO);
        wanted.map_or(left, |wanted| left.min(wanted))
    }

    /// The canonical aggregate over every enabled source, from cache when
    /// possible.
    async fn load_all(&self) -> Result<Fetched<CachedArticles>> {
        let key = aggregate_key();
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(Fetched::new(cached, true));
        }

        let sources = self.registry.enabled();
        let articles = Arc::new(self.aggregator.run(&sources).await?);
        info!("Aggregated {} articles from {} sources", articles.len(), sources.len());

        self.cache.set(&key, articles.clone(), None).await;
        Ok(Fetched::new(articles, false))
    }

    async fn load_source(&self, id: &str) -> Result<CachedArticles> {
        let source = self
            .registry
            .by_id(id)
            .ok_or_else(|| NewsError::not_found(format!("Source not found: {}", id)))?;

        if !source.enabled {
            return Err(NewsError::SourceDisabled(id.to_string()));
        }

        let articles = self.aggregator.run(std::slice::from_ref(source)).await?;
        Ok(Arc::new(articles))
    }
}
