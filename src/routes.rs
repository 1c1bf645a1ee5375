use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::NewsError;
use crate::models::Page;
use crate::query::{parse_date_param, parse_source_filter, SearchFilter};
use crate::recommend::PreferenceSnapshot;
use crate::service::{NewsService, SearchRequest};

const FEED_PAGE_SIZE: i64 = 30;
const SEARCH_PAGE_SIZE: i64 = 20;
const RECOMMENDATION_LIMIT: i64 = 30;
const SIMILAR_LIMIT: i64 = 5;

pub struct AppState {
    pub service: Arc<NewsService>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/feeds", get(list_feeds))
        .route("/api/news/:id", get(news_detail))
        .route("/api/news/:id/similar", get(similar_news))
        .route("/api/search", get(search))
        .route("/api/recommendations", post(recommendations))
        .route("/api/recommendations/keyword", post(keyword_recommendations))
        .route("/api/recommendations/source", post(source_recommendations))
        .route("/api/sources", get(list_sources))
        .route("/admin/cache/stats", get(cache_stats))
        .route("/admin/cache/clear", post(clear_cache))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Custom error type
pub struct AppError(NewsError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            NewsError::Validation(_) | NewsError::SourceDisabled(_) => StatusCode::BAD_REQUEST,
            NewsError::NotFound(_) => StatusCode::NOT_FOUND,
            NewsError::FeedFetch { .. }
            | NewsError::AllSourcesFailed { .. }
            | NewsError::NoSources => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if !self.0.is_client_error() {
            error!("Request failed: {}", self.0);
        }

        (
            status,
            Json(json!({ "success": false, "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl From<NewsError> for AppError {
    fn from(err: NewsError) -> Self {
        AppError(err)
    }
}

fn page_response<T: serde::Serialize>(page: Page<T>, cached: bool) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": page.items,
        "pagination": {
            "total": page.total,
            "limit": page.limit,
            "offset": page.offset,
            "hasMore": page.has_more,
        },
        "cached": cached,
    }))
}

#[derive(Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_feed_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub source: Option<String>,
}

fn default_feed_limit() -> i64 {
    FEED_PAGE_SIZE
}

pub async fn list_feeds(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, AppError> {
    let source = query.source.as_deref().filter(|s| !s.is_empty());
    let result = state
        .service
        .list_articles(query.limit, query.offset, source)
        .await?;
    Ok(page_response(result.value, result.cached))
}

pub async fn news_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.service.get_article_by_id(&id).await?;
    Ok(Json(json!({
        "success": true,
        "data": result.value,
        "cached": result.cached,
    })))
}

#[derive(Deserialize)]
pub struct SimilarQuery {
    #[serde(default = "default_similar_limit")]
    pub limit: i64,
}

fn default_similar_limit() -> i64 {
    SIMILAR_LIMIT
}

pub async fn similar_news(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<SimilarQuery>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.service.get_similar_articles(&id, query.limit).await?;
    Ok(Json(json!({
        "success": true,
        "data": result.value,
        "cached": result.cached,
    })))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub source: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_search_limit() -> i64 {
    SEARCH_PAGE_SIZE
}

impl SearchQuery {
    fn into_request(self) -> Result<SearchRequest, NewsError> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let filter = SearchFilter {
            sources: non_empty(self.source)
                .map(|s| parse_source_filter(&s))
                .unwrap_or_default(),
            from: non_empty(self.from)
                .map(|s| parse_date_param(&s))
                .transpose()?,
            to: non_empty(self.to).map(|s| parse_date_param(&s)).transpose()?,
        };

        Ok(SearchRequest {
            query: self.q,
            filter,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let request = query.into_request()?;
    let result = state.service.search_articles(&request).await?;
    Ok(page_response(result.value, result.cached))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationBody {
    #[serde(flatten)]
    pub preferences: PreferenceSnapshot,
    #[serde(default = "default_recommendation_limit")]
    pub limit: i64,
}

fn default_recommendation_limit() -> i64 {
    RECOMMENDATION_LIMIT
}

pub async fn recommendations(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RecommendationBody>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .service
        .get_recommendations(&body.preferences, body.limit)
        .await?;
    Ok(Json(json!({
        "success": true,
        "data": result.value,
        "cached": result.cached,
    })))
}

/// Body for the keyword and source recommendation routes. Only `readNews`
/// is read from the preferences.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetedRecommendationBody {
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(flatten)]
    pub preferences: PreferenceSnapshot,
    #[serde(default = "default_recommendation_limit")]
    pub limit: i64,
}

pub async fn keyword_recommendations(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TargetedRecommendationBody>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .service
        .get_recommendations_by_keyword(&body.keyword, &body.preferences, body.limit)
        .await?;
    Ok(Json(json!({
        "success": true,
        "data": result.value,
        "cached": result.cached,
    })))
}

pub async fn source_recommendations(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TargetedRecommendationBody>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .service
        .get_recommendations_by_source(&body.source_id, &body.preferences, body.limit)
        .await?;
    Ok(Json(json!({
        "success": true,
        "data": result.value,
        "cached": result.cached,
    })))
}

#[derive(Deserialize)]
pub struct SourcesQuery {
    pub language: Option<String>,
}

pub async fn list_sources(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SourcesQuery>,
) -> impl IntoResponse {
    let sources = match query.language.as_deref().filter(|l| !l.is_empty()) {
        Some(language) => state.service.sources_by_language(language),
        None => state.service.sources().to_vec(),
    };
    let sources: Vec<Value> = sources
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "name": s.name,
                "url": s.url,
                "language": s.language,
                "category": s.category,
                "enabled": s.enabled,
            })
        })
        .collect();
    Json(json!({ "success": true, "data": sources }))
}

pub async fn cache_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.service.cache_stats().await;
    Json(json!({ "success": true, "data": stats }))
}

pub async fn clear_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.service.clear_cache().await;
    Json(json!({ "success": true }))
}

pub async fn health() -> impl IntoResponse {
    "OK"
}
