//! Axum route handlers for the Insights API.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::CacheStats;
use crate::errors::AppError;
use crate::models::posting::RawPosting;
use crate::models::report::InsightReport;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub title: String,
    #[serde(alias = "soc_code")]
    pub classification_code: String,
    /// Raw posting records; each is read leniently.
    #[serde(default)]
    pub postings: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CacheQuery {
    #[serde(alias = "soc_code")]
    pub classification_code: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PutCacheRequest {
    #[serde(alias = "soc_code")]
    pub classification_code: String,
    pub title: String,
    pub report: InsightReport,
}

#[derive(Debug, Serialize)]
pub struct PutCacheResponse {
    pub stored: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub removed: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/insights/analyze
///
/// Always answers with a report; degraded extraction shows up as empty lists.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<InsightReport>, AppError> {
    let title = require_field("title", &request.title)?;
    let code = require_field("classification_code", &request.classification_code)?;

    let postings: Vec<RawPosting> = request
        .postings
        .iter()
        .enumerate()
        .map(|(index, value)| RawPosting::from_value(index, value))
        .collect();

    let report = state.pipeline.generate_report(&postings, title, code).await;
    Ok(Json(report))
}

/// GET /api/v1/insights/cache?classification_code=..&title=..
pub async fn handle_get_cached(
    State(state): State<AppState>,
    Query(query): Query<CacheQuery>,
) -> Result<Json<InsightReport>, AppError> {
    let code = require_field(
        "classification_code",
        query.classification_code.as_deref().unwrap_or_default(),
    )?;
    let title = require_field("title", query.title.as_deref().unwrap_or_default())?;

    state
        .pipeline
        .get_cached_report(code, title)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No cached analysis for '{title}' ({code})")))
}

/// PUT /api/v1/insights/cache
pub async fn handle_put_cached(
    State(state): State<AppState>,
    Json(request): Json<PutCacheRequest>,
) -> Result<Json<PutCacheResponse>, AppError> {
    let code = require_field("classification_code", &request.classification_code)?;
    let title = require_field("title", &request.title)?;

    let stored = state
        .pipeline
        .put_cached_report(code, title, &request.report)
        .await;
    Ok(Json(PutCacheResponse { stored }))
}

/// DELETE /api/v1/insights/cache[?classification_code=..&title=..]
///
/// With both parameters removes that entry; otherwise clears everything.
pub async fn handle_clear_cache(
    State(state): State<AppState>,
    Query(query): Query<CacheQuery>,
) -> Json<ClearCacheResponse> {
    let code = non_empty(query.classification_code.as_deref());
    let title = non_empty(query.title.as_deref());

    let removed = state.pipeline.clear_cache(code, title).await;
    Json(ClearCacheResponse { removed })
}

/// GET /api/v1/insights/cache/stats
pub async fn handle_cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.pipeline.cache_stats().await)
}

fn require_field<'a>(name: &str, value: &'a str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{name} cannot be empty")));
    }
    Ok(trimmed)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
