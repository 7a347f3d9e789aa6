pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/insights/analyze", post(handlers::handle_analyze))
        .route(
            "/api/v1/insights/cache",
            get(handlers::handle_get_cached)
                .put(handlers::handle_put_cached)
                .delete(handlers::handle_clear_cache),
        )
        .route(
            "/api/v1/insights/cache/stats",
            get(handlers::handle_cache_stats),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use chrono::Duration;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::analysis::pipeline::{ExtractionMode, InsightPipeline};
    use crate::analysis::vocabulary::Vocabulary;
    use crate::cache::memory::MemoryStore;
    use crate::cache::ExtractionCache;

    const CARE: &str = "Responsible for coordinating patient care and maintaining records.";

    fn app() -> Router {
        let cache = ExtractionCache::new(Arc::new(MemoryStore::new()), Duration::hours(24));
        let pipeline = InsightPipeline::new(
            Arc::new(Vocabulary::default()),
            cache,
            ExtractionMode::RuleBased,
            2,
        );
        build_router(AppState {
            pipeline: Arc::new(pipeline),
        })
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "insights-api");
    }

    #[tokio::test]
    async fn test_analyze_returns_report_and_caches_it() {
        let app = app();
        let request = json!({
            "title": "Registered Nurse",
            "soc_code": "29-1141.00",
            "postings": [
                {"JvId": 1, "JobTitle": "RN", "Description": CARE},
                {"id": "two", "description": CARE},
                "not a posting"
            ]
        });

        let (status, report) =
            send(&app, Method::POST, "/api/v1/insights/analyze", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["total_postings_analyzed"], 3);
        assert_eq!(report["classification_code"], "29-1141.00");
        assert_eq!(report["extraction_backend"], "rule_based");
        let terms = report["responsibilities"].as_array().unwrap();
        assert!(terms
            .iter()
            .any(|t| t["term"] == "coordinating patient care" && t["count"] == 2));

        let (status, cached) = send(
            &app,
            Method::GET,
            "/api/v1/insights/cache?classification_code=29-1141.00&title=Registered%20Nurse",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cached, report);
    }

    #[tokio::test]
    async fn test_analyze_rejects_blank_title() {
        let request = json!({"title": "  ", "classification_code": "29-1141.00", "postings": []});
        let (status, body) =
            send(&app(), Method::POST, "/api/v1/insights/analyze", Some(request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_analyze_with_no_postings_is_empty_report() {
        let request = json!({"title": "Nurse", "classification_code": "29-1141.00"});
        let (status, body) =
            send(&app(), Method::POST, "/api/v1/insights/analyze", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_postings_analyzed"], 0);
        assert_eq!(body["skills"], json!([]));
    }

    #[tokio::test]
    async fn test_cache_miss_is_not_found() {
        let (status, body) = send(
            &app(),
            Method::GET,
            "/api/v1/insights/cache?classification_code=00-0000.00&title=Nobody",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_put_stats_and_clear() {
        let app = app();
        let report = json!({
            "searched_title": "Electrician",
            "classification_code": "47-2111.00",
            "total_postings_analyzed": 4,
            "responsibilities": [],
            "skills": [],
            "qualifications": [],
            "unique_aspects": []
        });
        for title in ["Electrician", "Apprentice Electrician"] {
            let body = json!({"classification_code": "47-2111.00", "title": title, "report": report});
            let (status, stored) = send(&app, Method::PUT, "/api/v1/insights/cache", Some(body)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(stored["stored"], true);
        }

        let (_, stats) = send(&app, Method::GET, "/api/v1/insights/cache/stats", None).await;
        assert_eq!(stats["total_entries"], 2);
        assert_eq!(stats["backend"], "memory");

        let (_, one) = send(
            &app,
            Method::DELETE,
            "/api/v1/insights/cache?classification_code=47-2111.00&title=Electrician",
            None,
        )
        .await;
        assert_eq!(one["removed"], 1);

        let (_, rest) = send(&app, Method::DELETE, "/api/v1/insights/cache", None).await;
        assert_eq!(rest["removed"], 1);

        let (_, stats) = send(&app, Method::GET, "/api/v1/insights/cache/stats", None).await;
        assert_eq!(stats["total_entries"], 0);
    }
}
