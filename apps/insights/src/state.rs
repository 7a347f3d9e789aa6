use std::sync::Arc;

use crate::analysis::pipeline::InsightPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the vocabulary, extractors and cache; one per process.
    pub pipeline: Arc<InsightPipeline>,
}
