mod analysis;
mod cache;
mod config;
mod errors;
mod llm_client;
mod models;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::delegate::DelegateExtractor;
use crate::analysis::pipeline::{ExtractionMode, InsightPipeline};
use crate::analysis::vocabulary::Vocabulary;
use crate::cache::file::FileStore;
use crate::cache::memory::MemoryStore;
use crate::cache::redis_store::RedisStore;
use crate::cache::{CacheStore, ExtractionCache};
use crate::config::{CacheBackend, Config, ExtractionStrategy};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (aborts on invalid values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Insights API v{}", env!("CARGO_PKG_VERSION"));

    // Vocabulary: built-in lists unless a JSON override is configured
    let vocabulary = match &config.vocabulary_path {
        Some(path) => {
            let vocabulary = Vocabulary::from_path(path)?;
            info!("Vocabulary loaded from {}", path.display());
            vocabulary
        }
        None => Vocabulary::default(),
    };

    // Initialize cache store
    let store: Arc<dyn CacheStore> = match config.cache_backend {
        CacheBackend::File => Arc::new(
            FileStore::open(&config.cache_dir)
                .await
                .with_context(|| format!("Cannot open cache dir {}", config.cache_dir.display()))?,
        ),
        CacheBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .context("REDIS_URL is required for the redis cache backend")?;
            Arc::new(RedisStore::open(url)?)
        }
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
    };
    info!(
        "Cache initialized (backend: {}, ttl: {}h)",
        store.backend(),
        config.cache_ttl_hours
    );
    let cache = ExtractionCache::new(store, chrono::Duration::hours(config.cache_ttl_hours));

    // Initialize extraction mode
    let mode = match config.extraction {
        ExtractionStrategy::RuleBased => ExtractionMode::RuleBased,
        ExtractionStrategy::Delegate => {
            let api_key = config
                .anthropic_api_key
                .clone()
                .context("ANTHROPIC_API_KEY is required for delegate extraction")?;
            let llm = LlmClient::new(api_key, Duration::from_secs(config.delegate_timeout_secs))?;
            info!(
                "LLM client initialized (model: {}, fallback: {})",
                llm_client::MODEL,
                config.delegate_fallback
            );
            ExtractionMode::Delegate {
                extractor: DelegateExtractor::new(Arc::new(llm)),
                fallback: config.delegate_fallback,
            }
        }
    };
    info!("Extraction mode: {}", mode.name());

    let pipeline = InsightPipeline::new(
        Arc::new(vocabulary),
        cache,
        mode,
        config.min_term_support,
    );

    // Build app state
    let state = AppState {
        pipeline: Arc::new(pipeline),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
