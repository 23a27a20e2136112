mod config;
mod metrics;
mod retry;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cache::{SourceCacheStats, TermCacheStats};
use config::{AppConfig, LoggingConfig};
use extract::{LanguageModel, OllamaClient};
use metrics::{Metrics, MetricsSnapshot, TimedOperation};
use model::{LinkError, Source};
use pipeline::{LinkRequest, LinkingResult, Pipeline};
use retry::{RetryPolicy, RetryingLlm};

struct AppState {
    pipeline: Pipeline,
    metrics: Arc<Metrics>,
    llm_model: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    sources: Vec<Source>,
    llm: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Serialize)]
struct CacheStatsResponse {
    sources: SourceCacheStats,
    terms: TermCacheStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging);
    config.validate().context("Configuration rejected")?;

    let llm: Option<Arc<dyn LanguageModel>> = if config.llm.enabled {
        let client = OllamaClient::new(
            config.llm.base_url.clone(),
            config.llm.model.clone(),
            config.llm_timeout(),
        );
        Some(Arc::new(RetryingLlm::new(
            Arc::new(client),
            RetryPolicy::from_config(&config.retry),
        )))
    } else {
        None
    };

    let pipeline = Pipeline::new(config.to_pipeline_config(), llm)
        .context("Failed to build pipeline")?;
    info!(
        mode = ?config.mode,
        sources = ?pipeline.sources(),
        llm = config.llm.enabled,
        "Pipeline ready"
    );

    let state = Arc::new(AppState {
        pipeline,
        metrics: Metrics::new(),
        llm_model: config.llm.enabled.then(|| config.llm.model.clone()),
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app(state)).await.context("Server error")?;
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/link", post(link_entities))
        .route("/stats", get(get_stats))
        .route("/cache/stats", get(get_cache_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sources: state.pipeline.sources(),
        llm: state
            .llm_model
            .clone()
            .unwrap_or_else(|| "disabled".to_string()),
    })
}

async fn link_entities(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LinkRequest>,
) -> Result<Json<LinkingResult>, ApiError> {
    let timer = TimedOperation::start();

    match state.pipeline.run(request).await {
        Ok(result) => {
            state.metrics.record_request(true);
            state.metrics.record_run(timer.elapsed(), &result.statistics);
            Ok(Json(result))
        }
        Err(e) => {
            state.metrics.record_request(false);
            warn!(error = %e, "Link request failed");
            Err((status_for(&e), Json(ErrorResponse { error: e.to_string() })))
        }
    }
}

fn status_for(error: &LinkError) -> StatusCode {
    match error {
        LinkError::Validation(_) | LinkError::Config(_) => StatusCode::BAD_REQUEST,
        LinkError::Transport(_) | LinkError::Timeout(_) | LinkError::Parse(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

async fn get_cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        sources: state.pipeline.cache_stats(),
        terms: state.pipeline.term_cache_stats(),
    })
}
