//! HTTP/REST API server implementation using Axum

use crate::config::ServerConfig;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use dotquery_core::ErrorKind;
use dotquery_protocol::http::{
    endpoints, BatchQueryRequest, BatchQueryResponse, CompareRequest, CompareResponse, ErrorDto,
    HealthResponse, QueryRequest, QueryResponse, StatsResponse,
};
use dotquery_query::{EvaluationResult, QueryEngine};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    pub start_time: Instant,
}

/// Create HTTP server router
pub fn create_router(engine: Arc<QueryEngine>, config: &ServerConfig) -> Router {
    let state = AppState {
        engine,
        start_time: Instant::now(),
    };

    Router::new()
        .route(endpoints::HEALTH, get(health_check))
        .route(endpoints::QUERY, post(execute_query))
        .route(endpoints::QUERY_BATCH, post(execute_batch))
        .route(endpoints::QUERY_COMPARE, post(compare_providers))
        .route(
            endpoints::OPTIMIZATION_STATS,
            get(optimization_stats).delete(reset_optimization_stats),
        )
        .route(endpoints::OPTIMIZATION_CACHE, delete(clear_plan_cache))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(config.cors.build_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run CPU-bound engine work off the async executor
async fn blocking<T, F>(work: F) -> Result<T, (StatusCode, Json<QueryResponse>)>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        error!("Query task failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(QueryResponse::error(
                ErrorDto::code_for(ErrorKind::Internal),
                "query evaluation failed",
            )),
        )
    })
}

/// 400 for rejected queries and documents, 200 otherwise (including not found)
fn status_for(result: &EvaluationResult) -> StatusCode {
    match result.error_kind {
        Some(ErrorKind::Navigation) | None => StatusCode::OK,
        Some(ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
        Some(_) => StatusCode::BAD_REQUEST,
    }
}

// ==================== Health Check ====================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse::healthy(
        env!("CARGO_PKG_VERSION"),
        state.start_time.elapsed().as_secs(),
    ))
}

// ==================== Queries ====================

async fn execute_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> impl IntoResponse {
    let engine = Arc::clone(&state.engine);
    let result = match blocking(move || {
        let level = request.level.unwrap_or(engine.config().default_level);
        engine.evaluate_document(
            &request.query,
            &request.json,
            request.library.as_deref(),
            level,
        )
    })
    .await
    {
        Ok(result) => result,
        Err(failure) => return failure,
    };

    let status = status_for(&result);
    let response = QueryResponse::from_evaluation(result).with_stats(state.engine.stats());
    (status, Json(response))
}

async fn execute_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchQueryRequest>,
) -> impl IntoResponse {
    let engine = Arc::clone(&state.engine);
    let outcome = blocking(move || {
        let level = request.level.unwrap_or(engine.config().default_level);
        engine.evaluate_document_batch(
            &request.queries,
            &request.json,
            request.library.as_deref(),
            level,
        )
    })
    .await;

    let stats = state.engine.stats();
    match outcome {
        Ok(Ok(results)) => (
            StatusCode::OK,
            Json(BatchQueryResponse {
                success: true,
                results: results
                    .into_iter()
                    .map(QueryResponse::from_evaluation)
                    .collect(),
                error: None,
                optimization_stats: Some(stats),
            }),
        ),
        Ok(Err(e)) => (
            StatusCode::BAD_REQUEST,
            Json(BatchQueryResponse {
                success: false,
                results: Vec::new(),
                error: Some(ErrorDto {
                    code: ErrorDto::code_for(e.kind()).to_string(),
                    message: e.to_string(),
                }),
                optimization_stats: Some(stats),
            }),
        ),
        Err((status, Json(failure))) => (
            status,
            Json(BatchQueryResponse {
                success: false,
                results: Vec::new(),
                error: failure.error,
                optimization_stats: Some(stats),
            }),
        ),
    }
}

async fn compare_providers(
    State(state): State<AppState>,
    Json(request): Json<CompareRequest>,
) -> impl IntoResponse {
    let engine = Arc::clone(&state.engine);
    let results = match blocking(move || {
        let level = request.level.unwrap_or(engine.config().default_level);
        engine.compare_providers(&request.query, &request.json, level)
    })
    .await
    {
        Ok(results) => results,
        Err((status, Json(failure))) => {
            return (
                status,
                Json(json!({"success": false, "error": failure.error})),
            );
        }
    };

    let success = results.values().all(|r| status_for(r) == StatusCode::OK);
    let status = if success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    let response = CompareResponse {
        success,
        results: results
            .into_iter()
            .map(|(name, result)| (name, QueryResponse::from_evaluation(result)))
            .collect(),
    };
    (status, Json(json!(response)))
}

// ==================== Optimization ====================

async fn optimization_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatsResponse {
        success: true,
        optimization_stats: state.engine.stats(),
        cache_entries: state.engine.cache_len(),
    })
}

async fn reset_optimization_stats(State(state): State<AppState>) -> impl IntoResponse {
    state.engine.reset_stats();
    Json(StatsResponse {
        success: true,
        optimization_stats: state.engine.stats(),
        cache_entries: state.engine.cache_len(),
    })
}

async fn clear_plan_cache(State(state): State<AppState>) -> impl IntoResponse {
    let cleared = state.engine.cache_len();
    state.engine.clear_cache();
    Json(json!({"success": true, "cleared": cleared}))
}
