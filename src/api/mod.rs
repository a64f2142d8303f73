//! HTTP API for health checks, status, and inspection of swap state
//!
//! Read-only: every state change goes through the registries themselves.

use crate::config::ApiConfig;
use crate::swapper::{SwapperKind, SwapperSuite};
use crate::types::SwapId;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub suite: Arc<SwapperSuite>,
    pub instance_id: String,
    pub started_at: Instant,
}

/// Build the router; split from [`run_server`] so tests can drive it directly
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(get_status))
        .route("/swaps/:swapper", get(get_swaps))
        .route("/swaps/:swapper/:id", get(get_swap))
        .route("/modules", get(get_modules))
        .route("/chains", get(get_chains))
        .route("/proposals", get(get_proposals))
        .route("/audit", get(get_audit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Engine overview
async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let pending = state.suite.pending_requests().await;

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        instance_id: state.instance_id.clone(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        audit_records: state.suite.audit.len().await,
        registered_chains: state.suite.chains.len(),
        pending_requests: pending
            .into_iter()
            .map(|(swapper, pending)| PendingCount { swapper, pending })
            .collect(),
    })
}

async fn get_swaps(
    State(state): State<AppState>,
    Path(swapper): Path<SwapperKind>,
) -> impl IntoResponse {
    let registry = state.suite.registry(swapper);
    Json(SwapsResponse {
        swapper,
        current: registry.current_set().await,
        requests: registry.requests().await,
    })
}

async fn get_swap(
    State(state): State<AppState>,
    Path((swapper, id)): Path<(SwapperKind, SwapId)>,
) -> impl IntoResponse {
    match state.suite.registry(swapper).request(id).await {
        Some(request) => (StatusCode::OK, Json(request)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No request {} on {} swapper", id, swapper),
            }),
        )
            .into_response(),
    }
}

async fn get_modules(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.suite.modular.slots().await)
}

async fn get_chains(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.suite.chains.chains())
}

async fn get_proposals(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.suite.dao.proposals().await)
}

/// Audit records, optionally only those after sequence `since`
async fn get_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> impl IntoResponse {
    let since = query.since.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    let records: Vec<_> = state
        .suite
        .audit
        .records()
        .await
        .into_iter()
        .filter(|r| r.sequence > since)
        .take(limit)
        .collect();
    Json(records)
}

const DEFAULT_AUDIT_LIMIT: usize = 500;

// Request and response types

#[derive(Deserialize)]
struct AuditQuery {
    since: Option<u64>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    instance_id: String,
    uptime_seconds: u64,
    audit_records: usize,
    registered_chains: usize,
    pending_requests: Vec<PendingCount>,
}

#[derive(Serialize)]
struct PendingCount {
    swapper: SwapperKind,
    pending: usize,
}

#[derive(Serialize)]
struct SwapsResponse {
    swapper: SwapperKind,
    current: Vec<crate::types::Address>,
    requests: Vec<crate::registry::SwapRequest>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}
