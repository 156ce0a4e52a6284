//! HTTP routes
//!
//! ```text
//! POST /api/query           QueryRequest   → QueryReply
//! POST /api/query/confirm   ConfirmRequest → QueryResponse
//! GET  /api/functions       function catalogue
//! GET  /api/health
//! ```

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

use super::{handle_confirm, handle_query, ConfirmRequest, QueryReply, QueryRequest, INVALID_REQUEST};
use crate::pipeline::Orchestrator;
use crate::registry::FunctionSpec;

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[derive(Debug, Serialize)]
pub struct FunctionsResponse {
    pub functions: Vec<FunctionSpec>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub version: &'static str,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/query", post(query))
        .route("/api/query/confirm", post(confirm))
        .route("/api/functions", get(list_functions))
        .route("/api/health", get(health_check))
        .with_state(state)
}

/// POST /api/query
async fn query(State(state): State<AppState>, Json(req): Json<QueryRequest>) -> impl IntoResponse {
    let reply = handle_query(&state.orchestrator, req).await;
    (status_for(&reply), Json(reply))
}

/// POST /api/query/confirm
async fn confirm(State(state): State<AppState>, Json(req): Json<ConfirmRequest>) -> impl IntoResponse {
    let reply = QueryReply::Single(handle_confirm(&state.orchestrator, req).await);
    (status_for(&reply), Json(reply))
}

/// GET /api/functions
async fn list_functions(State(state): State<AppState>) -> Json<FunctionsResponse> {
    Json(FunctionsResponse {
        functions: state.orchestrator.registry().catalogue(),
    })
}

/// GET /api/health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model: state.orchestrator.oracle_model().to_string(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Pipeline failures are answers, not transport errors; only a malformed
/// request is a 400.
fn status_for(reply: &QueryReply) -> StatusCode {
    match reply {
        QueryReply::Single(r) if r.error_kind.as_deref() == Some(INVALID_REQUEST) => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    }
}
