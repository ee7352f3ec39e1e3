//! Health check endpoints

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::db::PoolStatus;
use crate::http::server::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Pool snapshot response
#[derive(Serialize)]
pub struct PoolHealthResponse {
    pub status: &'static str,
    pub pool: PoolStatus,
}

/// GET /health - liveness only, never touches the database
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /health/pool
async fn pool_health(State(state): State<Arc<AppState>>) -> Json<PoolHealthResponse> {
    let status = if state.db.pool().is_closed() { "closed" } else { "ok" };
    Json(PoolHealthResponse {
        status,
        pool: state.db.status(),
    })
}

/// Health routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/health/pool", get(pool_health))
}
