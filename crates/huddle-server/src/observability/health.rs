//! Liveness endpoint.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Health routes, to be merged into the server's root router.
pub fn health_router() -> Router {
    Router::new().route("/health", get(health))
}
