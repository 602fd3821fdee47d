//! Health and readiness handlers.

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use mflow_media::ProcessToolRunner;

/// GET /health — liveness.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// GET /ready — readiness: the external tool binaries must resolve.
pub async fn ready() -> (StatusCode, Json<Value>) {
    match ProcessToolRunner::check_tools() {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "detail": e.to_string() })),
        ),
    }
}
