use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router, debug_handler,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use tracing::warn;

use crate::{AppState, relay::Relay};

const READY_TIMEOUT: Duration = Duration::from_secs(2);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(up))
        .route("/health/live", get(up))
        .route("/health/info", get(info))
        .route("/health/ready", get(ready))
}

#[debug_handler]
async fn up() -> impl IntoResponse {
    Json(json!({ "status": "UP" }))
}

#[debug_handler]
async fn info() -> impl IntoResponse {
    Json(json!({
        "app": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }
    }))
}

#[debug_handler(state = AppState)]
async fn ready(State(relay): State<Arc<Relay>>) -> impl IntoResponse {
    let reason = match tokio::time::timeout(READY_TIMEOUT, relay.ping_store()).await {
        Ok(Ok(())) => return (StatusCode::OK, Json(json!({ "status": "UP" }))),
        Ok(Err(err)) => {
            warn!(%err, "readiness check failed");
            "Database connection failed"
        }
        Err(_) => {
            warn!(timeout = ?READY_TIMEOUT, "readiness check timed out");
            "Database ping timed out"
        }
    };

    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "DOWN", "reason": reason })),
    )
}
