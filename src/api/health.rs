//! Health check endpoints

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub extractor: bool,
}

/// Health check - always returns OK if the server is running
async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - verifies the extractor can be invoked
async fn readyz(State(state): State<AppState>) -> Json<ReadyResponse> {
    let extractor = state.extractor.clone();
    let extractor_ok = tokio::task::spawn_blocking(move || extractor.is_available())
        .await
        .unwrap_or(false);

    Json(ReadyResponse {
        ready: extractor_ok,
        extractor: extractor_ok,
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}
