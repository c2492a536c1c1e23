//! Application state and HTTP router construction.
//!
//! Used by [main] and by the integration tests to build the Axum app.

use std::sync::Arc;

use axum::Router;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::Config;
use crate::services::Extractor;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub extractor: Arc<dyn Extractor>,
    /// Bounds the number of extractions running on the blocking pool.
    pub extraction_slots: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Config, extractor: Arc<dyn Extractor>) -> Self {
        let slots = config.max_concurrent_extractions.max(1);
        Self {
            config: Arc::new(config),
            extractor,
            extraction_slots: Arc::new(Semaphore::new(slots)),
        }
    }
}

/// Build the full Axum router: health endpoints, extraction API and layers.
/// Returns Router<()> (state fully applied) for use with axum::serve.
pub fn build_app(state: AppState) -> Router<()> {
    Router::new()
        .merge(api::health::router())
        .merge(api::extract::router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
