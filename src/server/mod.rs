//! HTTP surface of the analysis service
//!
//! - `POST /analyze` multipart document upload, returns the structured report
//! - `GET /health` liveness probe

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::assistant::RunOrchestrator;

pub mod error;
pub mod handlers;

pub use error::ApiError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RunOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: RunOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/analyze", post(handlers::analyze))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
