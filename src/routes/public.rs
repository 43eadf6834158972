use crate::AppState;
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints that need no credential.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Load balancer / monitoring health check. Answers "ok" without touching any collaborator.
        .route("/health", get(|| async { "ok" }))
}
