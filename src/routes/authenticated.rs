use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Every handler here runs after the auth middleware, which resolves the bearer token to an
/// `AuthUser` and inserts it into the request extensions. A request that fails any credential
/// stage never reaches these handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/users/me
        // The identity attached to this request by the middleware.
        .route("/api/users/me", get(handlers::get_me))
}
