use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod media;
pub mod models;
pub mod pipeline;
pub mod profile;
pub mod repository;
pub mod staging;

// Module for routing segregation (Public, Authenticated, Upload).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public, upload};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use media::{CloudinaryClient, MediaState, MockMediaService};
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Auto-generated OpenAPI document, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::upload_photo, handlers::get_me),
    components(schemas(models::User, error::ErrorResponse, error::ErrorBody)),
    modifiers(&BearerSecurity),
    tags(
        (name = "blog-api", description = "Blog backend: authentication and profile photo upload")
    )
)]
struct ApiDoc;

/// Registers the `bearer` scheme referenced by the handlers' `security(...)` attributes.
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// The single, cheaply clonable container of every collaborator a request may need.
#[derive(Clone)]
pub struct AppState {
    /// Identity storage (users + pending photo updates).
    pub repo: RepositoryState,
    /// Remote media-hosting service.
    pub media: MediaState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for MediaState {
    fn from_ref(app_state: &AppState) -> MediaState {
        app_state.media.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards `authenticated_routes`. Extracting `AuthUser` runs the credential stages; any
/// failure rejects the request with the matching `ApiError` before the handler. On success
/// the identity is attached to the request for downstream handlers.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware, and registers the
/// application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let max_upload_bytes = state.config.max_upload_bytes;

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(upload::upload_routes(max_upload_bytes))
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .fallback(handlers::not_found)
        .with_state(state);

    // 3. Observability and Correlation Layers (outermost first)
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of one request carries its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
