use blog_api::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    media::{CloudinaryClient, MediaState},
    profile,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Initializes Configuration, Logging, Database, Media Service and the HTTP Server, in that
/// order. Any failure here is fatal; nothing is served from a half-built state.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise sensible defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "blog_api=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            // LOCAL: Pretty print output for human readability.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to apply database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. Media Service Initialization (Cloudinary)
    let cloudinary = CloudinaryClient::new(
        &config.cloudinary_api_url,
        &config.cloudinary_cloud_name,
        &config.cloudinary_api_key,
        &config.cloudinary_api_secret,
    )
    .expect("FATAL: Failed to build the Cloudinary HTTP client.");
    let media = Arc::new(cloudinary) as MediaState;

    // 6. Finish photo updates interrupted by a previous shutdown.
    match profile::resume_pending_updates(repo.as_ref(), media.as_ref()).await {
        Ok(0) => {}
        Ok(applied) => tracing::info!(applied, "resumed pending profile photo updates"),
        Err(e) => tracing::warn!(error = %e, "pending photo sweep failed; will retry next start"),
    }

    // 7. Unified State Assembly
    let port = config.port;
    let app_state = AppState {
        repo,
        media,
        config,
    };

    // 8. Router and Server Startup
    let app = create_router(app_state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {}", addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
