//! HTTP server bootstrap for the enrollment service.
//!
//! This module wires together:
//! - configuration
//! - database connection pool
//! - core services (enrollment, progress, access policy)
//! - the Axum router

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use crate::infra::{
    HttpCourseCatalog, PgCourseProgressStore, PgEnrollmentStore, PgLearningProgressStore,
};
use crate::service::{AccessPolicy, EnrollmentService, ProgressService};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Course catalog base URL.
    pub course_catalog_url: String,
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Maximum database connections.
    pub max_connections: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/opencourse_enrollment".to_string());

        let course_catalog_url = std::env::var("COURSE_CATALOG_URL")
            .unwrap_or_else(|_| "http://localhost:8081".to_string());

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid listen address {host}:{port}: {e}"))?;

        let max_connections: u32 = std::env::var("MAX_DB_CONNECTIONS")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            database_url,
            course_catalog_url,
            listen_addr,
            max_connections,
        })
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub enrollments: Arc<EnrollmentService>,
    pub progress: Arc<ProgressService>,
    pub pool: PgPool,
}

impl AppState {
    /// Wire up the service graph on top of a connection pool.
    pub fn build(pool: PgPool, catalog_url: &str) -> anyhow::Result<Self> {
        let enrollment_store = Arc::new(PgEnrollmentStore::new(pool.clone()));
        let progress_store = Arc::new(PgLearningProgressStore::new(pool.clone()));
        let roll_up_store = Arc::new(PgCourseProgressStore::new(pool.clone()));
        let catalog = Arc::new(
            HttpCourseCatalog::new(catalog_url).map_err(|e| anyhow::anyhow!(e.to_string()))?,
        );
        let access = AccessPolicy::new(catalog.clone());

        let enrollments = Arc::new(EnrollmentService::new(
            enrollment_store.clone(),
            roll_up_store.clone(),
            catalog,
            access.clone(),
        ));
        let progress = Arc::new(ProgressService::new(
            enrollment_store,
            progress_store,
            roll_up_store,
            access,
        ));

        Ok(Self {
            enrollments,
            progress,
            pool,
        })
    }
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    info!(
        "Starting OpenCourse enrollment service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Course catalog: {}", config.course_catalog_url);
    info!("  Max connections: {}", config.max_connections);

    info!("Connecting to PostgreSQL...");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Connected to PostgreSQL");

    let migrate_on_startup = std::env::var("DB_MIGRATE_ON_STARTUP")
        .ok()
        .map(|v| {
            !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off"
            )
        })
        .unwrap_or(true);
    if migrate_on_startup {
        info!("Running database migrations...");
        crate::migrations::run_postgres(&pool).await?;
        info!("Database migrations applied");
    } else {
        info!("DB migrations skipped (DB_MIGRATE_ON_STARTUP=0)");
    }

    let state = AppState::build(pool, &config.course_catalog_url)?;
    let app = build_router()?.with_state(state);

    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    info!("Enrollment service is ready to accept connections");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

fn build_router() -> anyhow::Result<Router<AppState>> {
    let mut router = Router::new()
        .nest("/api", crate::api::router())
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(TraceLayer::new_for_http());

    if let Some(cors_layer) = cors_layer_from_env()? {
        router = router.layer(cors_layer);
    }

    Ok(router)
}

fn cors_layer_from_env() -> anyhow::Result<Option<CorsLayer>> {
    let origins = match std::env::var("CORS_ALLOW_ORIGINS") {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let origins = origins.trim();
    if origins.is_empty() {
        return Ok(None);
    }

    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {s:?}: {e}"))
            })
            .collect::<anyhow::Result<_>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([axum::http::header::AUTHORIZATION, axum::http::header::CONTENT_TYPE]),
    ))
}

/// Health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "service": "opencourse-enrollment",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check endpoint.
async fn readiness_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::Json<serde_json::Value>, (axum::http::StatusCode, String)> {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => Ok(axum::Json(serde_json::json!({
            "status": "ready",
            "database": "connected",
        }))),
        Err(e) => Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            format!("Database unavailable: {e}"),
        )),
    }
}
