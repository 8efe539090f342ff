//! # Scribe HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /stages` - List demo stages
//! - `POST /sessions` - Open a demo session
//! - `GET|DELETE /sessions/{id}` - Inspect or end a session
//! - `POST /sessions/{id}/next|previous|reset` - Navigate stages
//! - `PUT /sessions/{id}/post` - Edit the draft
//! - `POST /sessions/{id}/generate/content` - Generate a post body
//! - `GET /sessions/{id}/generate/stream` - Stream a post body (SSE)
//! - `POST /sessions/{id}/generate/image` - Generate a header image
//! - `POST /sessions/{id}/generate/speech` - Narrate the draft
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `SCRIBE_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `SCRIBE_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `SCRIBE_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::get_api_key_from_env;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    AUDIO_CONTENT_TYPE, GenerateContentRequest, GenerateContentResponse, GenerateImageRequest,
    GenerateImageResponse, GenerateSpeechRequest, HealthResponse, SessionResponse, SpeechQuery,
    SpeechResponse, StageInfo, StagesResponse, StreamFragment, StreamQuery, UpdatePostRequest,
};

use crate::config::Config;
use crate::openai::OpenAiClient;
use crate::session::SessionStore;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post, put},
};
use scribe_core::ScribeError;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size (5 MiB).
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the session store and the AI client.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub client: OpenAiClient,
}

impl AppState {
    #[must_use]
    pub fn new(sessions: SessionStore, client: OpenAiClient) -> Self {
        Self { sessions, client }
    }

    /// Build state from configuration. Fails when no API key is configured.
    pub fn from_config(config: &Config) -> Result<Self, ScribeError> {
        let client = OpenAiClient::new(&config.openai)
            .map_err(|e| ScribeError::Config(e.to_string()))?;
        let sessions = SessionStore::new(config.features, config.server.max_sessions)
            .with_idle_timeout(config.server.session_idle_timeout());
        Ok(Self::new(sessions, client))
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build CORS layer from `SCRIBE_CORS_ORIGINS`.
///
/// `*` allows every origin, a comma-separated list allows those origins, and
/// an unset or unusable value allows localhost only.
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("SCRIBE_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (SCRIBE_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in SCRIBE_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(CORS_METHODS)
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No SCRIBE_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Restrictive CORS layer for local development front ends.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:5173",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:5173",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting (if enabled)
/// 5. Authentication (if configured)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set SCRIBE_API_KEY environment variable to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/stages", get(handlers::stages_handler))
        .route("/sessions", post(handlers::create_session_handler))
        .route(
            "/sessions/{id}",
            get(handlers::get_session_handler).delete(handlers::delete_session_handler),
        )
        .route("/sessions/{id}/next", post(handlers::next_handler))
        .route("/sessions/{id}/previous", post(handlers::previous_handler))
        .route("/sessions/{id}/reset", post(handlers::reset_handler))
        .route("/sessions/{id}/post", put(handlers::update_post_handler))
        .route(
            "/sessions/{id}/generate/content",
            post(handlers::generate_content_handler),
        )
        .route(
            "/sessions/{id}/generate/stream",
            get(handlers::stream_content_handler),
        )
        .route(
            "/sessions/{id}/generate/image",
            post(handlers::generate_image_handler),
        )
        .route(
            "/sessions/{id}/generate/speech",
            post(handlers::generate_speech_handler),
        );

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server on the configured address.
pub async fn run_server(config: &Config) -> Result<(), ScribeError> {
    config.openai.api_key()?;
    let state = AppState::from_config(config)?;
    let sweeper = spawn_session_sweeper(state.sessions.clone());
    let router = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ScribeError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Scribe HTTP server listening on {}", addr);

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ScribeError::IoError(format!("Server error: {}", e)));

    if let Some(handle) = sweeper {
        handle.abort();
    }
    result
}

/// Periodically evict idle sessions so they do not hold memory until the
/// next `POST /sessions`.
fn spawn_session_sweeper(sessions: SessionStore) -> Option<tokio::task::JoinHandle<()>> {
    let timeout = sessions.idle_timeout()?;
    let period = (timeout / 4).max(Duration::from_secs(1));
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle().await;
            if evicted > 0 {
                tracing::debug!(evicted, "Idle sessions swept");
            }
        }
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
