//! HTTP API gateway for DevPilot.
//!
//! Exposes the health check and the v1 API (chat, tool catalogue,
//! session transcripts). Built on Axum.

pub mod api_v1;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{Method, StatusCode, header},
    middleware::{self, Next},
    response::Json,
    routing::get,
};
use devpilot_agent::Assistant;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

pub use api_v1::{ApiV1State, SharedApiState};

/// How often idle sessions are swept from memory.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Build the full router.
///
/// Layers applied:
/// - Bearer token authentication on all /v1 routes (when tokens are configured)
/// - CORS for browser clients
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedApiState) -> Router {
    let v1 = api_v1::v1_router(state.clone()).layer(middleware::from_fn_with_state(state, auth_middleware));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", v1)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: devpilot_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let assistant = Arc::new(devpilot_agent::build_assistant(&config)?);
    spawn_session_sweeper(assistant.clone());

    if config.gateway.api_tokens.is_empty() {
        warn!("No gateway.api_tokens configured; /v1 is open to anyone who can reach {addr}");
    }

    let state = Arc::new(ApiV1State {
        assistant,
        bearer_tokens: config.gateway.api_tokens.clone(),
    });
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn spawn_session_sweeper(assistant: Arc<Assistant>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let evicted = assistant.sweep_sessions().await;
            if evicted > 0 {
                debug!(evicted, "Session sweep finished");
            }
        }
    });
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "DevPilot LLM Agent API is running.",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Bearer token check for /v1 routes. No configured tokens means open access.
async fn auth_middleware(
    State(state): State<SharedApiState>,
    req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    if state.bearer_tokens.is_empty() {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match auth_header {
        Some(token) if state.bearer_tokens.iter().any(|t| t == token) => Ok(next.run(req).await),
        _ => {
            warn!("Unauthorized request to /v1 API, missing or invalid bearer token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
