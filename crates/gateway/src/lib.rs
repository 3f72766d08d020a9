//! HTTP gateway for DocChat.
//!
//! Serves the embedded web UI at `/`, a health check, and the v1 session
//! API under `/v1`. Built on Axum.

pub mod api_v1;
pub mod frontend;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    response::Json,
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use docchat_agent::SessionFactory;

/// Build the full router: health, v1 API, frontend, CORS and tracing.
///
/// Cross-origin requests are only allowed from `allowed_origin`, which is
/// the gateway's own address when started via [`start`].
pub fn build_router(api_state: api_v1::SharedApiState, allowed_origin: Option<HeaderValue>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));
    let cors = match allowed_origin {
        Some(origin) => cors.allow_origin(AllowOrigin::exact(origin)),
        None => cors,
    };

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(api_state))
        .merge(frontend::frontend_router())
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// The Gemini client is built once and shared by every session. If it
/// cannot be built the server still starts and every session reports the
/// reason as disconnected.
pub async fn start(config: docchat_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let host = config.gateway.host.clone();
    let port = config.gateway.port;
    let addr = format!("{host}:{port}");

    let factory = SessionFactory::from_config(&config);
    if !factory.is_connected() {
        warn!("Gateway starting without a Gemini connection; run `docchat init` and set an API key");
    }

    let api_state = Arc::new(api_v1::ApiV1State::new(
        factory,
        config.gateway.max_sessions,
    ));
    let origin = HeaderValue::from_str(&format!("http://{addr}")).ok();
    let app = build_router(api_state, origin);

    info!(addr = %addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
