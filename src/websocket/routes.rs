use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use super::handler::websocket_handler;
use crate::server::GameServer;

/// Build the HTTP router: the WebSocket endpoint, a JSON metrics view and a
/// plain-text fallback.
pub fn create_router(cors_origins: &str) -> Router<Arc<GameServer>> {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(|| async { "Gambit chess session server. Connect via /ws with a bearer token." })
        .layer(cors_layer(cors_origins))
}

/// Counters as JSON.
pub async fn metrics_handler(State(server): State<Arc<GameServer>>) -> impl IntoResponse {
    Json(server.metrics().snapshot())
}

/// CORS policy from the comma-separated origin list. `*` opens the server
/// up entirely; otherwise each entry must parse as a header value, and an
/// empty result falls back to open so a typo cannot lock every client out.
fn cors_layer(cors_origins: &str) -> CorsLayer {
    if cors_origins.trim() == "*" {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = cors_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Dropping unparseable CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        tracing::warn!("CORS origin list resolved to nothing; allowing any origin");
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}
