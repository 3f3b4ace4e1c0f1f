use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use super::connection::handle_socket;
use crate::auth;
use crate::server::GameServer;

/// WebSocket endpoint. The bearer token (Authorization header or `token`
/// query parameter) is verified before the upgrade; a failed handshake
/// never reaches the socket loop.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(server): State<Arc<GameServer>>,
    headers: HeaderMap,
) -> Response {
    let token = auth::token_from_handshake(&headers, params.get("token").map(String::as_str));
    let claims = match token.ok_or(auth::AuthError::MissingToken).and_then(|token| {
        auth::verify(&server.config().auth.jwt_secret, token)
    }) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::warn!(error = %err, "WebSocket handshake rejected");
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };

    let user = claims.brief();
    ws.on_upgrade(move |socket| handle_socket(socket, server, user))
}
