use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::protocol::{ClientFrame, Outbound, UserBrief};
use crate::server::GameServer;

/// Per-connection loop: register with the gateway, pump outbound frames
/// from the connection queue, and feed inbound frames through the router.
/// Either half closing tears the connection down.
pub(super) async fn handle_socket(socket: WebSocket, server: Arc<GameServer>, user: UserBrief) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(server.config().session.send_queue_capacity);

    let conn_id = server.register_connection(user.clone(), tx).await;
    tracing::info!(%conn_id, user_id = %user.user_id, "WebSocket connection established");

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match &frame {
                Outbound::Event(event) => serde_json::to_string(event.as_ref()),
                Outbound::Ack(ack) => serde_json::to_string(ack),
            };
            let text = match text {
                Ok(text) => text,
                Err(err) => {
                    tracing::error!(error = %err, "Failed to serialize outbound frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let server_recv = server.clone();
    let receive_task = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            let message = match message {
                Ok(message) => message,
                Err(err) => {
                    tracing::debug!(%conn_id, error = %err, "WebSocket read error");
                    break;
                }
            };
            match message {
                Message::Text(text) => {
                    let frame: ClientFrame = match serde_json::from_str(&text) {
                        Ok(frame) => frame,
                        Err(err) => {
                            // No seq to ack; answer with a room:error frame
                            // rather than dropping silently.
                            tracing::warn!(%conn_id, error = %err, "Unparseable client frame");
                            server_recv.send_error_to_conn(conn_id, "Invalid payload");
                            continue;
                        }
                    };
                    if let Some(ack) = server_recv.handle_frame(conn_id, frame).await {
                        server_recv.send_ack(conn_id, ack);
                    }
                }
                Message::Close(_) => {
                    tracing::info!(%conn_id, "WebSocket connection closed");
                    break;
                }
                // Pings are answered at the protocol layer by axum.
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {}
        _ = receive_task => {}
    }

    server.unregister_connection(conn_id).await;
}
