use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::metrics::ServerMetrics;
use crate::presence::Presence;
use crate::protocol::{ConnId, Outbound, ServerEvent, UserBrief, UserId};
use crate::room::Room;
use crate::social::SocialGraph;

mod game_service;
mod invite_service;
mod message_router;
mod messaging;
mod offer_service;
mod room_service;

/// A live socket: the authenticated identity plus the queue feeding its
/// writer task.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionHandle {
    pub user: UserBrief,
    pub sender: mpsc::Sender<Outbound>,
}

/// The socket gateway. Owns all shared mutable state: the room registry, the
/// user-to-room index, the connection table and presence. Rooms themselves
/// are serialized behind one mutex each; the registries are sharded maps.
/// Registry lookups always happen before a room lock is taken, and no room
/// lock is ever held across an await that isn't a queue push.
pub struct GameServer {
    config: AppConfig,
    rooms: DashMap<String, Arc<Mutex<Room>>>,
    room_by_user: DashMap<UserId, String>,
    connections: DashMap<ConnId, ConnectionHandle>,
    presence: Presence,
    social: Arc<dyn SocialGraph>,
    metrics: Arc<ServerMetrics>,
}

impl GameServer {
    pub fn new(config: AppConfig, social: Arc<dyn SocialGraph>) -> Arc<Self> {
        Arc::new(Self {
            config,
            rooms: DashMap::new(),
            room_by_user: DashMap::new(),
            connections: DashMap::new(),
            presence: Presence::new(),
            social,
            metrics: Arc::new(ServerMetrics::new()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    /// Current wall-clock in epoch milliseconds; the single now-source every
    /// clock-folding operation uses.
    pub(crate) fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Register an authenticated connection. The new socket is subscribed to
    /// the user's room (if any) and receives the current room and game state
    /// before anyone else hears about the connect.
    pub async fn register_connection(
        &self,
        user: UserBrief,
        sender: mpsc::Sender<Outbound>,
    ) -> ConnId {
        let conn_id = Uuid::new_v4();
        self.connections.insert(
            conn_id,
            ConnectionHandle {
                user: user.clone(),
                sender: sender.clone(),
            },
        );
        self.presence.connect(&user, conn_id);
        ServerMetrics::increment(&self.metrics.total_connections);
        ServerMetrics::increment(&self.metrics.active_connections);

        // Reconnect replay: this connection alone gets the room and game
        // snapshot it missed.
        if let Some(code) = self.user_room_code(&user.user_id) {
            if let Some(room) = self.room_arc(&code) {
                let mut room = room.lock().await;
                let state = room.room_state(|id| self.presence.is_online(id));
                self.send_to_sender(&sender, Outbound::Event(Arc::new(ServerEvent::RoomState(state))));
                let now = self.now_ms();
                if let Some(snapshot) = room.snapshot(now) {
                    self.send_to_sender(
                        &sender,
                        Outbound::Event(Arc::new(ServerEvent::GameState(snapshot))),
                    );
                }
            }
        }

        self.broadcast_online();
        tracing::info!(%conn_id, user_id = %user.user_id, "Connection registered");
        conn_id
    }

    /// Drop a connection. The user stays seated in their room (reconnect is
    /// permitted); teammates just see them go offline.
    pub async fn unregister_connection(&self, conn_id: ConnId) {
        let Some((_, handle)) = self.connections.remove(&conn_id) else {
            return;
        };
        ServerMetrics::decrement(&self.metrics.active_connections);
        ServerMetrics::increment(&self.metrics.disconnections);

        let user_id = handle.user.user_id.clone();
        let went_offline = self.presence.disconnect(&user_id, conn_id);
        if went_offline {
            if let Some(code) = self.user_room_code(&user_id) {
                if let Some(room) = self.room_arc(&code) {
                    let room = room.lock().await;
                    let state = room.room_state(|id| self.presence.is_online(id));
                    self.broadcast_to_room(&room, Arc::new(ServerEvent::RoomState(state)));
                }
            }
            self.broadcast_online();
        }
        tracing::info!(%conn_id, %user_id, went_offline, "Connection unregistered");
    }

    pub(crate) fn handle_of(&self, conn_id: ConnId) -> Option<ConnectionHandle> {
        self.connections.get(&conn_id).map(|h| h.clone())
    }

    pub(crate) fn user_room_code(&self, user_id: &str) -> Option<String> {
        self.room_by_user.get(user_id).map(|code| code.clone())
    }

    /// Clone the room handle out of the registry; the shard guard is dropped
    /// before the caller locks the room.
    pub(crate) fn room_arc(&self, code: &str) -> Option<Arc<Mutex<Room>>> {
        self.rooms.get(code).map(|room| room.value().clone())
    }

    /// Integration-test access to a room's serialization domain.
    pub fn room_handle(&self, code: &str) -> Option<Arc<Mutex<Room>>> {
        self.room_arc(code)
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    /// Register a connection directly, bypassing the WebSocket layer (used
    /// for testing).
    pub async fn connect_client(
        &self,
        user: UserBrief,
        sender: mpsc::Sender<Outbound>,
    ) -> ConnId {
        self.register_connection(user, sender).await
    }

    /// Drop every registry back to its initial state. Test hook; process
    /// lifetime state otherwise.
    pub fn reset(&self) {
        self.rooms.clear();
        self.room_by_user.clear();
        self.connections.clear();
        self.presence.clear();
    }
}
