use std::sync::Arc;

use tokio::sync::Mutex;

use super::GameServer;
use crate::metrics::ServerMetrics;
use crate::protocol::{
    messages::{RoomCreatePayload, RoomJoinPayload},
    room_codes, ServerEvent, SessionError, UserBrief,
};
use crate::room::Room;

impl GameServer {
    /// `room:create`: seat the caller in a fresh room. A client-supplied
    /// seed is normalized and used when free; a colliding or absent seed
    /// falls back to generated codes. The caller must not already be in a
    /// room.
    pub(crate) async fn handle_room_create(
        &self,
        user: &UserBrief,
        payload: RoomCreatePayload,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        if self.room_by_user.contains_key(&user.user_id) {
            return Err(SessionError::AlreadyInARoom);
        }

        let seed = match payload.room_id {
            Some(raw) => {
                let code = room_codes::normalize_room_code(&raw);
                if !room_codes::validate_room_code(&code) {
                    return Err(SessionError::InvalidRoom);
                }
                Some(code)
            }
            None => None,
        };

        let code = self.claim_room_code(seed);
        let room = Arc::new(Mutex::new(Room::new(
            code.clone(),
            self.config.session.initial_clock_ms,
        )));
        self.rooms.insert(code.clone(), room.clone());

        let mut room = room.lock().await;
        room.join(user.clone(), self.now_ms())?;
        self.room_by_user.insert(user.user_id.clone(), code.clone());

        let state = room.room_state(|id| self.presence.is_online(id));
        self.broadcast_to_room(&room, Arc::new(ServerEvent::RoomState(state.clone())));

        ServerMetrics::increment(&self.metrics.rooms_created);
        tracing::info!(user_id = %user.user_id, room_code = %code, "Room created");
        Ok(Some(serde_json::to_value(state).map_err(|_| SessionError::InvalidPayload)?))
    }

    /// `room:join`: take the second seat. Re-joining one's own room re-acks
    /// the current state; joining while seated elsewhere is rejected. When
    /// the room fills, the game auto-starts and both players get
    /// `game:start` plus the opening snapshot.
    pub(crate) async fn handle_room_join(
        &self,
        user: &UserBrief,
        payload: RoomJoinPayload,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        let code = room_codes::normalize_room_code(
            payload.room_id.as_deref().ok_or(SessionError::InvalidRoom)?,
        );
        if !room_codes::validate_room_code(&code) {
            return Err(SessionError::InvalidRoom);
        }

        if let Some(current) = self.user_room_code(&user.user_id) {
            if current != code {
                return Err(SessionError::LeaveCurrentRoomFirst);
            }
            let room = self.room_arc(&code).ok_or(SessionError::RoomNoLongerExists)?;
            let room = room.lock().await;
            let state = room.room_state(|id| self.presence.is_online(id));
            return Ok(Some(
                serde_json::to_value(state).map_err(|_| SessionError::InvalidPayload)?,
            ));
        }

        let room = self.room_arc(&code).ok_or(SessionError::RoomNotFound)?;
        let mut room = room.lock().await;
        let outcome = room.join(user.clone(), self.now_ms())?;
        self.room_by_user.insert(user.user_id.clone(), code.clone());
        ServerMetrics::increment(&self.metrics.rooms_joined);

        let state = room.room_state(|id| self.presence.is_online(id));
        self.broadcast_to_room(&room, Arc::new(ServerEvent::RoomState(state.clone())));

        if let Some(start) = outcome.started {
            ServerMetrics::increment(&self.metrics.games_started);
            tracing::info!(
                room_code = %code,
                white = %start.white.user_id,
                black = %start.black.user_id,
                "Game started"
            );
            self.broadcast_to_room(&room, Arc::new(ServerEvent::GameStart(start)));
            if let Some(snapshot) = room.snapshot(self.now_ms()) {
                self.broadcast_to_room(&room, Arc::new(ServerEvent::GameState(snapshot)));
            }
        }

        tracing::info!(user_id = %user.user_id, room_code = %code, "Player joined room");
        Ok(Some(serde_json::to_value(state).map_err(|_| SessionError::InvalidPayload)?))
    }

    /// `room:leave`: vacate the seat. A leaver seated in the game takes the
    /// game down with them; the remaining player is told who left and sees
    /// the room drop back to waiting. The room itself is destroyed once
    /// empty.
    pub(crate) async fn handle_room_leave(
        &self,
        user: &UserBrief,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        let code = self
            .user_room_code(&user.user_id)
            .ok_or(SessionError::NotInARoom)?;
        let Some(room) = self.room_arc(&code) else {
            // Stale index entry; clearing it achieves the caller's intent.
            self.room_by_user.remove(&user.user_id);
            return Ok(None);
        };

        let mut room = room.lock().await;
        let outcome = room.leave(&user.user_id);
        self.room_by_user.remove(&user.user_id);

        if outcome.game_dropped {
            self.broadcast_to_room(
                &room,
                Arc::new(ServerEvent::RoomError {
                    message: format!("{} left the room", user.username),
                }),
            );
        }
        if !room.is_empty() {
            let state = room.room_state(|id| self.presence.is_online(id));
            self.broadcast_to_room(&room, Arc::new(ServerEvent::RoomState(state)));
        } else {
            self.rooms.remove(&code);
            ServerMetrics::increment(&self.metrics.rooms_deleted);
            tracing::info!(room_code = %code, "Room destroyed");
        }

        tracing::info!(user_id = %user.user_id, room_code = %code, "Player left room");
        Ok(None)
    }

    /// `room:state`: current state of the caller's room.
    pub(crate) async fn handle_room_state(
        &self,
        user: &UserBrief,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        let code = self
            .user_room_code(&user.user_id)
            .ok_or(SessionError::NotInARoom)?;
        let room = self
            .room_arc(&code)
            .ok_or(SessionError::RoomNoLongerExists)?;
        let room = room.lock().await;
        let state = room.room_state(|id| self.presence.is_online(id));
        Ok(Some(serde_json::to_value(state).map_err(|_| SessionError::InvalidPayload)?))
    }

    /// Pick a free room code: the caller's seed when unclaimed, otherwise
    /// fresh generated codes until one is free.
    fn claim_room_code(&self, seed: Option<String>) -> String {
        if let Some(code) = seed {
            if !self.rooms.contains_key(&code) {
                return code;
            }
            tracing::debug!(room_code = %code, "Seed code collides; generating fresh");
        }
        loop {
            let code = room_codes::generate_room_code(self.config.session.room_code_length);
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }
}
