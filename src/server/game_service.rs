use std::sync::Arc;

use super::GameServer;
use crate::metrics::ServerMetrics;
use crate::protocol::{messages::MovePayload, ServerEvent, SessionError, UserBrief};
use crate::room::Room;

impl GameServer {
    /// `game:state`: the authoritative snapshot at this moment. Folding the
    /// clock here is what makes timeouts observable without any server-side
    /// timer; the first request that sees a terminal status also announces
    /// `game:over` to the room.
    pub(crate) async fn handle_game_state(
        &self,
        user: &UserBrief,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        let code = self
            .user_room_code(&user.user_id)
            .ok_or(SessionError::NotInARoom)?;
        let room = self
            .room_arc(&code)
            .ok_or(SessionError::RoomNoLongerExists)?;
        let mut room = room.lock().await;

        let now = self.now_ms();
        self.announce_game_over(&mut room, now);
        let snapshot = room.snapshot(now).ok_or(SessionError::GameNotStarted)?;
        Ok(Some(
            serde_json::to_value(snapshot).map_err(|_| SessionError::InvalidPayload)?,
        ))
    }

    /// `chess:move`: validate and apply a move, then fan the result out.
    /// All pre-checks happen inside the room's serialization domain; a move
    /// racing a timeout always observes the folded clock first.
    pub(crate) async fn handle_chess_move(
        &self,
        user: &UserBrief,
        payload: MovePayload,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        let code = self
            .user_room_code(&user.user_id)
            .ok_or(SessionError::NotInARoom)?;
        let room = self
            .room_arc(&code)
            .ok_or(SessionError::RoomNoLongerExists)?;
        let mut room = room.lock().await;

        let now = self.now_ms();
        let applied = room.apply_move(
            &user.user_id,
            payload.from.as_deref().unwrap_or(""),
            payload.to.as_deref().unwrap_or(""),
            payload.promotion.as_deref(),
            now,
        );

        match applied {
            Ok(applied) => {
                ServerMetrics::increment(&self.metrics.moves_applied);
                tracing::debug!(
                    room_code = %code,
                    user_id = %user.user_id,
                    san = %applied.result.san,
                    "Move applied"
                );
                self.broadcast_to_room(&room, Arc::new(ServerEvent::Move(applied.result.clone())));
                if applied.snapshot.status.is_terminal() {
                    self.announce_game_over(&mut room, now);
                }
                Ok(Some(
                    serde_json::to_value(applied.result)
                        .map_err(|_| SessionError::InvalidPayload)?,
                ))
            }
            Err(SessionError::GameAlreadyOver) => {
                // The rejected mover (and everyone else) gets the terminal
                // snapshot alongside the ack error.
                if !self.announce_game_over(&mut room, now) {
                    if let Some(snapshot) = room.snapshot(now) {
                        self.broadcast_to_room(&room, Arc::new(ServerEvent::GameOver(snapshot)));
                    }
                }
                ServerMetrics::increment(&self.metrics.moves_rejected);
                Err(SessionError::GameAlreadyOver)
            }
            Err(err) => {
                ServerMetrics::increment(&self.metrics.moves_rejected);
                Err(err)
            }
        }
    }

    /// Broadcast `game:over` the first time a terminal snapshot is observed,
    /// whichever event discovers it. Returns whether this call announced.
    pub(crate) fn announce_game_over(&self, room: &mut Room, now_ms: i64) -> bool {
        let Some(snapshot) = room.terminal_announcement(now_ms) else {
            return false;
        };
        ServerMetrics::increment(&self.metrics.games_completed);
        tracing::info!(
            room_code = %snapshot.room_id,
            status = ?snapshot.status,
            winner = ?snapshot.winner_color,
            "Game over"
        );
        self.broadcast_to_room(room, Arc::new(ServerEvent::GameOver(snapshot)));
        true
    }
}
