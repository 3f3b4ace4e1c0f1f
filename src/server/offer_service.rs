use std::sync::Arc;

use serde_json::json;
use tokio::sync::{Mutex, MutexGuard};

use super::GameServer;
use crate::metrics::ServerMetrics;
use crate::protocol::{GameStartBody, OfferStatusBody, ServerEvent, SessionError, UserBrief};
use crate::room::{DrawOutcome, RematchOutcome, Room};

impl GameServer {
    /// `game:draw:request`: record the offer, nudge the opponent directly,
    /// and tell the room an offer is pending. Repeating the request is
    /// idempotent.
    pub(crate) async fn handle_draw_request(
        &self,
        user: &UserBrief,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        let room = self.room_of(user)?;
        let mut room = room.lock().await;
        let opponent = room.propose_draw(&user.user_id, self.now_ms())?;

        self.send_event_to_user(
            &opponent.user_id,
            Arc::new(ServerEvent::DrawRequested { from: user.clone() }),
        );
        self.broadcast_to_room(
            &room,
            Arc::new(ServerEvent::DrawStatus(OfferStatusBody {
                status: "requested".to_string(),
                message: Some(format!("{} offered a draw", user.username)),
                by: Some(user.user_id.clone()),
            })),
        );
        Ok(Some(json!({ "waitingFor": opponent.user_id })))
    }

    /// `game:draw:respond`: accept ends the game as an agreed draw;
    /// decline clears the pending offer for both sides.
    pub(crate) async fn handle_draw_respond(
        &self,
        user: &UserBrief,
        accept: bool,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        let room = self.room_of(user)?;
        let mut room = room.lock().await;
        let now = self.now_ms();

        match room.respond_draw(&user.user_id, accept, now)? {
            DrawOutcome::Accepted(_) => {
                ServerMetrics::increment(&self.metrics.draws_agreed);
                self.announce_game_over(&mut room, now);
                Ok(Some(json!({ "accepted": true })))
            }
            DrawOutcome::Declined => {
                self.broadcast_to_room(
                    &room,
                    Arc::new(ServerEvent::DrawStatus(OfferStatusBody {
                        status: "declined".to_string(),
                        message: Some(format!("{} declined the draw", user.username)),
                        by: Some(user.user_id.clone()),
                    })),
                );
                Ok(Some(json!({ "accepted": false })))
            }
        }
    }

    /// `game:rematch:request`: only after game over. When the opponent's
    /// request is already pending, both sides have agreed and the fresh game
    /// starts right away.
    pub(crate) async fn handle_rematch_request(
        &self,
        user: &UserBrief,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        let room = self.room_of(user)?;
        let mut room = room.lock().await;

        match room.propose_rematch(&user.user_id, self.now_ms())? {
            RematchOutcome::Requested { opponent } => {
                self.send_event_to_user(
                    &opponent.user_id,
                    Arc::new(ServerEvent::RematchRequested { from: user.clone() }),
                );
                self.broadcast_to_room(
                    &room,
                    Arc::new(ServerEvent::RematchStatus(OfferStatusBody {
                        status: "requested".to_string(),
                        message: Some(format!("{} wants a rematch", user.username)),
                        by: Some(user.user_id.clone()),
                    })),
                );
                Ok(Some(json!({ "waitingFor": opponent.user_id })))
            }
            RematchOutcome::Started(start) => {
                self.emit_rematch_start(&mut room, start);
                Ok(Some(json!({ "started": true })))
            }
            RematchOutcome::Declined => Err(SessionError::NoRematchRequest),
        }
    }

    /// `game:rematch:respond`: accept restarts with re-randomized colors;
    /// decline clears the pending set on every path.
    pub(crate) async fn handle_rematch_respond(
        &self,
        user: &UserBrief,
        accept: bool,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        let room = self.room_of(user)?;
        let mut room = room.lock().await;

        match room.respond_rematch(&user.user_id, accept, self.now_ms())? {
            RematchOutcome::Started(start) => {
                self.emit_rematch_start(&mut room, start);
                Ok(Some(json!({ "started": true })))
            }
            RematchOutcome::Declined => {
                self.broadcast_to_room(
                    &room,
                    Arc::new(ServerEvent::RematchStatus(OfferStatusBody {
                        status: "declined".to_string(),
                        message: Some(format!("{} declined the rematch", user.username)),
                        by: Some(user.user_id.clone()),
                    })),
                );
                Ok(None)
            }
            RematchOutcome::Requested { .. } => Err(SessionError::NoRematchRequest),
        }
    }

    fn emit_rematch_start(&self, room: &mut MutexGuard<'_, Room>, start: GameStartBody) {
        ServerMetrics::increment(&self.metrics.rematches_started);
        ServerMetrics::increment(&self.metrics.games_started);
        tracing::info!(
            room_code = %start.room_id,
            white = %start.white.user_id,
            black = %start.black.user_id,
            "Rematch started"
        );
        self.broadcast_to_room(
            room,
            Arc::new(ServerEvent::RematchStatus(OfferStatusBody {
                status: "started".to_string(),
                message: None,
                by: None,
            })),
        );
        self.broadcast_to_room(room, Arc::new(ServerEvent::GameStart(start)));
        if let Some(snapshot) = room.snapshot(self.now_ms()) {
            self.broadcast_to_room(room, Arc::new(ServerEvent::GameState(snapshot)));
        }
    }

    /// Resolve the caller's room handle via the user index.
    fn room_of(&self, user: &UserBrief) -> Result<Arc<Mutex<Room>>, SessionError> {
        let code = self
            .user_room_code(&user.user_id)
            .ok_or(SessionError::NotInARoom)?;
        self.room_arc(&code).ok_or(SessionError::RoomNoLongerExists)
    }
}
