use super::GameServer;
use crate::protocol::{AckFrame, ClientEvent, ClientFrame, ConnId, SessionError};

impl GameServer {
    /// Route one inbound frame to its handler and produce the single
    /// acknowledgment. Unknown connections (already unregistered) drop the
    /// frame; everything else acks exactly once when a `seq` was supplied.
    pub async fn handle_frame(&self, conn_id: ConnId, frame: ClientFrame) -> Option<AckFrame> {
        let handle = self.handle_of(conn_id)?;
        let user = handle.user;
        let seq = frame.seq;

        let result = match ClientEvent::parse(&frame.event, frame.data) {
            Ok(event) => self.dispatch(&user, event).await,
            Err(err) => {
                tracing::warn!(
                    %conn_id,
                    user_id = %user.user_id,
                    event = %frame.event,
                    "Rejected client frame: {err}"
                );
                Err(err)
            }
        };

        match (result, seq) {
            (Ok(data), Some(seq)) => Some(AckFrame::success(seq, data)),
            (Err(err), Some(seq)) => Some(AckFrame::failure(seq, &err)),
            _ => None,
        }
    }

    async fn dispatch(
        &self,
        user: &crate::protocol::UserBrief,
        event: ClientEvent,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        match event {
            ClientEvent::RoomCreate(payload) => self.handle_room_create(user, payload).await,
            ClientEvent::RoomJoin(payload) => self.handle_room_join(user, payload).await,
            ClientEvent::RoomLeave => self.handle_room_leave(user).await,
            ClientEvent::RoomState => self.handle_room_state(user).await,
            ClientEvent::GameState => self.handle_game_state(user).await,
            ClientEvent::ChessMove(payload) => self.handle_chess_move(user, payload).await,
            ClientEvent::InviteSend(payload) => self.handle_invite_send(user, payload).await,
            ClientEvent::RematchRequest => self.handle_rematch_request(user).await,
            ClientEvent::RematchRespond(payload) => {
                self.handle_rematch_respond(user, payload.accept).await
            }
            ClientEvent::DrawRequest => self.handle_draw_request(user).await,
            ClientEvent::DrawRespond(payload) => {
                self.handle_draw_respond(user, payload.accept).await
            }
        }
    }
}
