use std::sync::Arc;

use serde_json::json;

use super::GameServer;
use crate::metrics::ServerMetrics;
use crate::protocol::{
    messages::InvitePayload, room_codes, InviteReceivedBody, ServerEvent, SessionError, UserBrief,
};

impl GameServer {
    /// `invite:send`: invite a friend into the caller's room. The checks
    /// run in a fixed order: target present, not self, room resolvable,
    /// caller seated, friendship accepted, target online. The friendship
    /// lookup happens with no room lock held.
    pub(crate) async fn handle_invite_send(
        &self,
        user: &UserBrief,
        payload: InvitePayload,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        let to_user_id = payload
            .to_user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(SessionError::MissingTargetUser)?
            .to_string();
        if to_user_id == user.user_id {
            ServerMetrics::increment(&self.metrics.invites_rejected);
            return Err(SessionError::CannotInviteSelf);
        }

        let code = payload
            .room_id
            .as_deref()
            .map(room_codes::normalize_room_code)
            .or_else(|| self.user_room_code(&user.user_id))
            .ok_or(SessionError::CreateOrJoinRoomFirst)?;
        let room = self
            .room_arc(&code)
            .ok_or(SessionError::CreateOrJoinRoomFirst)?;

        // Seating check under the room lock; released before the social
        // graph I/O below.
        {
            let room = room.lock().await;
            if !room.is_seated(&user.user_id) {
                ServerMetrics::increment(&self.metrics.invites_rejected);
                return Err(SessionError::NotInThatRoom);
            }
        }

        let accepted = match self.social.are_friends(&user.user_id, &to_user_id).await {
            Ok(accepted) => accepted,
            Err(err) => {
                // Lookup failures deny rather than leak invites to strangers.
                tracing::warn!(
                    user_id = %user.user_id,
                    to_user_id = %to_user_id,
                    error = %err,
                    "Friendship lookup failed"
                );
                false
            }
        };
        if !accepted {
            ServerMetrics::increment(&self.metrics.invites_rejected);
            return Err(SessionError::NotFriends);
        }

        if !self.presence.is_online(&to_user_id) {
            ServerMetrics::increment(&self.metrics.invites_rejected);
            return Err(SessionError::FriendOffline);
        }

        let invite_link = compose_invite_link(&self.config.invite_origin, &code);
        self.send_event_to_user(
            &to_user_id,
            Arc::new(ServerEvent::InviteReceived(InviteReceivedBody {
                from: user.clone(),
                room_id: code.clone(),
                invite_link: invite_link.clone(),
            })),
        );
        ServerMetrics::increment(&self.metrics.invites_sent);
        tracing::info!(
            user_id = %user.user_id,
            to_user_id = %to_user_id,
            room_code = %code,
            "Invite delivered"
        );
        Ok(Some(json!({ "roomId": code, "inviteLink": invite_link })))
    }
}

/// `<origin>/?room=<urlencoded code>`.
fn compose_invite_link(origin: &str, code: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(code.as_bytes()).collect();
    format!("{}/?room={}", origin.trim_end_matches('/'), encoded)
}
