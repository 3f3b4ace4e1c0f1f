use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::SessionError;
use super::types::{GameStatus, RoomPhase, Side, UserBrief};

/// Raw inbound frame: `{event, seq?, data?}`. `seq` correlates the single
/// acknowledgment the server returns for the frame.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default)]
    pub data: Value,
}

/// Payload of `room:create`. The seed is optional; the server generates a
/// code when it is absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreatePayload {
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoinPayload {
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub promotion: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitePayload {
    #[serde(default)]
    pub to_user_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RespondPayload {
    #[serde(default)]
    pub accept: bool,
}

/// Typed client event, produced from a [`ClientFrame`] by [`ClientEvent::parse`].
/// Each event name maps to exactly one handler; the dispatch table lives in
/// the server's message router.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    RoomCreate(RoomCreatePayload),
    RoomJoin(RoomJoinPayload),
    RoomLeave,
    RoomState,
    GameState,
    ChessMove(MovePayload),
    InviteSend(InvitePayload),
    RematchRequest,
    RematchRespond(RespondPayload),
    DrawRequest,
    DrawRespond(RespondPayload),
}

impl ClientEvent {
    /// Map an event name and payload to the typed event. Unknown names and
    /// malformed payloads are rejected before any handler runs.
    pub fn parse(event: &str, data: Value) -> Result<Self, SessionError> {
        fn payload<T: serde::de::DeserializeOwned + Default>(
            data: Value,
        ) -> Result<T, SessionError> {
            if data.is_null() {
                return Ok(T::default());
            }
            serde_json::from_value(data).map_err(|_| SessionError::InvalidPayload)
        }

        match event {
            "room:create" => Ok(ClientEvent::RoomCreate(payload(data)?)),
            "room:join" => Ok(ClientEvent::RoomJoin(payload(data)?)),
            "room:leave" => Ok(ClientEvent::RoomLeave),
            "room:state" => Ok(ClientEvent::RoomState),
            "game:state" => Ok(ClientEvent::GameState),
            "chess:move" => Ok(ClientEvent::ChessMove(payload(data)?)),
            "invite:send" => Ok(ClientEvent::InviteSend(payload(data)?)),
            "game:rematch:request" => Ok(ClientEvent::RematchRequest),
            "game:rematch:respond" => Ok(ClientEvent::RematchRespond(payload(data)?)),
            "game:draw:request" => Ok(ClientEvent::DrawRequest),
            "game:draw:respond" => Ok(ClientEvent::DrawRespond(payload(data)?)),
            _ => Err(SessionError::UnknownEvent),
        }
    }
}

/// One seat in a room as reported to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    pub user_id: String,
    pub username: String,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Side>,
}

/// `RoomState` data shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateBody {
    pub room_id: String,
    pub players: Vec<PlayerEntry>,
    pub status: RoomPhase,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClockBody {
    pub w: i64,
    pub b: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GamePlayers {
    pub white: UserBrief,
    pub black: UserBrief,
}

/// `GameSnapshot` data shape: the authoritative view of game + clock +
/// terminal status at a moment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshotBody {
    pub room_id: String,
    pub fen: String,
    pub turn: Side,
    pub is_check: bool,
    pub status: GameStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_color: Option<Side>,
    pub clock_ms: ClockBody,
    pub players: GamePlayers,
}

/// `MoveResult` data shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MoveResultBody {
    pub room_id: String,
    pub from: String,
    pub to: String,
    pub san: String,
    pub fen: String,
    pub turn: Side,
    pub by: UserBrief,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameStartBody {
    pub room_id: String,
    pub white: UserBrief,
    pub black: UserBrief,
    pub fen: String,
    pub turn: Side,
}

/// Status update for a pending draw or rematch offer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OfferStatusBody {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InviteReceivedBody {
    pub from: UserBrief,
    pub room_id: String,
    pub invite_link: String,
}

/// Server-push events, serialized on the wire as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Global online-user list, broadcast on every presence change.
    #[serde(rename = "presence:online")]
    PresenceOnline(Vec<UserBrief>),
    #[serde(rename = "room:state")]
    RoomState(RoomStateBody),
    #[serde(rename = "room:error")]
    RoomError { message: String },
    #[serde(rename = "game:start")]
    GameStart(GameStartBody),
    #[serde(rename = "game:state")]
    GameState(GameSnapshotBody),
    /// Terminal snapshot; emitted exactly once per game termination.
    #[serde(rename = "game:over")]
    GameOver(GameSnapshotBody),
    #[serde(rename = "chess:move")]
    Move(MoveResultBody),
    /// Sent only to the opponent's socket set.
    #[serde(rename = "game:rematch:requested")]
    RematchRequested { from: UserBrief },
    /// Sent only to the opponent's socket set.
    #[serde(rename = "game:draw:requested")]
    DrawRequested { from: UserBrief },
    #[serde(rename = "game:rematch:status")]
    RematchStatus(OfferStatusBody),
    #[serde(rename = "game:draw:status")]
    DrawStatus(OfferStatusBody),
    /// Sent only to the invite target's socket set.
    #[serde(rename = "invite:received")]
    InviteReceived(InviteReceivedBody),
}

/// Acknowledgment frame: `{ack, ok, data?}` or `{ack, ok:false, error}`.
/// Every ack-bearing client event gets exactly one of these.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AckFrame {
    pub ack: u64,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckFrame {
    pub fn success(seq: u64, data: Option<Value>) -> Self {
        Self {
            ack: seq,
            ok: true,
            data,
            error: None,
        }
    }

    pub fn failure(seq: u64, error: &SessionError) -> Self {
        Self {
            ack: seq,
            ok: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// Frames queued to a connection's writer task.
#[derive(Debug, Clone)]
pub enum Outbound {
    Event(Arc<ServerEvent>),
    Ack(AckFrame),
}
