/// User-facing error taxonomy (ack error strings)
pub mod errors;
/// Wire-level event and frame definitions
pub mod messages;
/// Room code generation and validation
pub mod room_codes;
/// Shared identifiers and wire enums
pub mod types;

pub use errors::SessionError;
pub use messages::{
    AckFrame, ClientEvent, ClientFrame, ClockBody, GamePlayers, GameSnapshotBody, GameStartBody,
    InviteReceivedBody, MoveResultBody, OfferStatusBody, Outbound, PlayerEntry, RoomStateBody,
    ServerEvent,
};
pub use types::{ConnId, GameStatus, RoomPhase, Side, UserBrief, UserId};
