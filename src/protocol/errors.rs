use thiserror::Error;

/// User-facing error taxonomy. The display strings are part of the client
/// contract and are returned verbatim in event acknowledgments; do not
/// reword them without a protocol version bump.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    // Authentication (connection-level; closes the socket)
    #[error("Unauthorized")]
    Unauthorized,

    // Room membership
    #[error("You are not in a room")]
    NotInARoom,
    #[error("You are already in a room")]
    AlreadyInARoom,
    #[error("Leave your current room first")]
    LeaveCurrentRoomFirst,
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room is full")]
    RoomIsFull,
    #[error("Room no longer exists")]
    RoomNoLongerExists,
    #[error("Invalid room")]
    InvalidRoom,

    // Game state
    #[error("Game not started")]
    GameNotStarted,
    #[error("Game is already over")]
    GameAlreadyOver,
    #[error("You are not a player in this game")]
    NotAPlayer,
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Illegal move")]
    IllegalMove,
    #[error("Move must include from and to squares")]
    MoveMissingSquares,

    // Side protocols
    #[error("Rematch is only available after game over")]
    RematchOnlyAfterGameOver,
    #[error("No rematch request to respond to")]
    NoRematchRequest,
    #[error("Only players can request rematch")]
    OnlyPlayersRequestRematch,
    #[error("Only players can respond to rematch")]
    OnlyPlayersRespondRematch,
    #[error("Opponent is no longer in the room")]
    OpponentGone,
    #[error("No draw request to respond to")]
    NoDrawRequest,

    // Invites
    #[error("Missing target user")]
    MissingTargetUser,
    #[error("You cannot invite yourself")]
    CannotInviteSelf,
    #[error("Create or join a room first")]
    CreateOrJoinRoomFirst,
    #[error("You are not in that room")]
    NotInThatRoom,
    #[error("You can only invite users from your friend list")]
    NotFriends,
    #[error("Friend is offline")]
    FriendOffline,

    // Transport
    #[error("Invalid payload")]
    InvalidPayload,
    #[error("Unknown event")]
    UnknownEvent,
}
