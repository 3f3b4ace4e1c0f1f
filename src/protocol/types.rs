use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default length for generated room codes (derived from a UUID prefix).
pub const DEFAULT_ROOM_CODE_LENGTH: usize = 8;
/// Minimum accepted length for client-supplied room codes.
pub const MIN_ROOM_CODE_LENGTH: usize = 6;
/// Per-side clock budget at game start (3 minutes).
pub const DEFAULT_INITIAL_CLOCK_MS: i64 = 180_000;

/// Unique identifier for a single socket connection
pub type ConnId = Uuid;
/// Identity of an authenticated user, as carried in the JWT `userId` claim
pub type UserId = String;

/// Chess side, serialized as the single-letter form the wire protocol uses
/// (`"w"` / `"b"`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::White => "w",
            Side::Black => "b",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal public identity of a user, as embedded in presence lists,
/// move results and invite notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserBrief {
    pub user_id: UserId,
    pub username: String,
}

/// Room lifecycle phase as reported to clients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomPhase {
    /// Fewer than two seats taken.
    Waiting,
    /// Both seats taken, no game yet.
    Ready,
    /// A game exists (active or finished awaiting rematch).
    Playing,
}

/// Terminal classification of a game snapshot. The checks that produce this
/// value run in a fixed order: white timeout, black timeout, agreed draw,
/// then board-derived states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Active,
    Timeout,
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    ThreefoldRepetition,
    Draw,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, GameStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_serializes_as_single_letter() {
        assert_eq!(serde_json::to_string(&Side::White).unwrap(), "\"w\"");
        assert_eq!(serde_json::to_string(&Side::Black).unwrap(), "\"b\"");
        let side: Side = serde_json::from_str("\"b\"").unwrap();
        assert_eq!(side, Side::Black);
    }

    #[test]
    fn game_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&GameStatus::InsufficientMaterial).unwrap(),
            "\"insufficient_material\""
        );
        assert!(GameStatus::Timeout.is_terminal());
        assert!(!GameStatus::Active.is_terminal());
    }
}
