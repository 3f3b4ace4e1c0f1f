use std::collections::HashSet;

use rand::RngExt;

use crate::clock::ChessClock;
use crate::protocol::{
    ClockBody, GamePlayers, GameSnapshotBody, GameStartBody, GameStatus, MoveResultBody,
    PlayerEntry, RoomPhase, RoomStateBody, SessionError, Side, UserBrief, UserId,
};
use crate::rules::RulesBoard;

// ============================================================================
// ROOM LIFECYCLE
// ============================================================================
//
// A room is a two-seat aggregate that moves through these states:
//
// ```text
// [*] --> Waiting: first occupant joins
//
// Waiting --> Playing: second occupant joins (game auto-starts)
// Playing --> Ended:   game reaches a terminal snapshot
// Ended   --> Playing: both players agree to a rematch (colors re-randomized)
// Playing --> Waiting: a seated player leaves (game dropped, no forfeit)
// Ended   --> Waiting: a seated player leaves
// Waiting --> [*]:     last occupant leaves (room destroyed by the registry)
// ```
//
// `Ended` is not a separate field: it is `game.is_some()` plus a terminal
// snapshot. All validation failures leave the aggregate untouched; partial
// mutations never escape a method.
// ============================================================================

/// One applied move, recorded in receipt order. Append-only per game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub from: String,
    pub to: String,
    pub san: String,
    pub by_user_id: UserId,
    pub at_ms: i64,
}

/// The live game owned by a room: rules position, color assignment, clock,
/// the agreed-draw flag and both pending-offer sets.
#[derive(Debug, Clone)]
pub struct Game {
    rules: RulesBoard,
    white: UserBrief,
    black: UserBrief,
    clock: ChessClock,
    agreed_draw: bool,
    over_announced: bool,
    pending_draw: HashSet<UserId>,
    pending_rematch: HashSet<UserId>,
    moves: Vec<MoveRecord>,
}

impl Game {
    fn new(white: UserBrief, black: UserBrief, clock_budget_ms: i64, now_ms: i64) -> Self {
        let mut clock = ChessClock::new(clock_budget_ms);
        clock.start(now_ms);
        Self {
            rules: RulesBoard::new(),
            white,
            black,
            clock,
            agreed_draw: false,
            over_announced: false,
            pending_draw: HashSet::new(),
            pending_rematch: HashSet::new(),
            moves: Vec::new(),
        }
    }

    pub fn white(&self) -> &UserBrief {
        &self.white
    }

    pub fn black(&self) -> &UserBrief {
        &self.black
    }

    pub fn pending_draw(&self) -> &HashSet<UserId> {
        &self.pending_draw
    }

    pub fn pending_rematch(&self) -> &HashSet<UserId> {
        &self.pending_rematch
    }

    pub fn move_log(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn clock(&self) -> &ChessClock {
        &self.clock
    }

    fn color_of(&self, user_id: &str) -> Option<Side> {
        if self.white.user_id == user_id {
            Some(Side::White)
        } else if self.black.user_id == user_id {
            Some(Side::Black)
        } else {
            None
        }
    }

    fn seat(&self, side: Side) -> &UserBrief {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }
}

/// Outcome of [`Room::join`].
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// The user was already seated; nothing changed.
    pub rejoined: bool,
    /// Set when the join filled the second seat and auto-started a game.
    pub started: Option<GameStartBody>,
}

/// Outcome of [`Room::leave`].
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    pub removed: Option<UserBrief>,
    /// The leaver was seated in the game, which has been discarded.
    pub game_dropped: bool,
}

#[derive(Debug, Clone)]
pub struct MoveApplied {
    pub result: MoveResultBody,
    pub snapshot: GameSnapshotBody,
}

#[derive(Debug, Clone)]
pub enum DrawOutcome {
    /// Both sides agreed; the snapshot is terminal with status `draw`.
    Accepted(GameSnapshotBody),
    Declined,
}

#[derive(Debug, Clone)]
pub enum RematchOutcome {
    /// Waiting on the opponent's answer.
    Requested { opponent: UserBrief },
    /// Both sides agreed; a fresh game has started.
    Started(GameStartBody),
    Declined,
}

/// In-memory room aggregate: code, up to two seats in join order, and the
/// optional game. The gateway serializes all access behind one mutex per
/// room; the aggregate itself is single-threaded state plus transitions.
#[derive(Debug, Clone)]
pub struct Room {
    code: String,
    clock_budget_ms: i64,
    players: Vec<UserBrief>,
    game: Option<Game>,
}

impl Room {
    pub fn new(code: String, clock_budget_ms: i64) -> Self {
        Self {
            code,
            clock_budget_ms,
            players: Vec::new(),
            game: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn players(&self) -> &[UserBrief] {
        &self.players
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_seated(&self, user_id: &str) -> bool {
        self.players.iter().any(|p| p.user_id == user_id)
    }

    pub fn opponent_of(&self, user_id: &str) -> Option<&UserBrief> {
        self.players.iter().find(|p| p.user_id != user_id)
    }

    pub fn phase(&self) -> RoomPhase {
        if self.game.is_some() {
            RoomPhase::Playing
        } else if self.players.len() == 2 {
            RoomPhase::Ready
        } else {
            RoomPhase::Waiting
        }
    }

    /// Current room state as reported to clients. Presence is gateway-owned,
    /// so online flags are resolved through the supplied lookup.
    pub fn room_state(&self, online: impl Fn(&str) -> bool) -> RoomStateBody {
        let players = self
            .players
            .iter()
            .map(|p| PlayerEntry {
                user_id: p.user_id.clone(),
                username: p.username.clone(),
                online: online(&p.user_id),
                color: self
                    .game
                    .as_ref()
                    .and_then(|game| game.color_of(&p.user_id)),
            })
            .collect();
        RoomStateBody {
            room_id: self.code.clone(),
            players,
            status: self.phase(),
        }
    }

    /// Seat a user. Re-joining one's own seat is idempotent; a third
    /// distinct user is rejected. Filling the second seat auto-starts the
    /// game.
    pub fn join(&mut self, user: UserBrief, now_ms: i64) -> Result<JoinOutcome, SessionError> {
        if self.is_seated(&user.user_id) {
            return Ok(JoinOutcome {
                rejoined: true,
                started: None,
            });
        }
        if self.players.len() >= 2 {
            return Err(SessionError::RoomIsFull);
        }
        self.players.push(user);
        Ok(JoinOutcome {
            rejoined: false,
            started: self.maybe_start(now_ms),
        })
    }

    /// Remove a user. A leaver seated in the game takes the game with them:
    /// clock, pending offers and move log are discarded, and the room drops
    /// back to `Waiting`. No forfeit is recorded.
    pub fn leave(&mut self, user_id: &str) -> LeaveOutcome {
        let Some(index) = self.players.iter().position(|p| p.user_id == user_id) else {
            return LeaveOutcome {
                removed: None,
                game_dropped: false,
            };
        };
        let removed = self.players.remove(index);
        let game_dropped = self
            .game
            .as_ref()
            .is_some_and(|game| game.color_of(user_id).is_some());
        if game_dropped {
            self.game = None;
        }
        LeaveOutcome {
            removed: Some(removed),
            game_dropped,
        }
    }

    /// Start a game when exactly two seats are taken and none is running.
    /// Colors are assigned by a uniform-random permutation of the two seats.
    pub fn maybe_start(&mut self, now_ms: i64) -> Option<GameStartBody> {
        if self.game.is_some() || self.players.len() != 2 {
            return None;
        }
        let (first, second) = (self.players[0].clone(), self.players[1].clone());
        let (white, black) = if rand::rng().random_range(0..2) == 0 {
            (first, second)
        } else {
            (second, first)
        };
        let game = Game::new(white, black, self.clock_budget_ms, now_ms);
        let start = GameStartBody {
            room_id: self.code.clone(),
            white: game.white.clone(),
            black: game.black.clone(),
            fen: game.rules.fen(),
            turn: game.rules.turn(),
        };
        self.game = Some(game);
        Some(start)
    }

    /// The authoritative game view at `now_ms`. Folds elapsed clock time,
    /// applies the termination precedence, and freezes the clock the first
    /// time a terminal status is observed.
    pub fn snapshot(&mut self, now_ms: i64) -> Option<GameSnapshotBody> {
        let code = self.code.clone();
        let game = self.game.as_mut()?;
        game.clock.sample(now_ms);

        let (status, winner_color) = if game.clock.remaining(Side::White) <= 0 {
            (GameStatus::Timeout, Some(Side::Black))
        } else if game.clock.remaining(Side::Black) <= 0 {
            (GameStatus::Timeout, Some(Side::White))
        } else if game.agreed_draw {
            (GameStatus::Draw, None)
        } else {
            match game.rules.terminal_state() {
                GameStatus::Checkmate => (GameStatus::Checkmate, Some(game.rules.turn().opposite())),
                other => (other, None),
            }
        };

        if status.is_terminal() {
            game.clock.freeze();
        }

        Some(GameSnapshotBody {
            room_id: code,
            fen: game.rules.fen(),
            turn: game.rules.turn(),
            is_check: game.rules.is_check(),
            status,
            winner_color,
            clock_ms: ClockBody {
                w: game.clock.remaining(Side::White),
                b: game.clock.remaining(Side::Black),
            },
            players: GamePlayers {
                white: game.white.clone(),
                black: game.black.clone(),
            },
        })
    }

    /// Terminal snapshot the first time it is observed, `None` afterwards.
    /// Lets the gateway emit `game:over` exactly once per termination no
    /// matter which path (move, state request, draw accept) discovers it.
    pub fn terminal_announcement(&mut self, now_ms: i64) -> Option<GameSnapshotBody> {
        let snapshot = self.snapshot(now_ms)?;
        if !snapshot.status.is_terminal() {
            return None;
        }
        let game = self.game.as_mut()?;
        if game.over_announced {
            return None;
        }
        game.over_announced = true;
        Some(snapshot)
    }

    /// Validate and apply a move. The pre-checks run in a fixed order and a
    /// failure at any point leaves room, game and clock untouched (beyond
    /// ordinary sampling).
    pub fn apply_move(
        &mut self,
        user_id: &str,
        from: &str,
        to: &str,
        promotion: Option<&str>,
        now_ms: i64,
    ) -> Result<MoveApplied, SessionError> {
        let snapshot = self.snapshot(now_ms).ok_or(SessionError::GameNotStarted)?;
        if snapshot.status.is_terminal() {
            return Err(SessionError::GameAlreadyOver);
        }

        let code = self.code.clone();
        let game = self.game.as_mut().ok_or(SessionError::GameNotStarted)?;
        let color = game.color_of(user_id).ok_or(SessionError::NotAPlayer)?;
        if game.rules.turn() != color {
            return Err(SessionError::NotYourTurn);
        }

        let from = from.trim();
        let to = to.trim();
        if from.is_empty() || to.is_empty() {
            return Err(SessionError::MoveMissingSquares);
        }

        let outcome = game
            .rules
            .apply(from, to, promotion)
            .map_err(|_| SessionError::IllegalMove)?;

        game.clock.switch(now_ms);
        game.moves.push(MoveRecord {
            from: from.to_ascii_lowercase(),
            to: to.to_ascii_lowercase(),
            san: outcome.san.clone(),
            by_user_id: user_id.to_string(),
            at_ms: now_ms,
        });

        let result = MoveResultBody {
            room_id: code,
            from: from.to_ascii_lowercase(),
            to: to.to_ascii_lowercase(),
            san: outcome.san,
            fen: outcome.fen,
            turn: outcome.next_turn,
            by: game.seat(color).clone(),
        };

        let snapshot = self.snapshot(now_ms).ok_or(SessionError::GameNotStarted)?;
        Ok(MoveApplied { result, snapshot })
    }

    /// Record a draw offer. Valid only while the game is active and the
    /// requester is seated; repeating the offer is idempotent. Returns the
    /// opponent to notify.
    pub fn propose_draw(
        &mut self,
        user_id: &str,
        now_ms: i64,
    ) -> Result<UserBrief, SessionError> {
        let snapshot = self.snapshot(now_ms).ok_or(SessionError::GameNotStarted)?;
        if snapshot.status.is_terminal() {
            return Err(SessionError::GameAlreadyOver);
        }
        let game = self.game.as_mut().ok_or(SessionError::GameNotStarted)?;
        let color = game.color_of(user_id).ok_or(SessionError::NotAPlayer)?;
        game.pending_draw.insert(user_id.to_string());
        Ok(game.seat(color.opposite()).clone())
    }

    /// Answer a pending draw offer. Accepting requires the opponent's offer
    /// to be on the table; any response clears the pending set.
    pub fn respond_draw(
        &mut self,
        user_id: &str,
        accept: bool,
        now_ms: i64,
    ) -> Result<DrawOutcome, SessionError> {
        let snapshot = self.snapshot(now_ms).ok_or(SessionError::GameNotStarted)?;
        if snapshot.status.is_terminal() {
            return Err(SessionError::GameAlreadyOver);
        }
        let game = self.game.as_mut().ok_or(SessionError::GameNotStarted)?;
        let color = game.color_of(user_id).ok_or(SessionError::NotAPlayer)?;
        if game.pending_draw.is_empty() {
            return Err(SessionError::NoDrawRequest);
        }
        if !accept {
            game.pending_draw.clear();
            return Ok(DrawOutcome::Declined);
        }
        let opponent = game.seat(color.opposite()).user_id.clone();
        if !game.pending_draw.contains(&opponent) {
            return Err(SessionError::NoDrawRequest);
        }
        game.agreed_draw = true;
        game.pending_draw.clear();
        let snapshot = self.snapshot(now_ms).ok_or(SessionError::GameNotStarted)?;
        Ok(DrawOutcome::Accepted(snapshot))
    }

    /// Request a rematch after game over. When the opponent's request is
    /// already pending, both sides have agreed and a fresh game starts with
    /// re-randomized colors.
    pub fn propose_rematch(
        &mut self,
        user_id: &str,
        now_ms: i64,
    ) -> Result<RematchOutcome, SessionError> {
        let snapshot = self.snapshot(now_ms).ok_or(SessionError::GameNotStarted)?;
        if !snapshot.status.is_terminal() {
            return Err(SessionError::RematchOnlyAfterGameOver);
        }
        let game = self.game.as_mut().ok_or(SessionError::GameNotStarted)?;
        let color = game
            .color_of(user_id)
            .ok_or(SessionError::OnlyPlayersRequestRematch)?;
        let opponent = game.seat(color.opposite()).clone();
        if !self.is_seated(&opponent.user_id) {
            return Err(SessionError::OpponentGone);
        }
        let game = self.game.as_mut().ok_or(SessionError::GameNotStarted)?;
        game.pending_rematch.insert(user_id.to_string());
        if game.pending_rematch.contains(&opponent.user_id) {
            return self.start_rematch(now_ms);
        }
        Ok(RematchOutcome::Requested { opponent })
    }

    /// Answer a pending rematch request. Declining clears the pending set on
    /// every path; accepting with both sides present starts the fresh game.
    pub fn respond_rematch(
        &mut self,
        user_id: &str,
        accept: bool,
        now_ms: i64,
    ) -> Result<RematchOutcome, SessionError> {
        let snapshot = self.snapshot(now_ms).ok_or(SessionError::GameNotStarted)?;
        if !snapshot.status.is_terminal() {
            return Err(SessionError::RematchOnlyAfterGameOver);
        }
        let game = self.game.as_mut().ok_or(SessionError::GameNotStarted)?;
        let color = game
            .color_of(user_id)
            .ok_or(SessionError::OnlyPlayersRespondRematch)?;
        let opponent = game.seat(color.opposite()).user_id.clone();
        if !game.pending_rematch.contains(&opponent) {
            return Err(SessionError::NoRematchRequest);
        }
        if !accept {
            game.pending_rematch.clear();
            return Ok(RematchOutcome::Declined);
        }
        game.pending_rematch.insert(user_id.to_string());
        self.start_rematch(now_ms)
    }

    fn start_rematch(&mut self, now_ms: i64) -> Result<RematchOutcome, SessionError> {
        self.game = None;
        match self.maybe_start(now_ms) {
            Some(start) => Ok(RematchOutcome::Started(start)),
            None => Err(SessionError::OpponentGone),
        }
    }
}
