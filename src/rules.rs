use std::collections::HashMap;

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, File, Move, Position, Role, Square};
use thiserror::Error;

use crate::protocol::{GameStatus, Side};

/// The move was rejected by the rules engine. Every failure inside the
/// underlying library is converted to this value; nothing else escapes.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("illegal move")]
pub struct IllegalMove;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid position")]
pub struct InvalidPosition;

/// Result of a successfully applied move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub san: String,
    pub fen: String,
    pub next_turn: Side,
}

/// Narrow adapter over the chess rules library. Holds the live position plus
/// the position-occurrence table needed for threefold detection (positions in
/// the library carry no game history).
#[derive(Debug, Clone)]
pub struct RulesBoard {
    pos: Chess,
    seen: HashMap<String, u32>,
}

impl Default for RulesBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl RulesBoard {
    /// Start a fresh game from the standard initial position.
    pub fn new() -> Self {
        let pos = Chess::default();
        let mut seen = HashMap::new();
        seen.insert(position_key(&pos), 1);
        Self { pos, seen }
    }

    /// Load a position from FEN. Repetition tracking starts from the loaded
    /// position.
    pub fn from_fen(fen: &str) -> Result<Self, InvalidPosition> {
        let pos: Chess = fen
            .parse::<Fen>()
            .map_err(|_| InvalidPosition)?
            .into_position(CastlingMode::Standard)
            .map_err(|_| InvalidPosition)?;
        let mut seen = HashMap::new();
        seen.insert(position_key(&pos), 1);
        Ok(Self { pos, seen })
    }

    pub fn turn(&self) -> Side {
        side_of(self.pos.turn())
    }

    pub fn is_check(&self) -> bool {
        self.pos.is_check()
    }

    pub fn fen(&self) -> String {
        Fen::from_position(self.pos.clone(), EnPassantMode::Legal).to_string()
    }

    /// Apply a move given as two algebraic squares. Inputs are trimmed and
    /// lowercased before parsing. Promotion defaults to queen when a pawn
    /// reaches the last rank and the caller omits it.
    pub fn apply(
        &mut self,
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> Result<MoveOutcome, IllegalMove> {
        let from: Square = from.trim().to_ascii_lowercase().parse().map_err(|_| IllegalMove)?;
        let to: Square = to.trim().to_ascii_lowercase().parse().map_err(|_| IllegalMove)?;
        let promotion = parse_promotion(promotion)?;

        let m = self.find_legal(from, to, promotion).ok_or(IllegalMove)?;

        // SanPlus renders the suffixed SAN and advances the position in one
        // step; the move came out of legal_moves so this cannot fail.
        let san = SanPlus::from_move_and_play_unchecked(&mut self.pos, &m).to_string();
        *self.seen.entry(position_key(&self.pos)).or_insert(0) += 1;

        Ok(MoveOutcome {
            san,
            fen: self.fen(),
            next_turn: self.turn(),
        })
    }

    /// Board-derived terminal classification. Timeouts are the clock's
    /// concern and never originate here.
    pub fn terminal_state(&self) -> GameStatus {
        if self.pos.is_checkmate() {
            GameStatus::Checkmate
        } else if self.pos.is_stalemate() {
            GameStatus::Stalemate
        } else if self.pos.is_insufficient_material() {
            GameStatus::InsufficientMaterial
        } else if self.current_repetitions() >= 3 {
            GameStatus::ThreefoldRepetition
        } else if self.pos.halfmoves() >= 100 {
            GameStatus::Draw
        } else {
            GameStatus::Active
        }
    }

    fn current_repetitions(&self) -> u32 {
        self.seen
            .get(&position_key(&self.pos))
            .copied()
            .unwrap_or(0)
    }

    /// Locate the legal move matching the requested squares. Castling is
    /// encoded king-takes-rook internally, so the conventional king
    /// destination (g1/c1 style) is accepted as well.
    fn find_legal(&self, from: Square, to: Square, promotion: Option<Role>) -> Option<Move> {
        let legal = self.pos.legal_moves();
        for m in &legal {
            let matches_squares = match *m {
                Move::Castle { king, rook } => {
                    let conventional = Square::from_coords(
                        if rook > king { File::G } else { File::C },
                        king.rank(),
                    );
                    from == king && (to == conventional || to == rook)
                }
                _ => m.from() == Some(from) && m.to() == to,
            };
            if !matches_squares {
                continue;
            }
            match m.promotion() {
                None => return Some(m.clone()),
                // Only the requested role (queen when omitted) is playable.
                Some(role) if role == promotion.unwrap_or(Role::Queen) => return Some(m.clone()),
                Some(_) => continue,
            }
        }
        None
    }
}

fn side_of(color: Color) -> Side {
    match color {
        Color::White => Side::White,
        Color::Black => Side::Black,
    }
}

fn parse_promotion(promotion: Option<&str>) -> Result<Option<Role>, IllegalMove> {
    match promotion.map(|p| p.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(p) if p.is_empty() => Ok(None),
        Some(p) => {
            let role = p.chars().next().and_then(Role::from_char).ok_or(IllegalMove)?;
            match role {
                Role::Queen | Role::Rook | Role::Bishop | Role::Knight => Ok(Some(role)),
                _ => Err(IllegalMove),
            }
        }
    }
}

/// Repetition key: the FEN minus move counters. Two positions repeat when
/// board, side to move, castling rights and en-passant square all agree.
fn position_key(pos: &Chess) -> String {
    let fen = Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string();
    fen.split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn fresh_board_is_standard_start() {
        let board = RulesBoard::new();
        assert_eq!(board.fen(), START_FEN);
        assert_eq!(board.turn(), Side::White);
        assert!(!board.is_check());
        assert_eq!(board.terminal_state(), GameStatus::Active);
    }

    #[test]
    fn opening_move_produces_san_and_flips_turn() {
        let mut board = RulesBoard::new();
        let outcome = board.apply("e2", "e4", None).unwrap();
        assert_eq!(outcome.san, "e4");
        assert_eq!(outcome.next_turn, Side::Black);
        assert!(outcome.fen.starts_with("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b"));
    }

    #[test]
    fn uppercase_squares_are_accepted() {
        let mut board = RulesBoard::new();
        assert!(board.apply("E2", "E4", None).is_ok());
    }

    #[test]
    fn illegal_moves_are_rejected_without_mutation() {
        let mut board = RulesBoard::new();
        assert_eq!(board.apply("e2", "e5", None), Err(IllegalMove));
        assert_eq!(board.apply("e7", "e5", None), Err(IllegalMove));
        assert_eq!(board.apply("zz", "e4", None), Err(IllegalMove));
        assert_eq!(board.fen(), START_FEN);
        assert_eq!(board.turn(), Side::White);
    }

    #[test]
    fn fools_mate_is_checkmate_for_black() {
        let mut board = RulesBoard::new();
        board.apply("f2", "f3", None).unwrap();
        board.apply("e7", "e5", None).unwrap();
        board.apply("g2", "g4", None).unwrap();
        let mate = board.apply("d8", "h4", None).unwrap();
        assert_eq!(mate.san, "Qh4#");
        assert_eq!(board.terminal_state(), GameStatus::Checkmate);
        assert!(board.is_check());
        // Checkmated side is the one to move.
        assert_eq!(board.turn(), Side::White);
    }

    #[test]
    fn promotion_defaults_to_queen() {
        let mut board = RulesBoard::from_fen("8/P6k/8/8/8/8/8/7K w - - 0 1").unwrap();
        let outcome = board.apply("a7", "a8", None).unwrap();
        assert_eq!(outcome.san, "a8=Q");
    }

    #[test]
    fn explicit_underpromotion_is_honored() {
        let mut board = RulesBoard::from_fen("8/P6k/8/8/8/8/8/7K w - - 0 1").unwrap();
        let outcome = board.apply("a7", "a8", Some("n")).unwrap();
        assert_eq!(outcome.san, "a8=N");
    }

    #[test]
    fn castling_accepts_king_destination() {
        let mut board = RulesBoard::new();
        for (from, to) in [
            ("e2", "e4"),
            ("e7", "e5"),
            ("g1", "f3"),
            ("b8", "c6"),
            ("f1", "c4"),
            ("g8", "f6"),
        ] {
            board.apply(from, to, None).unwrap();
        }
        let outcome = board.apply("e1", "g1", None).unwrap();
        assert_eq!(outcome.san, "O-O");
    }

    #[test]
    fn knight_shuffle_reaches_threefold() {
        let mut board = RulesBoard::new();
        for _ in 0..2 {
            board.apply("g1", "f3", None).unwrap();
            board.apply("g8", "f6", None).unwrap();
            board.apply("f3", "g1", None).unwrap();
            board.apply("f6", "g8", None).unwrap();
        }
        assert_eq!(board.terminal_state(), GameStatus::ThreefoldRepetition);
    }

    #[test]
    fn bare_kings_are_insufficient_material() {
        let board = RulesBoard::from_fen("8/8/8/8/8/8/k7/7K w - - 0 1").unwrap();
        assert_eq!(board.terminal_state(), GameStatus::InsufficientMaterial);
    }

    #[test]
    fn stalemate_is_detected() {
        let board = RulesBoard::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(board.terminal_state(), GameStatus::Stalemate);
    }

    #[test]
    fn halfmove_clock_draw() {
        let board = RulesBoard::from_fen("7k/8/8/8/8/8/R7/7K w - - 100 80").unwrap();
        assert_eq!(board.terminal_state(), GameStatus::Draw);
    }

    #[test]
    fn bad_fen_is_rejected() {
        assert!(RulesBoard::from_fen("not a position").is_err());
    }
}
