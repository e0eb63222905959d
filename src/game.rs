//! Chess position helpers on top of `shakmaty`.
//!
//! Everything the rest of the crate knows about chess rules goes through
//! here: the legal-move set as UCI strings, strict membership validation,
//! FEN serialization, and a plain-text board for display.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, File, Move, Position, Rank, Square};
use tracing::{debug, instrument};

/// Whether a position still has moves to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum GameStatus {
    /// The side to move has at least one legal move.
    InProgress,
    /// The side to move is checkmated.
    Checkmate {
        /// Side that delivered mate.
        winner: Side,
    },
    /// The side to move has no legal move but is not in check.
    Stalemate,
    /// The engine reported that it had no move to play.
    NoReply {
        /// The human side, left on the board.
        winner: Side,
    },
}

impl GameStatus {
    /// Returns true when no legal move remains.
    pub fn is_over(self) -> bool {
        !matches!(self, GameStatus::InProgress)
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameStatus::InProgress => write!(f, "Game in progress"),
            GameStatus::Checkmate { winner } => write!(f, "Checkmate! {} wins", winner),
            GameStatus::Stalemate => write!(f, "Stalemate. It's a draw"),
            GameStatus::NoReply { winner } => {
                write!(f, "DadBot found no reply. {} wins", winner)
            }
        }
    }
}

/// Serializable side-to-move marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// White pieces.
    White,
    /// Black pieces.
    Black,
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

/// Error raised when a position cannot be built from text.
#[derive(Debug, Clone, Display, Error)]
#[display("Position error: {} at {}:{}", message, file, line)]
pub struct GameError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl GameError {
    /// Creates a new position error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Returns the standard starting position.
pub fn starting_position() -> Chess {
    Chess::default()
}

/// Parses a FEN string into a position with standard castling rules.
#[instrument]
pub fn position_from_fen(fen: &str) -> Result<Chess, GameError> {
    let parsed: Fen = fen
        .trim()
        .parse()
        .map_err(|e| GameError::new(format!("Invalid FEN '{}': {}", fen, e)))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| GameError::new(format!("Illegal position '{}': {}", fen, e)))
}

/// Serializes a position as FEN.
pub fn fen_of(position: &Chess) -> String {
    Fen::from_position(position.clone(), EnPassantMode::Legal).to_string()
}

/// Renders a move in UCI coordinate notation ("e2e4", "e1g1", "e7e8q").
pub fn uci_of(m: &Move) -> String {
    m.to_uci(CastlingMode::Standard).to_string()
}

/// Returns the legal-move set of `position` as UCI strings.
pub fn legal_move_strings(position: &Chess) -> Vec<String> {
    position.legal_moves().iter().map(uci_of).collect()
}

/// Finds the legal move whose UCI spelling matches `candidate`.
///
/// Matching is exact after trimming and lowercasing; anything not in the
/// legal-move set yields `None`.
#[instrument(skip(position))]
pub fn find_legal_move(position: &Chess, candidate: &str) -> Option<Move> {
    let wanted = candidate.trim().to_ascii_lowercase();
    let found = position
        .legal_moves()
        .into_iter()
        .find(|m| uci_of(m) == wanted);
    debug!(found = found.is_some(), "Looked up candidate move");
    found
}

/// Classifies the position by its legal-move set.
pub fn status_of(position: &Chess) -> GameStatus {
    if !position.legal_moves().is_empty() {
        GameStatus::InProgress
    } else if position.is_check() {
        GameStatus::Checkmate {
            winner: Side::from(!position.turn()),
        }
    } else {
        GameStatus::Stalemate
    }
}

/// Draws the board as eight lines of piece letters, rank 8 first.
///
/// Uppercase is White, lowercase is Black, `.` is an empty square.
pub fn board_text(position: &Chess) -> String {
    let board = position.board();
    (0..8u32)
        .rev()
        .map(|rank| {
            (0..8u32)
                .map(|file| {
                    let square = Square::from_coords(File::new(file), Rank::new(rank));
                    board
                        .piece_at(square)
                        .map(|piece| piece.char())
                        .unwrap_or('.')
                        .to_string()
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
