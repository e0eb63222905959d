//! DadBot - play chess against a UCI engine with an LLM cheering you on.
//!
//! # Architecture
//!
//! - **Game**: legal moves, FEN and board text on top of `shakmaty`
//! - **Engine**: a long-lived UCI engine process per session
//! - **Commentary**: DadBot's one-liners from an OpenAI or Anthropic model
//! - **Session**: per-browser game state and the manager that owns it
//! - **Turn**: the human move → comment → engine move → comment sequence
//! - **Server**: form-based HTTP UI (axum); **Terminal**: the same game on stdin
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dadbot::{EngineLauncher, GameSession, OfflineCommentator, TurnSequencer, UciEngineLauncher};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let launcher = UciEngineLauncher::new("/usr/games/stockfish", Vec::new());
//! let mut session = GameSession::new("demo".to_string(), launcher.launch().await?);
//! let sequencer = TurnSequencer::new(Arc::new(OfflineCommentator));
//!
//! let outcome = sequencer.play_turn(&mut session, "e2e4").await?;
//! println!("Engine answered {}", outcome.engine_move());
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod commentary;
mod config;
mod engine;
mod game;
mod llm_client;
mod page;
mod server;
mod session;
mod terminal;
mod turn;

// Crate-level exports - Chess helpers
pub use game::{
    GameError, GameStatus, Side, board_text, fen_of, find_legal_move, legal_move_strings,
    position_from_fen, starting_position, status_of, uci_of,
};

// Crate-level exports - Engine adapter
pub use engine::{
    ChessEngine, DEFAULT_OVERHEAD, EngineError, EngineErrorKind, EngineLauncher, EngineReply,
    UciEngine, UciEngineLauncher, parse_bestmove,
};

// Crate-level exports - Commentary adapter
pub use commentary::{
    CommentaryError, Commentator, DadBot, FALLBACK_COMMENT, OfflineCommentator, build_prompt,
};
pub use llm_client::{LlmClient, LlmConfig, LlmError, LlmProvider};

// Crate-level exports - Sessions and turns
pub use session::{GameSession, SessionId, SessionManager, SharedSession, TurnPhase};
pub use turn::{
    DEFAULT_TIME_BUDGET, GameOverReport, TurnError, TurnOutcome, TurnSequencer,
    compose_commentary,
};

// Crate-level exports - Configuration
pub use config::{
    CommentarySettings, ConfigError, DadbotConfig, ENGINE_PATH_ENV, EngineSettings,
    ServerSettings,
};

// Crate-level exports - Front ends
pub use page::{GameView, Notice, NoticeKind, escape_html, render_game};
pub use server::{
    AppState, MoveForm, SESSION_COOKIE, SessionSnapshot, router, serve, serve_until,
};
pub use terminal::run_terminal;
