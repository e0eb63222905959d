//! One human-then-engine turn, with commentary after each move.
//!
//! Gameplay failures abort the turn with a [`TurnError`]. Commentary failures
//! never do: the fallback comment is used and the cause is kept as a warning.

use crate::commentary::{Commentator, FALLBACK_COMMENT};
use crate::engine::{EngineError, EngineErrorKind, EngineReply};
use crate::game::{self, GameStatus, Side};
use crate::session::{GameSession, TurnPhase};
use derive_getters::Getters;
use derive_more::Display;
use serde::Serialize;
use shakmaty::{Chess, Position};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Default engine thinking time per reply.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_millis(500);

/// Everything produced by a completed turn.
#[derive(Debug, Clone, Getters, Serialize)]
pub struct TurnOutcome {
    human_move: String,
    human_comment: String,
    engine_move: String,
    engine_comment: String,
    resulting_fen: String,
    status: GameStatus,
    warnings: Vec<String>,
}

/// Terminal position reached inside (or before) a turn.
#[derive(Debug, Clone, Getters, Serialize)]
pub struct GameOverReport {
    status: GameStatus,
    fen: String,
    human_move: Option<String>,
    human_comment: Option<String>,
    warnings: Vec<String>,
}

/// Why a turn did not complete.
#[derive(Debug, Clone, Display)]
pub enum TurnError {
    /// The submitted move is not in the legal-move set; nothing changed.
    #[display("Invalid move: '{}' is not legal here", attempted)]
    InvalidMove {
        /// The rejected input.
        attempted: String,
    },

    /// No legal move remains.
    #[display("Game over: {}", _0.status)]
    GameOver(GameOverReport),

    /// The engine is gone or misbehaving; the session needs a new engine.
    #[display("Engine unavailable: {}", _0.message)]
    EngineUnavailable(EngineError),
}

impl std::error::Error for TurnError {}

/// Runs turns against a session, sharing one commentator across sessions.
#[derive(Clone)]
pub struct TurnSequencer {
    commentator: Arc<dyn Commentator>,
    time_budget: Duration,
}

impl std::fmt::Debug for TurnSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnSequencer")
            .field("time_budget", &self.time_budget)
            .finish_non_exhaustive()
    }
}

impl TurnSequencer {
    /// Creates a sequencer with the default time budget.
    pub fn new(commentator: Arc<dyn Commentator>) -> Self {
        Self {
            commentator,
            time_budget: DEFAULT_TIME_BUDGET,
        }
    }

    /// Overrides the engine's thinking time per reply.
    pub fn with_time_budget(mut self, time_budget: Duration) -> Self {
        self.time_budget = time_budget;
        self
    }

    /// Engine thinking time per reply.
    pub fn time_budget(&self) -> Duration {
        self.time_budget
    }

    /// Plays `proposed_move` for the human, then the engine's reply.
    ///
    /// On `InvalidMove` and `EngineUnavailable` the position is exactly what
    /// it was before the call.
    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    pub async fn play_turn(
        &self,
        session: &mut GameSession,
        proposed_move: &str,
    ) -> Result<TurnOutcome, TurnError> {
        if session.phase() == TurnPhase::GameOver {
            info!("Move submitted after the game ended");
            return Err(TurnError::GameOver(GameOverReport {
                status: session.status(),
                fen: session.current_fen(),
                human_move: None,
                human_comment: None,
                warnings: Vec::new(),
            }));
        }
        if session.engine_failed() {
            return Err(TurnError::EngineUnavailable(EngineError::new(
                EngineErrorKind::Terminated,
                "Engine failed earlier; restart the game",
            )));
        }

        let Some(human) = game::find_legal_move(session.current_position(), proposed_move) else {
            warn!(attempted = %proposed_move, "Rejected illegal move");
            return Err(TurnError::InvalidMove {
                attempted: proposed_move.to_string(),
            });
        };
        let human_move = game::uci_of(&human);
        let before = session.current_position().clone();
        let mut warnings = Vec::new();

        session.position_mut().play_unchecked(&human);
        info!(human_move = %human_move, "Human move applied");

        let human_comment = self
            .comment_or_fallback(&human_move, &session.current_fen(), &mut warnings)
            .await;

        let status = session.status();
        if status.is_over() {
            session.set_phase(TurnPhase::GameOver);
            session.set_commentary(format!("🧠 DadBot says:\n{}\n\n🏁 {}", human_comment, status));
            info!(%status, "Game ended on the human move");
            return Err(TurnError::GameOver(GameOverReport {
                status,
                fen: session.current_fen(),
                human_move: Some(human_move),
                human_comment: Some(human_comment),
                warnings,
            }));
        }

        session.set_phase(TurnPhase::AwaitingEngineReply);
        let time_budget = self.time_budget;
        let position = session.current_position().clone();
        let reply = session
            .engine_mut()
            .choose_reply(&position, time_budget)
            .await;

        let engine_move = match reply {
            Ok(EngineReply::Move(candidate)) => {
                match game::find_legal_move(session.current_position(), &candidate) {
                    Some(m) => m,
                    None => {
                        let err = EngineError::new(
                            EngineErrorKind::Protocol,
                            format!("Engine replied with illegal move '{}'", candidate),
                        );
                        return Err(self.abandon_turn(session, before, err));
                    }
                }
            }
            Ok(EngineReply::NoMoveAvailable) => {
                let status = GameStatus::NoReply {
                    winner: Side::from(!session.current_position().turn()),
                };
                session.conclude(status);
                session.set_commentary(format!("🧠 DadBot says:\n{}\n\n🏁 {}", human_comment, status));
                warn!("Engine reported no move, ending the game");
                return Err(TurnError::GameOver(GameOverReport {
                    status,
                    fen: session.current_fen(),
                    human_move: Some(human_move),
                    human_comment: Some(human_comment),
                    warnings,
                }));
            }
            Err(err) => return Err(self.abandon_turn(session, before, err)),
        };

        let engine_uci = game::uci_of(&engine_move);
        session.position_mut().play_unchecked(&engine_move);
        info!(engine_move = %engine_uci, "Engine move applied");

        let resulting_fen = session.current_fen();
        let engine_comment = self
            .comment_or_fallback(&engine_uci, &resulting_fen, &mut warnings)
            .await;

        let status = session.status();
        session.set_phase(if status.is_over() {
            TurnPhase::GameOver
        } else {
            TurnPhase::AwaitingHumanMove
        });
        session.set_commentary(compose_commentary(
            &human_comment,
            &engine_uci,
            &engine_comment,
            status,
        ));

        Ok(TurnOutcome {
            human_move,
            human_comment,
            engine_move: engine_uci,
            engine_comment,
            resulting_fen,
            status,
            warnings,
        })
    }

    async fn comment_or_fallback(
        &self,
        move_uci: &str,
        fen: &str,
        warnings: &mut Vec<String>,
    ) -> String {
        match self.commentator.comment(move_uci, fen).await {
            Ok(comment) => comment,
            Err(e) => {
                warn!(move_uci, error = %e, "Commentary failed, using fallback");
                warnings.push(format!("DadBot could not comment on {}: {}", move_uci, e.message));
                FALLBACK_COMMENT.to_string()
            }
        }
    }

    fn abandon_turn(&self, session: &mut GameSession, before: Chess, err: EngineError) -> TurnError {
        warn!(error = %err, "Engine failed, rolling back the turn");
        session.restore_position(before);
        session.mark_engine_failed();
        TurnError::EngineUnavailable(err)
    }
}

/// Formats the two-part commentary shown after a full turn.
pub fn compose_commentary(
    human_comment: &str,
    engine_move: &str,
    engine_comment: &str,
    status: GameStatus,
) -> String {
    let mut text = format!(
        "🧠 DadBot says:\n{}\n\n♟️ DadBot plays: `{}`\n🧠 {}",
        human_comment, engine_move, engine_comment
    );
    if status.is_over() {
        text.push_str(&format!("\n\n🏁 {}", status));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_commentary_mid_game() {
        let text = compose_commentary("Bold!", "e7e5", "Classic.", GameStatus::InProgress);
        assert_eq!(
            text,
            "🧠 DadBot says:\nBold!\n\n♟️ DadBot plays: `e7e5`\n🧠 Classic."
        );
    }

    #[test]
    fn test_compose_commentary_appends_result() {
        let text = compose_commentary(
            "Oops.",
            "d8h4",
            "Sorry, kiddo.",
            GameStatus::Checkmate {
                winner: Side::Black,
            },
        );
        assert!(text.ends_with("\n\n🏁 Checkmate! Black wins"));
    }
}
