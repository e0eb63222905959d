//! Per-browser game sessions and their manager.

use crate::engine::{ChessEngine, EngineError, EngineLauncher};
use crate::game::{self, GameStatus};
use serde::{Deserialize, Serialize};
use shakmaty::Chess;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Unique identifier for a game session.
pub type SessionId = String;

/// Shared handle to one session; the lock serializes its turns.
pub type SharedSession = Arc<Mutex<GameSession>>;

/// Where a session is in the turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnPhase {
    /// Waiting for the human to submit a move.
    AwaitingHumanMove,
    /// The engine is thinking (only observable inside a turn).
    AwaitingEngineReply,
    /// No legal move remains; only a reset leaves this phase.
    GameOver,
}

/// One human-versus-engine game and the engine process that plays it.
#[derive(Debug)]
pub struct GameSession {
    id: SessionId,
    position: Chess,
    commentary: String,
    phase: TurnPhase,
    concluded: Option<GameStatus>,
    engine: Box<dyn ChessEngine>,
    engine_failed: bool,
}

impl GameSession {
    /// Creates a session at the standard starting position.
    #[instrument(skip(engine), fields(engine = %engine.name()))]
    pub fn new(id: SessionId, engine: Box<dyn ChessEngine>) -> Self {
        Self::with_position(id, game::starting_position(), engine)
    }

    /// Creates a session at an arbitrary legal position.
    #[instrument(skip(position, engine))]
    pub fn with_position(id: SessionId, position: Chess, engine: Box<dyn ChessEngine>) -> Self {
        info!(session_id = %id, "Creating new game session");
        let phase = phase_for(&position);
        Self {
            id,
            position,
            commentary: String::new(),
            phase,
            concluded: None,
            engine,
            engine_failed: false,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current board position.
    pub fn current_position(&self) -> &Chess {
        &self.position
    }

    /// Current position as FEN.
    pub fn current_fen(&self) -> String {
        game::fen_of(&self.position)
    }

    /// Latest rendered commentary (empty before the first turn).
    pub fn current_commentary(&self) -> &str {
        &self.commentary
    }

    /// Current turn phase.
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// How the game stands: a recorded ending if there is one, otherwise
    /// whatever the position says.
    pub fn status(&self) -> GameStatus {
        self.concluded.unwrap_or_else(|| game::status_of(&self.position))
    }

    /// Legal moves for the side to move, in UCI notation. Empty once the game is over.
    pub fn legal_moves(&self) -> Vec<String> {
        if self.concluded.is_some() {
            return Vec::new();
        }
        game::legal_move_strings(&self.position)
    }

    /// Text drawing of the board.
    pub fn board_text(&self) -> String {
        game::board_text(&self.position)
    }

    /// True once the engine has failed and has not been replaced.
    pub fn engine_failed(&self) -> bool {
        self.engine_failed
    }

    /// Name of the engine playing this session.
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Returns to the starting position with no commentary.
    ///
    /// The engine handle is kept and reused.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn reset(&mut self) {
        info!("Resetting game");
        self.position = game::starting_position();
        self.commentary.clear();
        self.phase = TurnPhase::AwaitingHumanMove;
        self.concluded = None;
    }

    /// Resets the game and, if the engine has failed, launches a new one.
    ///
    /// The board is reset even when the relaunch fails; the session then
    /// stays marked as failed. Returns whether a new engine was started.
    #[instrument(skip(self, launcher), fields(session_id = %self.id))]
    pub async fn restart(&mut self, launcher: &dyn EngineLauncher) -> Result<bool, EngineError> {
        self.reset();
        if !self.engine_failed {
            return Ok(false);
        }
        let engine = launcher.launch().await?;
        self.replace_engine(engine).await;
        Ok(true)
    }

    /// Swaps in a fresh engine, shutting the old one down.
    #[instrument(skip(self, engine), fields(session_id = %self.id))]
    pub async fn replace_engine(&mut self, engine: Box<dyn ChessEngine>) {
        let mut old = std::mem::replace(&mut self.engine, engine);
        if let Err(e) = old.shutdown().await {
            warn!(error = %e, "Old engine did not shut down cleanly");
        }
        self.engine_failed = false;
        info!(engine = %self.engine.name(), "Engine replaced");
    }

    /// Releases the engine. The session is consumed.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn shutdown(mut self) {
        if let Err(e) = self.engine.shutdown().await {
            warn!(error = %e, "Engine did not shut down cleanly");
        }
        info!("Session closed");
    }

    pub(crate) fn position_mut(&mut self) -> &mut Chess {
        &mut self.position
    }

    pub(crate) fn restore_position(&mut self, position: Chess) {
        self.phase = phase_for(&position);
        self.concluded = None;
        self.position = position;
    }

    /// Ends the game with a result the position alone does not show.
    pub(crate) fn conclude(&mut self, status: GameStatus) {
        info!(session_id = %self.id, %status, "Game concluded");
        self.concluded = Some(status);
        self.phase = TurnPhase::GameOver;
    }

    pub(crate) fn engine_mut(&mut self) -> &mut dyn ChessEngine {
        self.engine.as_mut()
    }

    pub(crate) fn set_phase(&mut self, phase: TurnPhase) {
        debug!(session_id = %self.id, from = %self.phase, to = %phase, "Phase change");
        self.phase = phase;
    }

    pub(crate) fn set_commentary(&mut self, commentary: String) {
        self.commentary = commentary;
    }

    pub(crate) fn mark_engine_failed(&mut self) {
        self.engine_failed = true;
    }
}

fn phase_for(position: &Chess) -> TurnPhase {
    if game::status_of(position).is_over() {
        TurnPhase::GameOver
    } else {
        TurnPhase::AwaitingHumanMove
    }
}

#[derive(Debug)]
struct SessionEntry {
    session: SharedSession,
    last_seen: Instant,
}

/// Owns every live session.
///
/// Ending a session, whether explicitly, by idling out, or at server
/// shutdown, always goes through [`GameSession::shutdown`].
#[derive(Debug, Clone, Default)]
pub struct SessionManager {
    sessions: Arc<Mutex<HashMap<SessionId, SessionEntry>>>,
    max_sessions: Option<usize>,
}

impl SessionManager {
    /// Creates an empty session manager.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating session manager");
        Self::default()
    }

    /// Creates a session manager that holds at most `max_sessions` sessions.
    #[instrument]
    pub fn with_limit(max_sessions: usize) -> Self {
        info!("Creating session manager");
        Self {
            max_sessions: Some(max_sessions),
            ..Self::default()
        }
    }

    /// True when no further session may be opened.
    pub async fn is_full(&self) -> bool {
        match self.max_sessions {
            Some(max) => self.sessions.lock().await.len() >= max,
            None => false,
        }
    }

    /// Stores a session and returns its shared handle.
    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    pub async fn insert(&self, session: GameSession) -> SharedSession {
        let id = session.id().to_string();
        let shared = Arc::new(Mutex::new(session));
        let previous = self.sessions.lock().await.insert(
            id.clone(),
            SessionEntry {
                session: Arc::clone(&shared),
                last_seen: Instant::now(),
            },
        );
        if let Some(previous) = previous {
            warn!(session_id = %id, "Replaced an existing session");
            close(previous.session).await;
        }
        info!(session_id = %id, "Session registered");
        shared
    }

    /// Looks up a session and marks it as recently used.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Option<SharedSession> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(id) {
            Some(entry) => {
                entry.last_seen = Instant::now();
                Some(Arc::clone(&entry.session))
            }
            None => {
                debug!(session_id = id, "Session not found");
                None
            }
        }
    }

    /// Ends a session and releases its engine. Returns false if unknown.
    #[instrument(skip(self))]
    pub async fn end(&self, id: &str) -> bool {
        let removed = self.sessions.lock().await.remove(id);
        match removed {
            Some(entry) => {
                close(entry.session).await;
                true
            }
            None => false,
        }
    }

    /// Ends every session idle for longer than `max_idle`. Returns how many.
    #[instrument(skip(self))]
    pub async fn reap_idle(&self, max_idle: Duration) -> usize {
        let expired: Vec<SessionEntry> = {
            let mut sessions = self.sessions.lock().await;
            let stale: Vec<SessionId> = sessions
                .iter()
                .filter(|(_, entry)| entry.last_seen.elapsed() > max_idle)
                .map(|(id, _)| id.clone())
                .collect();
            stale.iter().filter_map(|id| sessions.remove(id)).collect()
        };
        let count = expired.len();
        for entry in expired {
            close(entry.session).await;
        }
        if count > 0 {
            info!(count, "Reaped idle sessions");
        }
        count
    }

    /// Ends all sessions, e.g. at server shutdown.
    #[instrument(skip(self))]
    pub async fn shutdown_all(&self) {
        let drained: Vec<SessionEntry> = self
            .sessions
            .lock()
            .await
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        info!(count = drained.len(), "Shutting down all sessions");
        for entry in drained {
            close(entry.session).await;
        }
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// True when no session is live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

/// Waits for any in-flight turn, then shuts the session down.
async fn close(shared: SharedSession) {
    match Arc::try_unwrap(shared) {
        Ok(mutex) => mutex.into_inner().shutdown().await,
        Err(shared) => {
            let mut session = shared.lock().await;
            let id = session.id().to_string();
            if let Err(e) = session.engine_mut().shutdown().await {
                warn!(session_id = %id, error = %e, "Engine did not shut down cleanly");
            }
            session.mark_engine_failed();
            info!(session_id = %id, "Session closed while still referenced");
        }
    }
}
