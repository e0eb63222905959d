//! HTTP front end: one game session per browser, identified by a cookie.

use crate::engine::{EngineError, EngineLauncher};
use crate::game::GameStatus;
use crate::page::{self, GameView, Notice};
use crate::session::{GameSession, SessionId, SessionManager, SharedSession, TurnPhase};
use crate::turn::{TurnError, TurnSequencer};
use axum::extract::{Form, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "dadbot_session";

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    sessions: SessionManager,
    sequencer: TurnSequencer,
    launcher: Arc<dyn EngineLauncher>,
}

impl AppState {
    /// Creates the server state.
    pub fn new(
        sessions: SessionManager,
        sequencer: TurnSequencer,
        launcher: Arc<dyn EngineLauncher>,
    ) -> Self {
        Self {
            sessions,
            sequencer,
            launcher,
        }
    }

    /// The session manager.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}

/// Move form submitted from the page.
#[derive(Debug, Deserialize)]
pub struct MoveForm {
    /// Move in UCI notation.
    pub mv: String,
}

/// JSON view of a session.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    session_id: SessionId,
    fen: String,
    board: String,
    legal_moves: Vec<String>,
    commentary: String,
    phase: TurnPhase,
    status: GameStatus,
    engine: String,
    engine_failed: bool,
}

impl SessionSnapshot {
    fn of(session: &GameSession) -> Self {
        Self {
            session_id: session.id().to_string(),
            fen: session.current_fen(),
            board: session.board_text(),
            legal_moves: session.legal_moves(),
            commentary: session.current_commentary().to_string(),
            phase: session.phase(),
            status: session.status(),
            engine: session.engine_name().to_string(),
            engine_failed: session.engine_failed(),
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/move", post(make_move))
        .route("/restart", post(restart))
        .route("/end", post(end_session))
        .route("/api/state", get(state_json))
        .route("/health", get(health))
        .with_state(state)
}

/// Serves the UI until Ctrl-C or SIGTERM, then closes every session.
#[instrument(skip(state))]
pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    session_idle: Duration,
) -> anyhow::Result<()> {
    serve_until(state, host, port, session_idle, shutdown_signal()).await
}

/// Serves the UI until `shutdown` resolves, then closes every session.
///
/// Sessions are drained even when the server itself stops with an error.
#[instrument(skip(state, shutdown))]
pub async fn serve_until<F>(
    state: AppState,
    host: &str,
    port: u16,
    session_idle: Duration,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sessions = state.sessions.clone();
    let reaper = tokio::spawn(reap_idle_sessions(sessions.clone(), session_idle));

    let result = async {
        let listener = tokio::net::TcpListener::bind((host, port)).await?;
        info!("✅ DadBot ready at http://{}/", listener.local_addr()?);
        axum::serve(listener, router(state))
            .with_graceful_shutdown(shutdown)
            .await?;
        anyhow::Ok(())
    }
    .await;

    reaper.abort();
    sessions.shutdown_all().await;
    result
}

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}

async fn reap_idle_sessions(sessions: SessionManager, max_idle: Duration) {
    let period = (max_idle / 4).max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        sessions.reap_idle(max_idle).await;
    }
}

fn session_id_from(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

fn set_cookie(id: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}

fn clear_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

async fn existing_session(state: &AppState, headers: &HeaderMap) -> Option<SharedSession> {
    let id = session_id_from(headers)?;
    state.sessions.get(&id).await
}

#[instrument(skip(state))]
async fn open_session(state: &AppState) -> Result<(SessionId, SharedSession), EngineError> {
    let engine = state.launcher.launch().await?;
    let id = uuid::Uuid::new_v4().to_string();
    let shared = state
        .sessions
        .insert(GameSession::new(id.clone(), engine))
        .await;
    Ok((id, shared))
}

fn game_view(session: &GameSession, notices: Vec<Notice>) -> GameView {
    GameView {
        board: session.board_text(),
        legal_moves: session.legal_moves(),
        commentary: session.current_commentary().to_string(),
        status: session.status(),
        notices,
    }
}

fn engine_down_page(e: &EngineError) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Html(page::render_fatal(&format!(
            "The chess engine could not be started: {}",
            e.message
        ))),
    )
        .into_response()
}

#[instrument(skip_all)]
async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(shared) = existing_session(&state, &headers).await {
        let session = shared.lock().await;
        let mut notices = Vec::new();
        if session.engine_failed() {
            notices.push(Notice::error(
                "The chess engine stopped working. Restart the game to continue.",
            ));
        }
        return Html(page::render_game(&game_view(&session, notices))).into_response();
    }

    if state.sessions.is_full().await {
        warn!("Session limit reached, turning visitor away");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Html(page::render_fatal(
                "DadBot is busy with other players right now. Please try again later.",
            )),
        )
            .into_response();
    }

    match open_session(&state).await {
        Ok((id, shared)) => {
            let session = shared.lock().await;
            info!(session_id = %id, "New visitor session");
            (
                [(header::SET_COOKIE, set_cookie(&id))],
                Html(page::render_game(&game_view(&session, Vec::new()))),
            )
                .into_response()
        }
        Err(e) => engine_down_page(&e),
    }
}

#[instrument(skip_all)]
async fn make_move(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<MoveForm>,
) -> Response {
    debug!(mv = %form.mv, "Move submitted");
    let Some(shared) = existing_session(&state, &headers).await else {
        debug!("Move without a session, sending to the start page");
        return Redirect::to("/").into_response();
    };
    let mut session = shared.lock().await;

    let (status, notices) = match state.sequencer.play_turn(&mut session, &form.mv).await {
        Ok(outcome) => (
            StatusCode::OK,
            outcome.warnings().iter().cloned().map(Notice::warning).collect(),
        ),
        Err(TurnError::InvalidMove { attempted }) => (
            StatusCode::BAD_REQUEST,
            vec![Notice::error(format!("Invalid move: {}", attempted))],
        ),
        Err(TurnError::GameOver(report)) => {
            let mut notices = vec![Notice::info(format!("Game over: {}", report.status()))];
            notices.extend(report.warnings().iter().cloned().map(Notice::warning));
            (StatusCode::OK, notices)
        }
        Err(TurnError::EngineUnavailable(e)) => {
            warn!(error = %e, "Turn aborted by engine failure");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                vec![Notice::error(format!(
                    "The chess engine stopped working ({}). Restart the game to continue.",
                    e.message
                ))],
            )
        }
    };

    (status, Html(page::render_game(&game_view(&session, notices)))).into_response()
}

#[instrument(skip_all)]
async fn restart(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(shared) = existing_session(&state, &headers).await else {
        return Redirect::to("/").into_response();
    };
    let mut session = shared.lock().await;

    let notices = match session.restart(state.launcher.as_ref()).await {
        Ok(true) => vec![Notice::info("Started a fresh chess engine.")],
        Ok(false) => Vec::new(),
        Err(e) => vec![Notice::error(format!(
            "The chess engine could not be restarted: {}",
            e.message
        ))],
    };

    Html(page::render_game(&game_view(&session, notices))).into_response()
}

#[instrument(skip_all)]
async fn end_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id_from(&headers) {
        let ended = state.sessions.end(&id).await;
        debug!(session_id = %id, ended, "End session requested");
    }
    (
        [(header::SET_COOKIE, clear_cookie())],
        Html(page::render_goodbye()),
    )
        .into_response()
}

#[instrument(skip_all)]
async fn state_json(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match existing_session(&state, &headers).await {
        Some(shared) => {
            let session = shared.lock().await;
            Json(SessionSnapshot::of(&session)).into_response()
        }
        None => (StatusCode::NOT_FOUND, "no session").into_response(),
    }
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_id_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; dadbot_session=abc-123; other=1"),
        );
        assert_eq!(session_id_from(&headers).as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_session_id_ignores_similar_names() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("dadbot_session_old=zzz; dadbot_session="),
        );
        assert_eq!(session_id_from(&headers), None);
    }
}
