//! External chess engine adapter speaking UCI over a child process.
//!
//! A [`UciEngine`] is launched once per game session and kept alive across
//! turns. The child is spawned with kill-on-drop, and [`ChessEngine::shutdown`]
//! sends `quit` first so well-behaved engines exit cleanly.

use crate::game;
use derive_more::{Display, Error};
use shakmaty::Chess;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Default slack granted on top of the search time before a reply counts as late.
pub const DEFAULT_OVERHEAD: Duration = Duration::from_secs(2);

/// Default limit for the `uci` / `isready` handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

const QUIT_GRACE: Duration = Duration::from_secs(1);

/// What the engine answered for a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineReply {
    /// Best move in UCI notation, as sent by the engine (not yet validated).
    Move(String),
    /// The engine found no legal move.
    NoMoveAvailable,
}

/// A long-lived handle to a move-choosing engine.
#[async_trait::async_trait]
pub trait ChessEngine: Send + std::fmt::Debug {
    /// Engine name for logs and display.
    fn name(&self) -> &str;

    /// Picks a reply for the side to move in `position` within `time_budget`.
    async fn choose_reply(
        &mut self,
        position: &Chess,
        time_budget: Duration,
    ) -> Result<EngineReply, EngineError>;

    /// Releases the underlying resource.
    async fn shutdown(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Starts fresh engine handles, one per session.
#[async_trait::async_trait]
pub trait EngineLauncher: Send + Sync {
    /// Launches a ready-to-use engine.
    async fn launch(&self) -> Result<Box<dyn ChessEngine>, EngineError>;
}

/// Category of engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EngineErrorKind {
    /// The process could not be started.
    Spawn,
    /// The process exited or closed its pipes.
    Terminated,
    /// The process did not answer in time.
    Timeout,
    /// The process answered with something unusable.
    Protocol,
    /// Reading or writing the pipes failed.
    Io,
}

/// Engine process failure; fatal to the owning session until relaunched.
#[derive(Debug, Clone, Display, Error)]
#[display("Engine error ({}): {} at {}:{}", kind, message, file, line)]
pub struct EngineError {
    /// Failure category.
    pub kind: EngineErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl EngineError {
    /// Creates a new engine error.
    #[track_caller]
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        error!(kind = %kind, error_message = %message, "Engine error created");
        Self {
            kind,
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Parses a `bestmove` line. Returns `None` for any other line.
pub fn parse_bestmove(line: &str) -> Option<Result<EngineReply, EngineError>> {
    let mut parts = line.split_whitespace();
    if parts.next() != Some("bestmove") {
        return None;
    }
    Some(match parts.next() {
        Some("(none)") | Some("0000") => Ok(EngineReply::NoMoveAvailable),
        Some(mv) => Ok(EngineReply::Move(mv.to_string())),
        None => Err(EngineError::new(
            EngineErrorKind::Protocol,
            "bestmove line without a move",
        )),
    })
}

/// How to start a UCI engine process.
#[derive(Debug, Clone)]
pub struct UciEngineLauncher {
    path: PathBuf,
    args: Vec<String>,
    options: BTreeMap<String, String>,
    overhead: Duration,
    handshake_timeout: Duration,
}

impl UciEngineLauncher {
    /// Creates a launcher for the binary at `path`.
    pub fn new(path: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            path: path.into(),
            args,
            options: BTreeMap::new(),
            overhead: DEFAULT_OVERHEAD,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// UCI options sent with `setoption` after the handshake.
    pub fn with_options(mut self, options: BTreeMap<String, String>) -> Self {
        self.options = options;
        self
    }

    /// Slack on top of the search time before a reply is considered late.
    pub fn with_overhead(mut self, overhead: Duration) -> Self {
        self.overhead = overhead;
        self
    }

    /// Limit for the startup handshake.
    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }
}

#[async_trait::async_trait]
impl EngineLauncher for UciEngineLauncher {
    async fn launch(&self) -> Result<Box<dyn ChessEngine>, EngineError> {
        let engine = UciEngine::launch(self).await?;
        Ok(Box::new(engine))
    }
}

/// A running UCI engine process.
#[derive(Debug)]
pub struct UciEngine {
    name: String,
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    overhead: Duration,
    closed: bool,
}

impl UciEngine {
    /// Spawns the engine and completes the UCI handshake.
    #[instrument(skip(launcher), fields(path = %launcher.path.display()))]
    pub async fn launch(launcher: &UciEngineLauncher) -> Result<Self, EngineError> {
        info!(args = ?launcher.args, "Spawning UCI engine");

        let mut child = Command::new(&launcher.path)
            .args(&launcher.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EngineError::new(
                    EngineErrorKind::Spawn,
                    format!("Failed to start {}: {}", launcher.path.display(), e),
                )
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            EngineError::new(EngineErrorKind::Spawn, "Failed to capture engine stdin")
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            EngineError::new(EngineErrorKind::Spawn, "Failed to capture engine stdout")
        })?;

        let mut engine = Self {
            name: launcher.path.display().to_string(),
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            overhead: launcher.overhead,
            closed: false,
        };

        engine.handshake(launcher).await?;
        info!(engine = %engine.name, "UCI engine ready");
        Ok(engine)
    }

    #[instrument(skip(self, launcher), fields(engine = %self.name))]
    async fn handshake(&mut self, launcher: &UciEngineLauncher) -> Result<(), EngineError> {
        self.send("uci").await?;
        let mut reported_name = None;
        self.read_until(launcher.handshake_timeout, |line| {
            if let Some(name) = line.strip_prefix("id name ") {
                reported_name = Some(name.trim().to_string());
            }
            line == "uciok"
        })
        .await?;
        if let Some(name) = reported_name {
            debug!(reported_name = %name, "Engine identified itself");
            self.name = name;
        }

        for (option, value) in &launcher.options {
            debug!(option = %option, value = %value, "Setting engine option");
            self.send(&format!("setoption name {} value {}", option, value))
                .await?;
        }

        self.send("isready").await?;
        self.read_until(launcher.handshake_timeout, |line| line == "readyok")
            .await?;
        Ok(())
    }

    async fn send(&mut self, command: &str) -> Result<(), EngineError> {
        debug!(command, "→ engine");
        let line = format!("{}\n", command);
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| io_error(&e))?;
        self.stdin.flush().await.map_err(|e| io_error(&e))
    }

    /// Reads lines until `done` accepts one, returning that line.
    async fn read_until<F>(&mut self, limit: Duration, mut done: F) -> Result<String, EngineError>
    where
        F: FnMut(&str) -> bool + Send,
    {
        let lines = &mut self.lines;
        let read = async {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        debug!(line = %line, "← engine");
                        if done(&line) {
                            return Ok(line);
                        }
                    }
                    Ok(None) => {
                        return Err(EngineError::new(
                            EngineErrorKind::Terminated,
                            "Engine closed its output",
                        ));
                    }
                    Err(e) => return Err(io_error(&e)),
                }
            }
        };

        timeout(limit, read).await.map_err(|_| {
            EngineError::new(
                EngineErrorKind::Timeout,
                format!("No answer from engine within {:?}", limit),
            )
        })?
    }

    fn ensure_running(&mut self) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::new(
                EngineErrorKind::Terminated,
                "Engine was shut down",
            ));
        }
        match self.child.try_wait() {
            Ok(Some(status)) => Err(EngineError::new(
                EngineErrorKind::Terminated,
                format!("Engine exited with {}", status),
            )),
            Ok(None) => Ok(()),
            Err(e) => Err(io_error(&e)),
        }
    }
}

#[async_trait::async_trait]
impl ChessEngine for UciEngine {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, position), fields(engine = %self.name, budget_ms = time_budget.as_millis() as u64))]
    async fn choose_reply(
        &mut self,
        position: &Chess,
        time_budget: Duration,
    ) -> Result<EngineReply, EngineError> {
        self.ensure_running()?;

        let fen = game::fen_of(position);
        let movetime = time_budget.as_millis().max(1);
        self.send(&format!("position fen {}", fen)).await?;
        self.send(&format!("go movetime {}", movetime)).await?;

        let limit = time_budget + self.overhead;
        let line = match self
            .read_until(limit, |line| line.starts_with("bestmove"))
            .await
        {
            Ok(line) => line,
            Err(e) => {
                if e.kind == EngineErrorKind::Timeout {
                    warn!("Engine overran its budget, asking it to stop");
                    let _ = self.send("stop").await;
                }
                return Err(e);
            }
        };

        let reply = parse_bestmove(&line).unwrap_or_else(|| {
            Err(EngineError::new(
                EngineErrorKind::Protocol,
                format!("Unexpected engine line: {}", line),
            ))
        })?;
        info!(reply = ?reply, "Engine replied");
        Ok(reply)
    }

    #[instrument(skip(self), fields(engine = %self.name))]
    async fn shutdown(&mut self) -> Result<(), EngineError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        info!("Shutting down engine");

        if let Err(e) = self.send("quit").await {
            debug!(error = %e, "Engine did not accept quit");
        }
        match timeout(QUIT_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(%status, "Engine exited");
                Ok(())
            }
            Ok(Err(e)) => Err(io_error(&e)),
            Err(_) => {
                warn!("Engine ignored quit, killing it");
                self.child.kill().await.map_err(|e| io_error(&e))
            }
        }
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        if !self.closed {
            debug!(engine = %self.name, "Killing engine process on drop");
            let _ = self.child.start_kill();
        }
    }
}

#[track_caller]
fn io_error(e: &std::io::Error) -> EngineError {
    let kind = match e.kind() {
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::UnexpectedEof => {
            EngineErrorKind::Terminated
        }
        _ => EngineErrorKind::Io,
    };
    EngineError::new(kind, format!("Engine pipe error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bestmove_with_ponder() {
        let reply = parse_bestmove("bestmove e7e5 ponder g1f3").expect("is bestmove");
        assert_eq!(reply.expect("parses"), EngineReply::Move("e7e5".to_string()));
    }

    #[test]
    fn test_parse_bestmove_none() {
        for line in ["bestmove (none)", "bestmove 0000"] {
            let reply = parse_bestmove(line).expect("is bestmove");
            assert_eq!(reply.expect("parses"), EngineReply::NoMoveAvailable);
        }
    }

    #[test]
    fn test_parse_bestmove_ignores_info_lines() {
        assert!(parse_bestmove("info depth 12 score cp 31 pv e2e4").is_none());
        assert!(parse_bestmove("").is_none());
    }

    #[test]
    fn test_parse_bestmove_without_move_is_protocol_error() {
        let err = parse_bestmove("bestmove")
            .expect("is bestmove")
            .expect_err("missing move");
        assert_eq!(err.kind, EngineErrorKind::Protocol);
    }

    #[tokio::test]
    async fn test_launch_missing_binary_is_spawn_error() {
        let launcher = UciEngineLauncher::new("/definitely/not/a/chess/engine", Vec::new());
        let err = UciEngine::launch(&launcher).await.expect_err("no such binary");
        assert_eq!(err.kind, EngineErrorKind::Spawn);
    }
}
