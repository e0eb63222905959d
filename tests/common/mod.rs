//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use dadbot::{
    ChessEngine, CommentaryError, Commentator, EngineError, EngineErrorKind, EngineLauncher,
    EngineReply, legal_move_strings,
};
use shakmaty::Chess;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counters shared between a fake engine and the test that owns it.
#[derive(Debug, Clone, Default)]
pub struct EngineProbe {
    calls: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl EngineProbe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

/// What a fake engine does when asked for a reply.
#[derive(Debug, Clone)]
pub enum Script {
    /// Play the first legal move.
    FirstLegal,
    /// Send this exact reply.
    Reply(EngineReply),
    /// Fail with this kind of error.
    Fail(EngineErrorKind),
}

/// Engine that follows a queue of scripted answers, then plays the first legal move.
#[derive(Debug)]
pub struct FakeEngine {
    script: VecDeque<Script>,
    probe: EngineProbe,
}

impl FakeEngine {
    pub fn first_legal() -> (Self, EngineProbe) {
        Self::scripted(Vec::new())
    }

    pub fn scripted(script: Vec<Script>) -> (Self, EngineProbe) {
        let probe = EngineProbe::default();
        (
            Self {
                script: script.into(),
                probe: probe.clone(),
            },
            probe,
        )
    }

    pub fn boxed(self) -> Box<dyn ChessEngine> {
        Box::new(self)
    }
}

#[async_trait::async_trait]
impl ChessEngine for FakeEngine {
    fn name(&self) -> &str {
        "FakeEngine"
    }

    async fn choose_reply(
        &mut self,
        position: &Chess,
        _time_budget: Duration,
    ) -> Result<EngineReply, EngineError> {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front().unwrap_or(Script::FirstLegal) {
            Script::FirstLegal => Ok(legal_move_strings(position)
                .into_iter()
                .next()
                .map(EngineReply::Move)
                .unwrap_or(EngineReply::NoMoveAvailable)),
            Script::Reply(reply) => Ok(reply),
            Script::Fail(kind) => Err(EngineError::new(kind, "scripted failure")),
        }
    }

    async fn shutdown(&mut self) -> Result<(), EngineError> {
        self.probe.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Launcher handing out fake engines; all launched engines share one probe.
#[derive(Debug, Clone)]
pub struct FakeLauncher {
    script: Vec<Script>,
    fail_launch: bool,
    launches: Arc<AtomicUsize>,
    probe: EngineProbe,
}

impl FakeLauncher {
    pub fn healthy() -> Self {
        Self::with_script(Vec::new())
    }

    /// Every launched engine starts with `script`.
    pub fn with_script(script: Vec<Script>) -> Self {
        Self {
            script,
            fail_launch: false,
            launches: Arc::new(AtomicUsize::new(0)),
            probe: EngineProbe::default(),
        }
    }

    pub fn unlaunchable() -> Self {
        Self {
            fail_launch: true,
            ..Self::healthy()
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn probe(&self) -> &EngineProbe {
        &self.probe
    }
}

#[async_trait::async_trait]
impl EngineLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn ChessEngine>, EngineError> {
        if self.fail_launch {
            return Err(EngineError::new(EngineErrorKind::Spawn, "no engine installed"));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeEngine {
            script: self.script.clone().into(),
            probe: self.probe.clone(),
        }))
    }
}

/// Commentator that records its calls and either echoes or fails.
#[derive(Debug, Clone, Default)]
pub struct FakeCommentator {
    fail: bool,
    fail_on: Option<usize>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeCommentator {
    pub fn chatty() -> Self {
        Self::default()
    }

    pub fn broken() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Fails only on the `n`th call (1-based) and echoes otherwise.
    pub fn failing_on(n: usize) -> Self {
        Self {
            fail_on: Some(n),
            ..Self::default()
        }
    }

    /// `(move, fen)` pairs seen so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Commentator for FakeCommentator {
    async fn comment(&self, move_uci: &str, fen: &str) -> Result<String, CommentaryError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((move_uci.to_string(), fen.to_string()));
            calls.len()
        };
        if self.fail || self.fail_on == Some(call) {
            Err(CommentaryError::new("rate limited"))
        } else {
            Ok(format!("Nice {}, kiddo!", move_uci))
        }
    }
}
