//! Tests for the UCI process adapter against small shell-script engines.

#![cfg(unix)]

use dadbot::{
    ChessEngine, EngineErrorKind, EngineReply, UciEngine, UciEngineLauncher, position_from_fen,
    starting_position,
};
use std::time::Duration;

/// Builds a `sh -c` engine whose reply to `go` is `on_go` and to `uci` is `on_uci`.
fn script_engine(on_uci: &str, on_go: &str) -> UciEngineLauncher {
    let script = format!(
        r#"while read -r line; do
  case "$line" in
    uci) {on_uci} ;;
    isready) echo "readyok" ;;
    go*) {on_go} ;;
    quit) exit 0 ;;
  esac
done"#
    );
    UciEngineLauncher::new("sh", vec!["-c".to_string(), script])
        .with_overhead(Duration::from_millis(300))
        .with_handshake_timeout(Duration::from_secs(5))
}

const HANDSHAKE: &str = r#"echo "id name FakeFish 1.0"; echo "id author Nobody"; echo "uciok""#;

#[tokio::test]
async fn test_handshake_and_bestmove() {
    let launcher = script_engine(
        HANDSHAKE,
        r#"echo "info depth 1 score cp 20 pv e7e5"; echo "bestmove e7e5 ponder g1f3""#,
    );
    let mut engine = UciEngine::launch(&launcher).await.expect("engine starts");
    assert_eq!(engine.name(), "FakeFish 1.0");

    let after_e4 =
        position_from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1")
            .expect("valid FEN");
    let reply = engine
        .choose_reply(&after_e4, Duration::from_millis(50))
        .await
        .expect("engine replies");
    assert_eq!(reply, EngineReply::Move("e7e5".to_string()));

    // The same process answers again on the next turn.
    let reply = engine
        .choose_reply(&after_e4, Duration::from_millis(50))
        .await
        .expect("engine replies twice");
    assert_eq!(reply, EngineReply::Move("e7e5".to_string()));

    engine.shutdown().await.expect("clean shutdown");
    let err = engine
        .choose_reply(&after_e4, Duration::from_millis(50))
        .await
        .expect_err("engine is closed");
    assert_eq!(err.kind, EngineErrorKind::Terminated);
}

#[tokio::test]
async fn test_bestmove_none_is_no_move_available() {
    let launcher = script_engine(HANDSHAKE, r#"echo "bestmove (none)""#);
    let mut engine = UciEngine::launch(&launcher).await.expect("engine starts");
    let reply = engine
        .choose_reply(&starting_position(), Duration::from_millis(50))
        .await
        .expect("engine replies");
    assert_eq!(reply, EngineReply::NoMoveAvailable);
    engine.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn test_silent_engine_times_out() {
    let launcher = script_engine(HANDSHAKE, r#"echo "info depth 1""#);
    let mut engine = UciEngine::launch(&launcher).await.expect("engine starts");
    let err = engine
        .choose_reply(&starting_position(), Duration::from_millis(50))
        .await
        .expect_err("no bestmove ever arrives");
    assert_eq!(err.kind, EngineErrorKind::Timeout);
    engine.shutdown().await.expect("shutdown after timeout");
}

#[tokio::test]
async fn test_engine_exiting_mid_search_is_terminated() {
    let launcher = script_engine(HANDSHAKE, "exit 3");
    let mut engine = UciEngine::launch(&launcher).await.expect("engine starts");
    let err = engine
        .choose_reply(&starting_position(), Duration::from_millis(50))
        .await
        .expect_err("engine died");
    assert_eq!(err.kind, EngineErrorKind::Terminated);
}

#[tokio::test]
async fn test_missing_uciok_fails_handshake() {
    let launcher = script_engine(r#"echo "id name Mute""#, r#"echo "bestmove e7e5""#)
        .with_handshake_timeout(Duration::from_millis(200));
    let err = UciEngine::launch(&launcher)
        .await
        .expect_err("handshake never completes");
    assert_eq!(err.kind, EngineErrorKind::Timeout);
}

#[tokio::test]
async fn test_engine_that_exits_at_startup_is_terminated() {
    let launcher = UciEngineLauncher::new("sh", vec!["-c".to_string(), "exit 0".to_string()])
        .with_handshake_timeout(Duration::from_secs(5));
    let err = UciEngine::launch(&launcher)
        .await
        .expect_err("engine is gone");
    assert_eq!(err.kind, EngineErrorKind::Terminated);
}
