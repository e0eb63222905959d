//! Terminal rendition of the game page: type a move, read DadBot's reply.

use crate::engine::EngineLauncher;
use crate::session::GameSession;
use crate::turn::{TurnError, TurnSequencer};
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, instrument, warn};

/// Plays one session on stdin/stdout until `quit` or end of input.
#[instrument(skip_all)]
pub async fn run_terminal(sequencer: TurnSequencer, launcher: &dyn EngineLauncher) -> Result<()> {
    let engine = launcher.launch().await?;
    let mut session = GameSession::new("terminal".to_string(), engine);
    info!(engine = %session.engine_name(), "Terminal game started");

    println!("♟️  DadBot: Your Father's Day Chess Buddy");
    println!("Type a move like e2e4, or: moves, restart, quit\n");
    print_position(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => continue,
            "quit" | "exit" => break,
            "moves" => {
                println!("Legal moves: {}", session.legal_moves().join(" "));
                continue;
            }
            "restart" => {
                match session.restart(launcher).await {
                    Ok(relaunched) => {
                        if relaunched {
                            println!("Started a fresh chess engine.");
                        }
                        println!("🔄 New game!\n");
                        print_position(&session);
                    }
                    Err(e) => {
                        warn!(error = %e, "Engine relaunch failed");
                        println!("💥 The chess engine could not be restarted: {}", e.message);
                        println!("Type 'restart' to try again, or 'quit'.");
                    }
                }
                continue;
            }
            _ => {}
        }

        match sequencer.play_turn(&mut session, input).await {
            Ok(outcome) => {
                for warning in outcome.warnings() {
                    println!("⚠️  {}", warning);
                }
                println!("{}\n", session.current_commentary());
            }
            Err(TurnError::InvalidMove { attempted }) => {
                println!("❌ Invalid move: {}. Type 'moves' to list legal moves.", attempted);
                continue;
            }
            Err(TurnError::GameOver(report)) => {
                for warning in report.warnings() {
                    println!("⚠️  {}", warning);
                }
                if !session.current_commentary().is_empty() {
                    println!("{}\n", session.current_commentary());
                }
                println!("Game over: {}. Type 'restart' to play again.", report.status());
            }
            Err(TurnError::EngineUnavailable(e)) => {
                warn!(error = %e, "Engine failed during terminal game");
                println!("💥 The chess engine stopped working: {}", e.message);
                println!("Type 'restart' to start a fresh engine.");
                continue;
            }
        }
        print_position(&session);
    }

    session.shutdown().await;
    Ok(())
}

fn print_position(session: &GameSession) {
    println!("{}\n", session.board_text());
    if !session.status().is_over() {
        println!("Your move ({} legal):", session.legal_moves().len());
    }
}
