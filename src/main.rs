//! DadBot - unified CLI
//!
//! Serves the web UI or plays a game in the terminal.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use dadbot::{
    AppState, Commentator, DadBot, DadbotConfig, EngineLauncher, LlmClient, OfflineCommentator,
    SessionManager, TurnSequencer,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    initialize_tracing();

    let mut config = DadbotConfig::load(&cli.config)?;
    let commentator = build_commentator(&config);
    let sequencer = TurnSequencer::new(commentator).with_time_budget(config.engine().think_time());
    let launcher = Arc::new(config.engine().launcher());

    match cli.command {
        Command::Serve { host, port } => {
            config.set_listen(host, port);
            let server = config.server();
            let sessions = SessionManager::with_limit(*server.max_sessions());
            let state = AppState::new(sessions, sequencer, launcher);
            dadbot::serve(state, server.host(), *server.port(), server.session_idle()).await
        }
        Command::Play => {
            let launcher: Arc<dyn EngineLauncher> = launcher;
            dadbot::run_terminal(sequencer, launcher.as_ref()).await
        }
    }
}

/// Builds DadBot, or an offline stand-in when no credential is set.
#[instrument(skip(config))]
fn build_commentator(config: &DadbotConfig) -> Arc<dyn Commentator> {
    match config.llm_config(|key| std::env::var(key).ok()) {
        Ok(llm_config) => Arc::new(DadBot::new(LlmClient::new(llm_config))),
        Err(e) => {
            warn!(error = %e.message, "DadBot commentary disabled");
            Arc::new(OfflineCommentator)
        }
    }
}

fn initialize_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,dadbot=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Tracing initialized");
}
