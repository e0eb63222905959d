//! Application configuration loaded from TOML with environment overrides.

use crate::engine::UciEngineLauncher;
use crate::llm_client::{LlmConfig, LlmProvider};
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Environment variable that overrides `engine.path`.
pub const ENGINE_PATH_ENV: &str = "DADBOT_ENGINE_PATH";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Getters, Serialize, Deserialize)]
pub struct DadbotConfig {
    /// External engine settings.
    #[serde(default)]
    engine: EngineSettings,

    /// Language model settings.
    #[serde(default)]
    commentary: CommentarySettings,

    /// HTTP server settings.
    #[serde(default)]
    server: ServerSettings,
}

/// How to run the UCI engine.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Engine binary.
    #[serde(default = "default_engine_path")]
    path: String,

    /// Extra command-line arguments for the engine.
    #[serde(default)]
    args: Vec<String>,

    /// Search time per reply, in milliseconds.
    #[serde(default = "default_think_time_ms")]
    think_time_ms: u64,

    /// Slack on top of the search time before a reply counts as late.
    #[serde(default = "default_overhead_ms")]
    overhead_ms: u64,

    /// UCI options passed with `setoption` (e.g. `Threads = "1"`).
    #[serde(default)]
    options: BTreeMap<String, String>,
}

/// Which model writes DadBot's lines.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct CommentarySettings {
    /// LLM provider (openai or anthropic).
    #[serde(default = "default_provider")]
    provider: LlmProvider,

    /// LLM model name.
    #[serde(default = "default_model")]
    model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    temperature: f32,

    /// Maximum tokens for each comment.
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,

    /// Optional compatible endpoint instead of the provider default.
    #[serde(default)]
    api_base: Option<String>,
}

/// Where the HTTP UI listens and how long sessions live.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host to bind to.
    #[serde(default = "default_host")]
    host: String,

    /// Port to bind to.
    #[serde(default = "default_port")]
    port: u16,

    /// Sessions idle longer than this are ended.
    #[serde(default = "default_session_idle_secs")]
    session_idle_secs: u64,

    /// Most sessions (and engine processes) alive at once.
    #[serde(default = "default_max_sessions")]
    max_sessions: usize,
}

fn default_engine_path() -> String {
    "/usr/games/stockfish".to_string()
}

fn default_think_time_ms() -> u64 {
    500
}

fn default_overhead_ms() -> u64 {
    2000
}

fn default_provider() -> LlmProvider {
    LlmProvider::OpenAI
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    150
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8501
}

fn default_session_idle_secs() -> u64 {
    1800
}

fn default_max_sessions() -> usize {
    32
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            path: default_engine_path(),
            args: Vec::new(),
            think_time_ms: default_think_time_ms(),
            overhead_ms: default_overhead_ms(),
            options: BTreeMap::new(),
        }
    }
}

impl Default for CommentarySettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_base: None,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_idle_secs: default_session_idle_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl EngineSettings {
    /// Search time per reply.
    pub fn think_time(&self) -> Duration {
        Duration::from_millis(self.think_time_ms)
    }

    /// Builds a launcher for this engine.
    pub fn launcher(&self) -> UciEngineLauncher {
        UciEngineLauncher::new(&self.path, self.args.clone())
            .with_options(self.options.clone())
            .with_overhead(Duration::from_millis(self.overhead_ms))
    }
}

impl ServerSettings {
    /// Idle limit for sessions.
    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }
}

impl DadbotConfig {
    /// Loads configuration from TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        info!(engine = %config.engine.path, model = %config.commentary.model, "Config loaded");
        Ok(config)
    }

    /// Loads the file if it exists, otherwise uses defaults; then applies
    /// environment overrides.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = if path.as_ref().exists() {
            Self::from_file(path)?
        } else {
            info!("Config file not found, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies overrides from a key lookup (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENGINE_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            info!(path = %path, "Engine path overridden from environment");
            self.engine.path = path;
        }
    }

    /// Overrides the HTTP bind address.
    pub fn set_listen(&mut self, host: Option<String>, port: Option<u16>) {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
    }

    /// Creates LLM configuration for the commentary model.
    ///
    /// Requires OPENAI_API_KEY or ANTHROPIC_API_KEY, depending on provider.
    #[instrument(skip(self, lookup), fields(provider = ?self.commentary.provider))]
    pub fn llm_config<F>(&self, lookup: F) -> Result<LlmConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key_var = match self.commentary.provider {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
        };
        let api_key = lookup(key_var)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::new(format!("{} environment variable not set", key_var)))?;

        Ok(LlmConfig::new(
            self.commentary.provider,
            api_key,
            self.commentary.model.clone(),
            self.commentary.max_tokens,
            self.commentary.temperature,
        )
        .with_api_base(self.commentary.api_base.clone()))
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
