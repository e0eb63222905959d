//! DadBot commentary: one short quip per move from a hosted language model.

use crate::llm_client::{LlmClient, LlmError};
use derive_more::{Display, Error};
use tracing::{debug, info, instrument, warn};

/// Comment shown in place of a missing one.
pub const FALLBACK_COMMENT: &str = "DadBot is lost for words this time.";

/// Builds the fixed DadBot prompt for a move and the position it produced.
pub fn build_prompt(move_uci: &str, fen: &str) -> String {
    format!(
        "You are DadBot — a witty, chess-loving dad who gives playful, encouraging, or sarcastic advice.\n\
         A move was played: {move_uci}\n\
         Board state (FEN): {fen}\n\
         Respond in 1–2 sentences. Make it fun, clever, or heartwarming."
    )
}

/// Source of move commentary.
#[async_trait::async_trait]
pub trait Commentator: Send + Sync {
    /// Returns a short comment about `move_uci`, which produced `fen`.
    async fn comment(&self, move_uci: &str, fen: &str) -> Result<String, CommentaryError>;
}

/// Commentator backed by an [`LlmClient`].
#[derive(Debug, Clone)]
pub struct DadBot {
    client: LlmClient,
}

impl DadBot {
    /// Creates a DadBot that talks through `client`.
    #[instrument(skip(client), fields(model = %client.config().model()))]
    pub fn new(client: LlmClient) -> Self {
        info!("Creating DadBot commentator");
        Self { client }
    }
}

#[async_trait::async_trait]
impl Commentator for DadBot {
    #[instrument(skip(self, fen), fields(move_uci = %move_uci))]
    async fn comment(&self, move_uci: &str, fen: &str) -> Result<String, CommentaryError> {
        let prompt = build_prompt(move_uci, fen);
        let text = self.client.generate(&prompt).await?;
        let text = text.trim();
        if text.is_empty() {
            warn!("Model returned an empty comment");
            return Err(CommentaryError::new("Model returned an empty comment"));
        }
        debug!(comment_length = text.len(), "Comment received");
        Ok(text.to_string())
    }
}

/// Commentator used when no model credential is configured.
///
/// Every call fails, so turns carry the fallback comment and a warning.
#[derive(Debug, Clone, Default)]
pub struct OfflineCommentator;

#[async_trait::async_trait]
impl Commentator for OfflineCommentator {
    async fn comment(&self, _move_uci: &str, _fen: &str) -> Result<String, CommentaryError> {
        Err(CommentaryError::new("No language model credential configured"))
    }
}

/// Commentary could not be produced (network, auth, rate limit, empty reply).
#[derive(Debug, Clone, Display, Error)]
#[display("Commentary unavailable: {} at {}:{}", message, file, line)]
pub struct CommentaryError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl CommentaryError {
    /// Creates a new commentary error.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<LlmError> for CommentaryError {
    #[track_caller]
    fn from(err: LlmError) -> Self {
        Self::new(err.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_move_and_fen() {
        let prompt = build_prompt("e2e4", "8/8/8/8/8/8/8/8 w - - 0 1");
        assert!(prompt.starts_with("You are DadBot — a witty, chess-loving dad"));
        assert!(prompt.contains("\nA move was played: e2e4\n"));
        assert!(prompt.contains("\nBoard state (FEN): 8/8/8/8/8/8/8/8 w - - 0 1\n"));
        assert!(prompt.ends_with("Respond in 1–2 sentences. Make it fun, clever, or heartwarming."));
    }

    #[tokio::test]
    async fn test_offline_commentator_always_fails() {
        let result = OfflineCommentator.comment("e2e4", "fen").await;
        assert!(result.is_err());
    }
}
