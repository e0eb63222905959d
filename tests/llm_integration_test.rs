//! Integration test for LLM client connectivity.

use dadbot::{Commentator, DadBot, LlmClient, LlmConfig, LlmProvider};
use tracing::instrument;

const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

#[tokio::test]
#[cfg_attr(not(feature = "api"), ignore)]
#[instrument]
async fn test_anthropic_connectivity() {
    dotenvy::dotenv().ok();

    let api_key = std::env::var("ANTHROPIC_API_KEY").expect("ANTHROPIC_API_KEY not set");

    let config = LlmConfig::new(
        LlmProvider::Anthropic,
        api_key,
        "claude-3-5-haiku-20241022".to_string(),
        50,
        0.7,
    );

    let client = LlmClient::new(config);

    let response = client
        .generate("Say 'Hello, world!' and nothing else.")
        .await
        .expect("Failed to generate");

    assert!(!response.is_empty(), "Response should not be empty");
    eprintln!("Response: {}", response);
}

#[tokio::test]
#[cfg_attr(not(feature = "api"), ignore)]
#[instrument]
async fn test_openai_dadbot_comment() {
    dotenvy::dotenv().ok();

    let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");

    let config = LlmConfig::new(
        LlmProvider::OpenAI,
        api_key,
        "gpt-4o-mini".to_string(),
        80,
        0.7,
    );

    let dadbot = DadBot::new(LlmClient::new(config));

    let comment = dadbot
        .comment("e2e4", AFTER_E4)
        .await
        .expect("Failed to comment");

    assert!(!comment.trim().is_empty(), "Comment should not be empty");
    eprintln!("DadBot: {}", comment);
}
