//! Tests for TOML configuration and environment overrides.

use dadbot::{DadbotConfig, ENGINE_PATH_ENV, LlmProvider};
use std::io::Write;
use std::time::Duration;

const FULL_CONFIG: &str = r#"
[engine]
path = "/opt/engines/stockfish"
args = ["--quiet"]
think_time_ms = 250
overhead_ms = 1500

[engine.options]
Threads = "1"
Hash = "16"

[commentary]
provider = "anthropic"
model = "claude-3-5-haiku-20241022"
temperature = 0.4
max_tokens = 80

[server]
host = "0.0.0.0"
port = 9000
session_idle_secs = 60
max_sessions = 4
"#;

#[test]
fn test_full_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(FULL_CONFIG.as_bytes()).expect("write config");

    let config = DadbotConfig::from_file(file.path()).expect("config parses");
    assert_eq!(config.engine().path(), "/opt/engines/stockfish");
    assert_eq!(config.engine().args(), &vec!["--quiet".to_string()]);
    assert_eq!(config.engine().think_time(), Duration::from_millis(250));
    assert_eq!(config.engine().options().len(), 2);
    assert_eq!(config.engine().options()["Threads"], "1");

    assert_eq!(*config.commentary().provider(), LlmProvider::Anthropic);
    assert_eq!(config.commentary().model(), "claude-3-5-haiku-20241022");
    assert_eq!(*config.commentary().max_tokens(), 80);

    assert_eq!(config.server().host(), "0.0.0.0");
    assert_eq!(*config.server().port(), 9000);
    assert_eq!(config.server().session_idle(), Duration::from_secs(60));
    assert_eq!(*config.server().max_sessions(), 4);
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = DadbotConfig::from_toml("").expect("empty config parses");
    assert_eq!(config.engine().path(), "/usr/games/stockfish");
    assert_eq!(config.engine().think_time(), Duration::from_millis(500));
    assert_eq!(*config.commentary().provider(), LlmProvider::OpenAI);
    assert_eq!(config.commentary().model(), "gpt-4");
    assert!((config.commentary().temperature() - 0.7).abs() < f32::EPSILON);
    assert_eq!(*config.server().port(), 8501);
    assert_eq!(*config.server().max_sessions(), 32);
}

#[test]
fn test_partial_section_keeps_other_defaults() {
    let config = DadbotConfig::from_toml("[server]\nport = 8080\n").expect("parses");
    assert_eq!(*config.server().port(), 8080);
    assert_eq!(config.server().host(), "127.0.0.1");
    assert_eq!(config.engine().path(), "/usr/games/stockfish");
}

#[test]
fn test_invalid_toml_is_an_error() {
    let err = DadbotConfig::from_toml("[engine\npath = 3").expect_err("bad TOML");
    assert!(err.message.contains("Failed to parse config"));
}

#[test]
fn test_missing_file_loads_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = DadbotConfig::load(dir.path().join("absent.toml")).expect("defaults");
    assert_eq!(*config.server().port(), 8501);
}

#[test]
fn test_engine_path_override() {
    let mut config = DadbotConfig::default();
    config.apply_overrides(|key| (key == ENGINE_PATH_ENV).then(|| "/tmp/fish".to_string()));
    assert_eq!(config.engine().path(), "/tmp/fish");

    config.apply_overrides(|key| (key == ENGINE_PATH_ENV).then(|| "  ".to_string()));
    assert_eq!(config.engine().path(), "/tmp/fish");

    config.apply_overrides(|_| None);
    assert_eq!(config.engine().path(), "/tmp/fish");
}

#[test]
fn test_set_listen_overrides_only_given_values() {
    let mut config = DadbotConfig::default();
    config.set_listen(None, Some(9999));
    assert_eq!(config.server().host(), "127.0.0.1");
    assert_eq!(*config.server().port(), 9999);
}

#[test]
fn test_llm_config_requires_provider_key() {
    let config = DadbotConfig::default();
    let err = config.llm_config(|_| None).expect_err("no key");
    assert!(err.message.contains("OPENAI_API_KEY"));

    let err = config
        .llm_config(|_| Some(String::new()))
        .expect_err("blank key");
    assert!(err.message.contains("OPENAI_API_KEY"));

    let llm = config
        .llm_config(|key| (key == "OPENAI_API_KEY").then(|| "sk-test".to_string()))
        .expect("key present");
    assert_eq!(llm.provider(), LlmProvider::OpenAI);
    assert_eq!(llm.model(), "gpt-4");
}

#[test]
fn test_llm_config_for_anthropic() {
    let config = DadbotConfig::from_toml("[commentary]\nprovider = \"anthropic\"\n").expect("parses");
    let err = config
        .llm_config(|key| (key == "OPENAI_API_KEY").then(|| "sk-test".to_string()))
        .expect_err("wrong key");
    assert!(err.message.contains("ANTHROPIC_API_KEY"));

    let llm = config
        .llm_config(|key| (key == "ANTHROPIC_API_KEY").then(|| "ak-test".to_string()))
        .expect("key present");
    assert_eq!(llm.provider(), LlmProvider::Anthropic);
}
