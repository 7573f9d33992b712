//! Configuration integration tests
//! Run with: cargo test --test config_test

use std::path::PathBuf;

use escape_roomba::application::errors::ConfigError;
use escape_roomba::infrastructure::config::{resolve_token, Config};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("escape-roomba-{}-{}.yaml", name, std::process::id()))
}

#[test]
fn test_load_config_file() {
    let path = temp_path("load");
    std::fs::write(
        &path,
        "bot:\n  token: MTIz.NDU2.Nzg5\n  message-content: false\nthreads:\n  history-scan-limit: 20\n",
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.bot.token.as_deref(), Some("MTIz.NDU2.Nzg5"));
    assert!(!config.bot.message_content);
    assert_eq!(config.threads.history_scan_limit, 20);
    assert!(!config.logging.debug);

    let token = resolve_token(None, |_| None, config.bot.token.as_deref()).unwrap();
    assert_eq!(token, "MTIz.NDU2.Nzg5");
}

#[test]
fn test_missing_file_uses_defaults() {
    let path = temp_path("missing");
    let config = Config::load_or_default(&path).unwrap();
    assert_eq!(config.threads.history_scan_limit, 100);

    assert!(matches!(Config::load(&path), Err(ConfigError::Io(_))));
}

#[test]
fn test_bad_yaml_is_parse_error() {
    let path = temp_path("bad");
    std::fs::write(&path, "threads: 42\n").unwrap();
    let result = Config::load(&path);
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_no_token_anywhere() {
    let err = resolve_token(None, |_| None, None).unwrap_err();
    assert_eq!(err.to_string(), "No $ESCAPE_ROOMBA_BOT_TOKEN! See README.md.");
}
