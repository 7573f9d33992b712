//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::application::errors::ConfigError;

/// Default config file, looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "escape-roomba.yaml";

/// Token variable
pub const TOKEN_ENV: &str = "ESCAPE_ROOMBA_BOT_TOKEN";

/// Token variable used by older deployments
pub const LEGACY_TOKEN_ENV: &str = "ESCAPE_ROOMBA_TOKEN";

/// Discord returns at most this many messages per history request
pub const MAX_HISTORY_SCAN_LIMIT: u16 = 100;

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    pub logging: LoggingConfig,
    pub threads: ThreadConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    /// Prefer the environment; a token here is read last
    pub token: Option<String>,
    /// Request the privileged message content intent
    pub message_content: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: None,
            message_content: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LoggingConfig {
    pub debug: bool,
    pub debug_discord: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ThreadConfig {
    /// Recent messages checked per channel for 🧵 requests (1 to 100)
    pub history_scan_limit: u16,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self { history_scan_limit: 100 }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)?;
        Self::from_yaml(&content)
    }

    /// Load `path` if it exists, else defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.threads.history_scan_limit = config
            .threads
            .history_scan_limit
            .clamp(1, MAX_HISTORY_SCAN_LIMIT);
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to write config: {}", e)))
    }

    /// Pick the bot token from the CLI, the environment or this config
    pub fn resolve_token(&self, cli: Option<&str>) -> Result<String, ConfigError> {
        resolve_token(cli, |name| std::env::var(name).ok(), self.bot.token.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

/// Token from the environment, warning if only the legacy variable is set
pub fn env_token(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    if let Some(token) = non_blank(lookup(TOKEN_ENV).as_deref()) {
        return Some(token);
    }
    let token = non_blank(lookup(LEGACY_TOKEN_ENV).as_deref())?;
    tracing::warn!(
        target: "bot",
        "${} is deprecated, use ${} instead",
        LEGACY_TOKEN_ENV,
        TOKEN_ENV
    );
    Some(token)
}

/// Token in priority order (CLI, environment, config file), format-checked.
///
/// Blank values count as missing. No network access happens here.
pub fn resolve_token(
    cli: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
    file: Option<&str>,
) -> Result<String, ConfigError> {
    let token = non_blank(cli)
        .or_else(|| env_token(lookup))
        .or_else(|| non_blank(file))
        .ok_or_else(|| ConfigError::MissingToken(TOKEN_ENV.to_string()))?;

    serenity::utils::validate_token(&token)
        .map_err(|e| ConfigError::InvalidToken(e.to_string()))?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TOKEN: &str = "MTIz.NDU2.Nzg5";

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.bot.token.is_none());
        assert!(config.bot.message_content);
        assert!(!config.logging.debug);
        assert_eq!(config.threads.history_scan_limit, 100);
    }

    #[test]
    fn test_partial_yaml() {
        let config = Config::from_yaml("logging:\n  debug-discord: true\nthreads:\n  history-scan-limit: 250\n");
        let config = config.unwrap();
        assert!(config.logging.debug_discord);
        assert!(!config.logging.debug);
        assert_eq!(config.threads.history_scan_limit, 100);
        assert!(config.bot.message_content);
    }

    #[test]
    fn test_history_scan_limit_clamped() {
        let limit = |yaml: &str| Config::from_yaml(yaml).unwrap().threads.history_scan_limit;
        assert_eq!(limit("threads:\n  history-scan-limit: 300\n"), 100);
        assert_eq!(limit("threads:\n  history-scan-limit: 0\n"), 1);
        assert_eq!(limit("threads:\n  history-scan-limit: 42\n"), 42);
    }

    #[test]
    fn test_yaml_round_trip() {
        let yaml = Config::default().to_yaml().unwrap();
        assert!(yaml.contains("history-scan-limit: 100"));
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.threads.history_scan_limit, 100);
    }

    #[test]
    fn test_token_priority() {
        let both = env(&[(TOKEN_ENV, "ENV.ENV.ENV"), (LEGACY_TOKEN_ENV, "OLD.OLD.OLD")]);
        assert_eq!(resolve_token(Some(TOKEN), &both, None).unwrap(), TOKEN);
        assert_eq!(resolve_token(None, &both, Some(TOKEN)).unwrap(), "ENV.ENV.ENV");

        let legacy = env(&[(LEGACY_TOKEN_ENV, "OLD.OLD.OLD")]);
        assert_eq!(resolve_token(None, &legacy, None).unwrap(), "OLD.OLD.OLD");

        assert_eq!(resolve_token(None, env(&[]), Some(TOKEN)).unwrap(), TOKEN);
    }

    #[test]
    fn test_blank_token_is_missing() {
        let blank = env(&[(TOKEN_ENV, "   ")]);
        let err = resolve_token(Some(""), blank, None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingToken(_)));
        assert_eq!(err.to_string(), "No $ESCAPE_ROOMBA_BOT_TOKEN! See README.md.");
    }

    #[test]
    fn test_malformed_token() {
        let err = resolve_token(Some("not-a-token"), env(&[]), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidToken(_)));
    }
}
