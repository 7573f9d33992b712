//! Application layer errors

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Listener {listener} failed: {message}")]
    Listener { listener: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BotError::NotFound(_))
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No ${0}! See README.md.")]
    MissingToken(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<serenity::Error> for BotError {
    fn from(e: serenity::Error) -> Self {
        use serenity::gateway::GatewayError;
        use serenity::http::HttpError;

        match &e {
            serenity::Error::Http(HttpError::UnsuccessfulRequest(resp))
                if resp.status_code.as_u16() == 404 =>
            {
                BotError::NotFound(resp.error.message.clone())
            }
            serenity::Error::Http(HttpError::UnsuccessfulRequest(resp))
                if resp.status_code.as_u16() == 401 =>
            {
                BotError::Auth(resp.error.message.clone())
            }
            serenity::Error::Gateway(GatewayError::InvalidAuthentication) => {
                BotError::Auth("Discord rejected the bot token".to_string())
            }
            serenity::Error::Gateway(_) | serenity::Error::Tungstenite(_) => {
                BotError::Network(e.to_string())
            }
            _ => BotError::Platform(e.to_string()),
        }
    }
}
