use thiserror::Error;

/// Errors surfaced by the adapters and the trading step.
///
/// Everything except `Config` is recoverable: the trading loop reports it and
/// tries again on the next cycle.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("exchange returned {status}: {message}")]
    Exchange { status: u16, message: String },

    #[error("unexpected exchange payload: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification used at the cycle boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DataUnavailable,
    OrderRejected,
    TransientInfra,
    Config,
}

impl BotError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BotError::DataUnavailable(_) => ErrorKind::DataUnavailable,
            BotError::OrderRejected(_) => ErrorKind::OrderRejected,
            BotError::Http(_) | BotError::Exchange { .. } | BotError::Decode(_) => {
                ErrorKind::TransientInfra
            }
            BotError::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<config::ConfigError> for BotError {
    fn from(err: config::ConfigError) -> Self {
        BotError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Decode(err.to_string())
    }
}
