use crate::types::{MAX_MINES, MIN_MINES};

/// Reasons a round cannot be started. Nothing in the session changes when one is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoundError {
    #[error("Account is banned")]
    Banned { reason: Option<String> },

    #[error("Mine count must be between {} and {}, got {}", MIN_MINES, MAX_MINES, .0)]
    InvalidMineCount(u8),

    #[error("Invalid bet amount: {0}")]
    InvalidBet(f64),

    #[error("Insufficient balance: need {needed:.2}, have {available:.2}")]
    InsufficientBalance { needed: f64, available: f64 },

    #[error("A round is already in progress")]
    RoundInProgress,
}

/// Failures talking to the remote balance service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rejected by server: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Failures of wallet operations (deposit / withdraw) that the caller must surface.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("Insufficient balance: need {needed:.2}, have {available:.2}")]
    InsufficientBalance { needed: f64, available: f64 },

    #[error(transparent)]
    Service(#[from] ServiceError),
}
