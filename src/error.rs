use thiserror::Error;

/// Failures at the JSON-RPC boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("Failed to decode RPC response: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid private key #{index}: {reason}")]
    InvalidKey { index: usize, reason: String },

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Failed to sign transaction: {0}")]
    Signing(String),

    #[error("Unknown token symbol: {0}")]
    UnknownToken(String),

    #[error("Invalid amount {amount}: {reason}")]
    Amount { amount: String, reason: String },
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
