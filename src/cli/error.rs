//! CLI error types and conversions

use crate::stats::StatsError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Stats client error
    #[error("stats error: {0}")]
    Stats(#[from] StatsError),

    /// Output could not be serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
