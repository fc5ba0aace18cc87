use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    // Standard library errors with automatic conversion
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // Query execution errors, mapped once at the HTTP boundary
    #[error("no database connection available within {waited_secs}s")]
    PoolExhausted { waited_secs: u64 },

    #[error("failed to establish database connection: {0}")]
    ConnectFailed(String),

    #[error("query references {expected} bind parameters but {provided} were provided")]
    QueryMalformed { expected: usize, provided: usize },

    #[error("query failed at {at}: {cause}")]
    QueryFailed { cause: String, at: DateTime<Utc> },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    /// Stable machine-readable tag for the `error` field of HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Io(_) => "io_error",
            GatewayError::Serde(_) => "serialization_error",
            GatewayError::PoolExhausted { .. } => "pool_exhausted",
            GatewayError::ConnectFailed(_) => "connect_failed",
            GatewayError::QueryMalformed { .. } => "query_malformed",
            GatewayError::QueryFailed { .. } => "query_failed",
            GatewayError::Configuration(_) => "configuration_error",
        }
    }
}
