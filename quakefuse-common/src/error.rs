//! Common error types for QuakeFuse

use thiserror::Error;

/// Common result type for QuakeFuse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across QuakeFuse crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Outgoing message could not be delivered
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
