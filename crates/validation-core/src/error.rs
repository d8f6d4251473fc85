//! Error types for pipeline setup and management operations
//!
//! Protocol failures never appear here; they become responses.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Logging setup error: {0}")]
    Logging(String),

    #[error("Unknown circuit breaker: {0}")]
    UnknownCircuitBreaker(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
