//! Error taxonomy

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed classification of every failure the pipeline handles
///
/// Used as a map key by statistics, the error monitor, retry policies and the
/// recovery manager's strategy and fallback tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Malformed wire data
    ParseError,
    /// Well-formed but protocol or policy non-compliant
    ValidationError,
    /// Internal failure while executing accepted business logic
    ProcessingError,
    /// I/O layer failure
    TransportError,
    /// Credential failure
    AuthenticationError,
    /// RFC 4028 negotiation failure
    SessionTimerError,
}

impl ErrorType {
    pub const ALL: [ErrorType; 6] = [
        ErrorType::ParseError,
        ErrorType::ValidationError,
        ErrorType::ProcessingError,
        ErrorType::TransportError,
        ErrorType::AuthenticationError,
        ErrorType::SessionTimerError,
    ];

    /// Stable snake_case label used in logs and exported statistics
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::ParseError => "parse_error",
            ErrorType::ValidationError => "validation_error",
            ErrorType::ProcessingError => "processing_error",
            ErrorType::TransportError => "transport_error",
            ErrorType::AuthenticationError => "authentication_error",
            ErrorType::SessionTimerError => "session_timer_error",
        }
    }

    /// Position in [`ErrorType::ALL`]
    pub(crate) fn index(&self) -> usize {
        match self {
            ErrorType::ParseError => 0,
            ErrorType::ValidationError => 1,
            ErrorType::ProcessingError => 2,
            ErrorType::TransportError => 3,
            ErrorType::AuthenticationError => 4,
            ErrorType::SessionTimerError => 5,
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorType {
    type Err = String;

    /// Accepts the snake_case label, with or without the `_error` suffix
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        ErrorType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower || t.as_str().trim_end_matches("_error") == lower)
            .ok_or_else(|| format!("unknown error type: {}", s))
    }
}
