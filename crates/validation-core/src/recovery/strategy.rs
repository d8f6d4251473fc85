//! Recovery strategies, one per error type
//!
//! The taxonomy is closed, so strategies are a closed enum selected by
//! [`RecoveryStrategy::for_error_type`] rather than an open registry.

use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::classify::{
    categorize_parse_error, classify_processing_error, classify_transport_error, is_parse_error_correctable,
    ProcessingFault, TransportFault,
};
use crate::diagnostic::suggestions::parse_suggestions;
use crate::diagnostic::ErrorType;

/// What kind of recovery was attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryType {
    AutoCorrection,
    GracefulDegradation,
    Retry,
    Fallback,
    CircuitBreaker,
}

impl fmt::Display for RecoveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecoveryType::AutoCorrection => "auto_correction",
            RecoveryType::GracefulDegradation => "graceful_degradation",
            RecoveryType::Retry => "retry",
            RecoveryType::Fallback => "fallback",
            RecoveryType::CircuitBreaker => "circuit_breaker",
        };
        f.write_str(label)
    }
}

/// Caller-supplied context for one recovery attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecoveryContext {
    /// Breaker guarding the failing resource
    pub circuit_breaker: Option<String>,
    /// Zero-based count of retries already made for this request
    pub attempt: u32,
    pub values: IndexMap<String, Value>,
}

impl RecoveryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_circuit_breaker(mut self, name: impl Into<String>) -> Self {
        self.circuit_breaker = Some(name.into());
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

fn serialize_retry_after<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(delay) => serializer.serialize_some(&(delay.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

/// Outcome of one recovery attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryResult {
    pub success: bool,
    pub recovery_type: RecoveryType,
    pub message: String,
    pub should_retry: bool,
    #[serde(rename = "retry_after_ms", serialize_with = "serialize_retry_after")]
    pub retry_after: Option<Duration>,
    pub context: IndexMap<String, Value>,
}

impl RecoveryResult {
    pub fn failure(recovery_type: RecoveryType, message: impl Into<String>) -> Self {
        Self {
            success: false,
            recovery_type,
            message: message.into(),
            should_retry: false,
            retry_after: None,
            context: IndexMap::new(),
        }
    }

    pub fn recovered(recovery_type: RecoveryType, message: impl Into<String>) -> Self {
        Self {
            success: true,
            ..Self::failure(recovery_type, message)
        }
    }

    /// Retry directive after `delay`
    pub fn retry(message: impl Into<String>, delay: Duration) -> Self {
        Self {
            success: true,
            should_retry: true,
            retry_after: Some(delay),
            ..Self::failure(RecoveryType::Retry, message)
        }
    }

    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// Per-type recovery behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Guidance for mechanically fixable parse errors; never retried
    ParseCorrection,
    /// Always answer with an informative response
    GracefulDegradation(ErrorType),
    /// Retry transient processing failures, else fall back
    ProcessingRetry,
    /// Retry transient transport failures, else trip the breaker
    TransportRetry,
}

impl RecoveryStrategy {
    pub fn for_error_type(error_type: ErrorType) -> Self {
        match error_type {
            ErrorType::ParseError => RecoveryStrategy::ParseCorrection,
            ErrorType::ProcessingError => RecoveryStrategy::ProcessingRetry,
            ErrorType::TransportError => RecoveryStrategy::TransportRetry,
            ErrorType::ValidationError | ErrorType::AuthenticationError | ErrorType::SessionTimerError => {
                RecoveryStrategy::GracefulDegradation(error_type)
            }
        }
    }

    /// Recovery type reported when this strategy declines
    pub fn recovery_type(&self) -> RecoveryType {
        match self {
            RecoveryStrategy::ParseCorrection => RecoveryType::AutoCorrection,
            RecoveryStrategy::GracefulDegradation(_) => RecoveryType::GracefulDegradation,
            RecoveryStrategy::ProcessingRetry | RecoveryStrategy::TransportRetry => RecoveryType::Retry,
        }
    }

    pub fn can_recover(&self, error: &str, _context: &RecoveryContext) -> bool {
        match self {
            RecoveryStrategy::ParseCorrection => is_parse_error_correctable(error),
            RecoveryStrategy::GracefulDegradation(_) => true,
            RecoveryStrategy::ProcessingRetry => classify_processing_error(error).is_some(),
            RecoveryStrategy::TransportRetry => classify_transport_error(error).is_some(),
        }
    }

    pub fn recover(&self, error: &str, _context: &RecoveryContext) -> RecoveryResult {
        match self {
            RecoveryStrategy::ParseCorrection => {
                let category = categorize_parse_error(error);
                RecoveryResult::failure(
                    RecoveryType::AutoCorrection,
                    format!("Parse error may be corrected by the client: {}", error),
                )
                .with_context("parse_category", category.as_str())
                .with_context("guidance", parse_suggestions(category))
            }
            RecoveryStrategy::GracefulDegradation(error_type) => RecoveryResult::recovered(
                RecoveryType::GracefulDegradation,
                format!("Responding with diagnostic for {}", error_type),
            ),
            RecoveryStrategy::ProcessingRetry => match classify_processing_error(error) {
                Some(ProcessingFault::Database) => {
                    RecoveryResult::retry("Database error, retrying", Duration::from_millis(500))
                        .with_context("fault", "database")
                }
                Some(fault @ (ProcessingFault::Connection | ProcessingFault::Timeout)) => {
                    RecoveryResult::retry("Transient processing error, retrying", Duration::from_secs(1))
                        .with_context("fault", serde_json::to_value(fault).unwrap_or(Value::Null))
                }
                _ => RecoveryResult::failure(RecoveryType::Fallback, "Processing error, using fallback response"),
            },
            RecoveryStrategy::TransportRetry => match classify_transport_error(error) {
                Some(fault @ (TransportFault::Refused | TransportFault::Reset)) => {
                    RecoveryResult::retry("Connection refused or reset, retrying", Duration::from_secs(2))
                        .with_context("fault", serde_json::to_value(fault).unwrap_or(Value::Null))
                }
                Some(TransportFault::Timeout) => {
                    RecoveryResult::retry("Transport timeout, retrying", Duration::from_secs(1))
                        .with_context("fault", "timeout")
                }
                _ => RecoveryResult {
                    should_retry: true,
                    retry_after: Some(Duration::from_secs(5)),
                    ..RecoveryResult::failure(
                        RecoveryType::CircuitBreaker,
                        "Transport failure, backing off behind circuit breaker",
                    )
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RecoveryContext {
        RecoveryContext::new()
    }

    #[test]
    fn test_parse_correction_is_informational() {
        let strategy = RecoveryStrategy::for_error_type(ErrorType::ParseError);
        assert!(strategy.can_recover("mixed line endings", &ctx()));
        assert!(!strategy.can_recover("bad start line", &ctx()));

        let result = strategy.recover("invalid header format", &ctx());
        assert!(!result.success);
        assert!(!result.should_retry);
        assert_eq!(result.recovery_type, RecoveryType::AutoCorrection);
        assert_eq!(result.context["parse_category"], "header_error");
    }

    #[test]
    fn test_graceful_types_always_succeed() {
        for t in [
            ErrorType::ValidationError,
            ErrorType::AuthenticationError,
            ErrorType::SessionTimerError,
        ] {
            let strategy = RecoveryStrategy::for_error_type(t);
            assert!(strategy.can_recover("anything", &ctx()));
            let result = strategy.recover("anything", &ctx());
            assert!(result.success);
            assert!(!result.should_retry);
            assert_eq!(result.recovery_type, RecoveryType::GracefulDegradation);
        }
    }

    #[test]
    fn test_processing_delays() {
        let strategy = RecoveryStrategy::ProcessingRetry;
        let db = strategy.recover("database locked", &ctx());
        assert_eq!(db.retry_after, Some(Duration::from_millis(500)));
        assert!(db.should_retry);

        let conn = strategy.recover("upstream connection lost", &ctx());
        assert_eq!(conn.retry_after, Some(Duration::from_secs(1)));

        let temp = strategy.recover("temporary failure", &ctx());
        assert_eq!(temp.recovery_type, RecoveryType::Fallback);
        assert!(!temp.should_retry);
        assert!(!strategy.can_recover("assertion failed", &ctx()));
    }

    #[test]
    fn test_transport_delays() {
        let strategy = RecoveryStrategy::TransportRetry;
        assert_eq!(
            strategy.recover("connection refused", &ctx()).retry_after,
            Some(Duration::from_secs(2))
        );
        assert_eq!(
            strategy.recover("connection reset by peer", &ctx()).retry_after,
            Some(Duration::from_secs(2))
        );
        assert_eq!(
            strategy.recover("write timeout", &ctx()).retry_after,
            Some(Duration::from_secs(1))
        );

        let broken = strategy.recover("network unreachable", &ctx());
        assert_eq!(broken.recovery_type, RecoveryType::CircuitBreaker);
        assert!(broken.should_retry);
        assert_eq!(broken.retry_after, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_result_serializes_delay_in_millis() {
        let json = serde_json::to_value(RecoveryResult::retry("x", Duration::from_millis(1500))).unwrap();
        assert_eq!(json["retry_after_ms"], 1500);
        assert_eq!(json["recovery_type"], "retry");
    }
}
