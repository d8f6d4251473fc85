//! # Recovery Manager
//!
//! Decides what happens after a failure that validation could not turn into
//! a plain diagnostic response: retry, degrade gracefully, back off behind a
//! circuit breaker, or fall back to a minimal response.
//!
//! The manager never sleeps or performs I/O. A retry directive carries a
//! `retry_after` the caller honours; a fallback is a response the caller
//! sends. The caller gets one or the other, never both.
//!
//! Strategy, fallback and retry-policy tables are filled at construction and
//! read without locking afterwards. Circuit breakers live in a [`DashMap`] and
//! each guards its own state.
//!
//! ```rust
//! use std::time::Duration;
//! use rvoip_validation_core::diagnostic::ErrorType;
//! use rvoip_validation_core::recovery::{RecoveryContext, RecoveryManager, RecoveryType};
//!
//! let manager = RecoveryManager::new();
//! let context = RecoveryContext::new().with_circuit_breaker("database");
//!
//! let result = manager.attempt_recovery(ErrorType::ProcessingError, "database timeout", &context);
//! assert!(result.should_retry);
//! assert_eq!(result.recovery_type, RecoveryType::Retry);
//! assert_eq!(result.retry_after, Some(Duration::from_millis(500)));
//! ```

pub mod circuit_breaker;
pub mod fallback;
pub mod policy;
pub mod strategy;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::config::{CircuitBreakerConfig, PipelineConfig};
use crate::diagnostic::ErrorType;
use crate::error::{PipelineError, Result};
use crate::message::SipMessage;
use crate::response::ResponseBuilder;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerSnapshot, CircuitState};
pub use fallback::FallbackHandler;
pub use policy::RetryPolicy;
pub use strategy::{RecoveryContext, RecoveryResult, RecoveryStrategy, RecoveryType};

#[derive(Debug)]
pub struct RecoveryManager {
    strategies: HashMap<ErrorType, RecoveryStrategy>,
    fallbacks: HashMap<ErrorType, FallbackHandler>,
    retry_policies: HashMap<ErrorType, RetryPolicy>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    builder: ResponseBuilder,
}

impl Default for RecoveryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RecoveryManager {
    /// Manager with the default strategies, policies and breakers
    pub fn new() -> Self {
        Self::from_config(&PipelineConfig::default(), ResponseBuilder::new())
    }

    pub fn from_config(config: &PipelineConfig, builder: ResponseBuilder) -> Self {
        let strategies = ErrorType::ALL
            .into_iter()
            .map(|t| (t, RecoveryStrategy::for_error_type(t)))
            .collect();
        let fallbacks = ErrorType::ALL
            .into_iter()
            .map(|t| (t, FallbackHandler::for_error_type(t)))
            .collect();
        let retry_policies = ErrorType::ALL
            .into_iter()
            .map(|t| (t, config.retry_policy(t)))
            .collect();

        let manager = Self {
            strategies,
            fallbacks,
            retry_policies,
            breakers: DashMap::new(),
            builder,
        };
        for (name, breaker) in &config.circuit_breakers {
            manager.add_circuit_breaker_from_config(name, breaker);
        }
        manager
    }

    /// Remove the strategy for `error_type`; recovery then always fails
    pub fn without_strategy(mut self, error_type: ErrorType) -> Self {
        self.strategies.remove(&error_type);
        self
    }

    pub fn with_fallback(mut self, error_type: ErrorType, handler: FallbackHandler) -> Self {
        self.fallbacks.insert(error_type, handler);
        self
    }

    pub fn with_retry_policy(mut self, error_type: ErrorType, policy: RetryPolicy) -> Self {
        self.retry_policies.insert(error_type, policy);
        self
    }

    pub fn strategy(&self, error_type: ErrorType) -> Option<&RecoveryStrategy> {
        self.strategies.get(&error_type)
    }

    pub fn retry_policy(&self, error_type: ErrorType) -> Option<&RetryPolicy> {
        self.retry_policies.get(&error_type)
    }

    /// Register (or replace) a breaker
    pub fn add_circuit_breaker(&self, name: impl Into<String>, max_failures: u32, timeout: Duration) -> Arc<CircuitBreaker> {
        let name = name.into();
        let breaker = Arc::new(CircuitBreaker::new(name.clone(), max_failures, timeout));
        debug!(breaker = %name, max_failures, timeout_ms = timeout.as_millis() as u64, "Registered circuit breaker");
        self.breakers.insert(name, breaker.clone());
        breaker
    }

    fn add_circuit_breaker_from_config(&self, name: &str, config: &CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        self.add_circuit_breaker(name, config.max_failures, config.timeout)
    }

    pub fn circuit_breaker(&self, name: &str) -> Result<Arc<CircuitBreaker>> {
        self.breakers
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PipelineError::UnknownCircuitBreaker(name.to_string()))
    }

    /// Breaker snapshots sorted by name
    pub fn circuit_breaker_snapshots(&self) -> Vec<CircuitBreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.iter().map(|entry| entry.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    pub fn reset_circuit_breakers(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }

    /// Decide how to recover from `error`
    ///
    /// A breaker named in `context` that refuses execution short-circuits to
    /// a CircuitBreaker result carrying the breaker's timeout. Otherwise the
    /// strategy runs and the breaker records a failure whenever the resource
    /// is still failing (no success, or a retry is requested). Retry
    /// directives beyond the type's retry budget become non-retry failures.
    pub fn attempt_recovery(&self, error_type: ErrorType, error: &str, context: &RecoveryContext) -> RecoveryResult {
        let Some(strategy) = self.strategies.get(&error_type) else {
            warn!(error_type = %error_type, "No recovery strategy registered");
            return RecoveryResult::failure(
                RecoveryType::Fallback,
                format!("No recovery strategy for {}", error_type),
            );
        };

        if !strategy.can_recover(error, context) {
            debug!(error_type = %error_type, error, "Error is not recoverable");
            return RecoveryResult::failure(strategy.recovery_type(), format!("Cannot recover from: {}", error));
        }

        let breaker = context
            .circuit_breaker
            .as_deref()
            .and_then(|name| self.breakers.get(name).map(|entry| entry.value().clone()));
        if let Some(breaker) = &breaker {
            if !breaker.can_execute() {
                info!(breaker = breaker.name(), error_type = %error_type, "Circuit breaker open, deferring");
                return RecoveryResult {
                    should_retry: true,
                    retry_after: Some(breaker.timeout()),
                    ..RecoveryResult::failure(
                        RecoveryType::CircuitBreaker,
                        format!("Circuit breaker '{}' is open", breaker.name()),
                    )
                }
                .with_context("circuit_breaker", breaker.name());
            }
        }

        let mut result = strategy.recover(error, context);
        if result.should_retry {
            result = self.apply_retry_budget(error_type, context.attempt, result);
        }

        if let Some(breaker) = &breaker {
            if result.success && !result.should_retry {
                breaker.record_success();
            } else {
                breaker.record_failure();
            }
        }

        info!(
            error_type = %error_type,
            recovery_type = %result.recovery_type,
            success = result.success,
            should_retry = result.should_retry,
            retry_after_ms = result.retry_after.map(|d| d.as_millis() as u64),
            attempt = context.attempt,
            "Recovery attempted"
        );
        result
    }

    fn apply_retry_budget(&self, error_type: ErrorType, attempt: u32, mut result: RecoveryResult) -> RecoveryResult {
        let Some(policy) = self.retry_policies.get(&error_type) else {
            return result;
        };

        if !policy.allows_attempt(attempt) {
            warn!(
                error_type = %error_type,
                attempt,
                max_attempts = policy.max_attempts,
                "Retry budget exhausted"
            );
            return RecoveryResult::failure(
                RecoveryType::Fallback,
                format!("Retry budget of {} attempts exhausted: {}", policy.max_attempts, result.message),
            )
            .with_context("attempt", attempt);
        }

        if let Some(base) = result.retry_after {
            result.retry_after = Some(base.max(policy.delay_for_attempt(attempt)));
        }
        result.context.insert("attempt".to_string(), attempt.into());
        result
    }

    /// Minimal response for `error_type`, `None` when the handler declines
    pub fn get_fallback_response(
        &self,
        error_type: ErrorType,
        error: &str,
        context: &RecoveryContext,
        request: Option<&SipMessage>,
    ) -> Option<SipMessage> {
        let handler = self.fallbacks.get(&error_type)?;
        let response = handler.respond(request, &self.builder);
        debug!(
            error_type = %error_type,
            error,
            attempt = context.attempt,
            status = response.as_ref().and_then(SipMessage::status_code),
            "Fallback response"
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Method;

    #[test]
    fn test_default_breakers_registered() {
        let manager = RecoveryManager::new();
        let names: Vec<String> = manager.circuit_breaker_snapshots().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["authentication", "database", "transport"]);
        assert!(matches!(
            manager.circuit_breaker("cache"),
            Err(PipelineError::UnknownCircuitBreaker(_))
        ));
    }

    #[test]
    fn test_missing_strategy_fails_immediately() {
        let manager = RecoveryManager::new().without_strategy(ErrorType::ProcessingError);
        let result = manager.attempt_recovery(ErrorType::ProcessingError, "database timeout", &RecoveryContext::new());
        assert!(!result.success);
        assert!(!result.should_retry);
    }

    #[test]
    fn test_unrecoverable_reports_strategy_type() {
        let manager = RecoveryManager::new();
        let result = manager.attempt_recovery(ErrorType::TransportError, "tls alert", &RecoveryContext::new());
        assert!(!result.success);
        assert_eq!(result.recovery_type, RecoveryType::Retry);
    }

    #[test]
    fn test_open_breaker_defers_with_its_timeout() {
        let manager = RecoveryManager::new();
        let breaker = manager.add_circuit_breaker("db", 1, Duration::from_secs(30));
        breaker.record_failure();

        let context = RecoveryContext::new().with_circuit_breaker("db");
        let result = manager.attempt_recovery(ErrorType::ProcessingError, "database down", &context);
        assert_eq!(result.recovery_type, RecoveryType::CircuitBreaker);
        assert!(result.should_retry);
        assert!(!result.success);
        assert_eq!(result.retry_after, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_retries_feed_breaker_failures() {
        let manager = RecoveryManager::new();
        manager.add_circuit_breaker("db", 2, Duration::from_secs(30));
        let context = RecoveryContext::new().with_circuit_breaker("db");

        manager.attempt_recovery(ErrorType::ProcessingError, "database down", &context);
        manager.attempt_recovery(ErrorType::ProcessingError, "database down", &context);
        let breaker = manager.circuit_breaker("db").unwrap();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_graceful_recovery_records_success() {
        let manager = RecoveryManager::new();
        let breaker = manager.add_circuit_breaker("auth", 3, Duration::from_secs(1));
        breaker.record_failure();

        let context = RecoveryContext::new().with_circuit_breaker("auth");
        let result = manager.attempt_recovery(ErrorType::AuthenticationError, "bad digest", &context);
        assert!(result.success);
        assert_eq!(breaker.failures(), 0);
    }

    #[test]
    fn test_retry_budget_exhaustion() {
        let manager = RecoveryManager::new();
        let within = manager.attempt_recovery(
            ErrorType::ProcessingError,
            "connection lost",
            &RecoveryContext::new().with_attempt(2),
        );
        assert!(within.should_retry);
        assert_eq!(within.retry_after, Some(Duration::from_secs(2)));

        let exhausted = manager.attempt_recovery(
            ErrorType::ProcessingError,
            "connection lost",
            &RecoveryContext::new().with_attempt(3),
        );
        assert!(!exhausted.should_retry);
        assert_eq!(exhausted.recovery_type, RecoveryType::Fallback);
    }

    #[test]
    fn test_fallback_response_correlates() {
        let manager = RecoveryManager::new();
        let request = SipMessage::request(Method::Invite, "sip:bob@example.com").with_header("Call-ID", "fb-1");
        let response = manager
            .get_fallback_response(ErrorType::TransportError, "down", &RecoveryContext::new(), Some(&request))
            .unwrap();
        assert_eq!(response.status_code(), Some(503));
        assert_eq!(response.header("Call-ID"), Some("fb-1"));

        assert!(manager
            .get_fallback_response(ErrorType::SessionTimerError, "x", &RecoveryContext::new(), None)
            .is_none());
    }
}
