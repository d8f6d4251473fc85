//! Recovery manager and circuit breaker tests

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;

use rvoip_validation_core::diagnostic::ErrorType;
use rvoip_validation_core::recovery::{
    CircuitBreaker, CircuitState, FallbackHandler, RecoveryContext, RecoveryManager, RecoveryType, RetryPolicy,
};
use rvoip_validation_core::message::{Method, SipMessage, StatusCode};

#[test]
fn test_breaker_lifecycle() {
    let breaker = CircuitBreaker::new("database", 3, Duration::from_secs(30));
    let start = Instant::now();

    for offset in 0..3 {
        assert!(breaker.can_execute_at(start + Duration::from_secs(offset)));
        breaker.record_failure_at(start + Duration::from_secs(offset));
    }
    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(!breaker.can_execute_at(start + Duration::from_secs(10)));

    // lazily half-opens once the timeout has passed
    assert!(breaker.can_execute_at(start + Duration::from_secs(33)));
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    breaker.record_success();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failures(), 0);
}

#[test]
fn test_half_open_failure_reopens() {
    let breaker = CircuitBreaker::new("transport", 2, Duration::from_secs(5));
    let start = Instant::now();
    breaker.record_failure_at(start);
    breaker.record_failure_at(start);
    assert!(breaker.can_execute_at(start + Duration::from_secs(6)));

    breaker.record_failure_at(start + Duration::from_secs(6));
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.failures(), 3);
    assert!(!breaker.can_execute_at(start + Duration::from_secs(7)));
}

#[test]
fn test_breaker_shared_across_threads() {
    let breaker = Arc::new(CircuitBreaker::new("authentication", 100, Duration::from_secs(60)));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let breaker = breaker.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    breaker.record_failure();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread");
    }
    assert_eq!(breaker.failures(), 80);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[test]
fn test_processing_delays_by_fault() {
    let manager = RecoveryManager::new();
    let context = RecoveryContext::new();

    let database = manager.attempt_recovery(ErrorType::ProcessingError, "database unavailable", &context);
    assert_eq!(database.retry_after, Some(Duration::from_millis(500)));

    let connection = manager.attempt_recovery(ErrorType::ProcessingError, "connection pool exhausted", &context);
    assert_eq!(connection.retry_after, Some(Duration::from_secs(1)));

    let temporary = manager.attempt_recovery(ErrorType::ProcessingError, "temporary failure", &context);
    assert!(!temporary.success);
    assert!(!temporary.should_retry);
    assert_eq!(temporary.recovery_type, RecoveryType::Fallback);

    let unrelated = manager.attempt_recovery(ErrorType::ProcessingError, "null dereference", &context);
    assert!(!unrelated.should_retry);
}

#[test]
fn test_transport_broad_match_uses_breaker_type() {
    let manager = RecoveryManager::new();
    let result = manager.attempt_recovery(ErrorType::TransportError, "network unreachable", &RecoveryContext::new());
    assert_eq!(result.recovery_type, RecoveryType::CircuitBreaker);
    assert!(result.should_retry);
    assert_eq!(result.retry_after, Some(Duration::from_secs(5)));
}

#[test]
fn test_graceful_types_never_retry() {
    let manager = RecoveryManager::new();
    for error_type in [
        ErrorType::ValidationError,
        ErrorType::AuthenticationError,
        ErrorType::SessionTimerError,
    ] {
        let result = manager.attempt_recovery(error_type, "anything", &RecoveryContext::new());
        assert!(result.success, "{}", error_type);
        assert!(!result.should_retry, "{}", error_type);
        assert_eq!(result.recovery_type, RecoveryType::GracefulDegradation);
    }
}

#[test]
fn test_parse_errors_are_guidance_only() {
    let manager = RecoveryManager::new();
    let correctable = manager.attempt_recovery(ErrorType::ParseError, "bad line ending", &RecoveryContext::new());
    assert!(!correctable.success);
    assert!(!correctable.should_retry);
    assert_eq!(correctable.recovery_type, RecoveryType::AutoCorrection);
}

#[test]
fn test_retry_budget_grows_delay_then_exhausts() {
    let policy = RetryPolicy {
        max_attempts: 2,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(10),
        backoff_factor: 4.0,
        retryable_errors: vec!["timeout".to_string()],
    };
    let manager = RecoveryManager::new().with_retry_policy(ErrorType::ProcessingError, policy);

    let first = manager.attempt_recovery(ErrorType::ProcessingError, "query timeout", &RecoveryContext::new());
    assert_eq!(first.retry_after, Some(Duration::from_secs(1)));

    let second = manager.attempt_recovery(
        ErrorType::ProcessingError,
        "query timeout",
        &RecoveryContext::new().with_attempt(1),
    );
    assert_eq!(second.retry_after, Some(Duration::from_secs(4)));

    let exhausted = manager.attempt_recovery(
        ErrorType::ProcessingError,
        "query timeout",
        &RecoveryContext::new().with_attempt(2),
    );
    assert!(!exhausted.should_retry);
    assert_eq!(exhausted.recovery_type, RecoveryType::Fallback);
}

#[test]
fn test_fallback_override_and_decline() {
    let manager = RecoveryManager::new()
        .with_fallback(ErrorType::TransportError, FallbackHandler::Respond(StatusCode::RequestTimeout))
        .with_fallback(ErrorType::ProcessingError, FallbackHandler::Decline);
    let request = SipMessage::request(Method::Bye, "sip:bob@example.com")
        .with_header("Via", "SIP/2.0/UDP host;branch=z9hG4bK8")
        .with_header("Call-ID", "fallback-call")
        .with_header("CSeq", "3 BYE");
    let context = RecoveryContext::new();

    let transport = manager
        .get_fallback_response(ErrorType::TransportError, "gone", &context, Some(&request))
        .expect("response");
    assert_eq!(transport.status_code(), Some(408));
    assert_eq!(transport.header("Call-ID"), Some("fallback-call"));
    assert_eq!(transport.header("Content-Length"), Some("0"));

    assert!(manager
        .get_fallback_response(ErrorType::ProcessingError, "boom", &context, Some(&request))
        .is_none());
}

#[test]
fn test_snapshots_and_reset() {
    let manager = RecoveryManager::new();
    let cache = manager.add_circuit_breaker("cache", 1, Duration::from_secs(1));
    cache.record_failure();

    let snapshots = manager.circuit_breaker_snapshots();
    let cache_snapshot = snapshots.iter().find(|s| s.name == "cache").expect("cache");
    assert_eq!(cache_snapshot.state, CircuitState::Open);
    let json = serde_json::to_value(cache_snapshot).expect("serialize");
    assert_eq!(json["timeout_ms"], 1000);

    manager.reset_circuit_breakers();
    assert_eq!(cache.state(), CircuitState::Closed);
}
