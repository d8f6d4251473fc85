//! Three-state circuit breaker
//!
//! ```text
//!            failures >= max                 timeout elapsed,
//!  Closed ───────────────────▶ Open ──────── polled by can_execute ───▶ HalfOpen
//!    ▲                          ▲                                          │
//!    │                          └──────────── record_failure ──────────────┤
//!    └──────────────────────────────────────── record_success ─────────────┘
//! ```
//!
//! The Open → HalfOpen transition is lazy: nothing happens until a caller asks
//! [`CircuitBreaker::can_execute`] after the timeout has passed.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("closed"),
            CircuitState::Open => f.write_str("open"),
            CircuitState::HalfOpen => f.write_str("half_open"),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
}

/// Exported view of a breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failures: u32,
    pub max_failures: u32,
    pub timeout_ms: u64,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Guard for one named resource
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    max_failures: u32,
    timeout: Duration,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, max_failures: u32, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            max_failures,
            timeout,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failures: 0,
                last_failure: None,
                last_failure_at: None,
            }),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self::new(name, config.max_failures, config.timeout)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn failures(&self) -> u32 {
        self.inner.lock().failures
    }

    /// Whether calls may proceed; may move Open to HalfOpen
    pub fn can_execute(&self) -> bool {
        self.can_execute_at(Instant::now())
    }

    /// [`can_execute`](Self::can_execute) evaluated at `now`
    pub fn can_execute_at(&self, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or(Duration::MAX);
                if elapsed > self.timeout {
                    inner.state = CircuitState::HalfOpen;
                    info!(breaker = %self.name, "Circuit breaker half-open, probing");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!(breaker = %self.name, "Circuit breaker closed");
        }
        inner.state = CircuitState::Closed;
        inner.failures = 0;
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    /// [`record_failure`](Self::record_failure) stamped at `now`
    pub fn record_failure_at(&self, now: Instant) {
        let mut inner = self.inner.lock();
        inner.failures = inner.failures.saturating_add(1);
        inner.last_failure = Some(now);
        inner.last_failure_at = Some(Utc::now());

        if inner.failures >= self.max_failures && inner.state != CircuitState::Open {
            inner.state = CircuitState::Open;
            warn!(
                breaker = %self.name,
                failures = inner.failures,
                timeout_ms = self.timeout.as_millis() as u64,
                "Circuit breaker opened"
            );
        }
    }

    /// Back to Closed with no failures
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.last_failure = None;
        inner.last_failure_at = None;
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.lock();
        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failures: inner.failures,
            max_failures: self.max_failures,
            timeout_ms: self.timeout.as_millis() as u64,
            last_failure_at: inner.last_failure_at,
        }
    }
}
