//! Retry policies
//!
//! A [`RetryPolicy`] never sleeps; it only answers how long the caller should
//! wait before the next attempt and whether an error is worth retrying.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::contains_any;
use crate::config::duration_ms;
use crate::diagnostic::ErrorType;

/// Retry parameters for one [`ErrorType`]
///
/// # Examples
///
/// ```rust
/// # use rvoip_validation_core::recovery::RetryPolicy;
/// # use rvoip_validation_core::diagnostic::ErrorType;
/// # use std::time::Duration;
/// let policy = RetryPolicy::default_for(ErrorType::ProcessingError);
///
/// assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(500));
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
/// assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(5));
/// assert!(policy.is_retryable("database connection lost"));
/// assert!(!policy.is_retryable("null pointer"));
/// ```
///
/// ```rust
/// # use rvoip_validation_core::recovery::RetryPolicy;
/// # use rvoip_validation_core::diagnostic::ErrorType;
/// // Protocol errors are answered, never retried
/// let policy = RetryPolicy::default_for(ErrorType::ValidationError);
/// assert_eq!(policy.max_attempts, 0);
/// assert!(!policy.allows_attempt(0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,
    /// Upper bound for any delay
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
    /// Multiplier applied per attempt
    pub backoff_factor: f64,
    /// Case-insensitive message fragments that make an error retryable
    pub retryable_errors: Vec<String>,
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
            retryable_errors: Vec::new(),
        }
    }

    /// Built-in policy for `error_type`
    ///
    /// Only processing and transport errors are retried by default.
    pub fn default_for(error_type: ErrorType) -> Self {
        match error_type {
            ErrorType::ProcessingError => Self {
                max_attempts: 3,
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(5),
                backoff_factor: 2.0,
                retryable_errors: ["database", "connection", "timeout", "temporary"]
                    .map(String::from)
                    .to_vec(),
            },
            ErrorType::TransportError => Self {
                max_attempts: 5,
                initial_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(30),
                backoff_factor: 2.0,
                retryable_errors: ["connection", "network", "timeout", "refused", "reset"]
                    .map(String::from)
                    .to_vec(),
            },
            _ => Self::none(),
        }
    }

    /// Capped exponential backoff: `initial * factor^attempt`, at most `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_millis(capped as u64)
        } else {
            self.max_delay
        }
    }

    /// Whether `message` contains one of the retryable fragments
    pub fn is_retryable(&self, message: &str) -> bool {
        contains_any(message, &self.retryable_errors)
    }

    /// Whether a retry numbered `attempt` (zero-based) is still within budget
    pub fn allows_attempt(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(format!("backoff_factor must be at least 1.0, got {}", self.backoff_factor));
        }
        if self.initial_delay > self.max_delay {
            return Err("initial_delay_ms must not exceed max_delay_ms".to_string());
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
