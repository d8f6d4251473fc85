//! Per-type error counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ErrorType;

/// One monotonically increasing counter per [`ErrorType`]
///
/// This is a plain value. Sharing it between request threads goes through
/// [`StatisticsStore`](crate::stats::StatisticsStore), which serializes every
/// increment and hands out snapshots.
///
/// # Examples
///
/// ```rust
/// use rvoip_validation_core::diagnostic::{ErrorStatistics, ErrorType};
///
/// let mut stats = ErrorStatistics::new();
/// stats.increment(ErrorType::ParseError);
/// stats.increment(ErrorType::TransportError);
/// assert_eq!(stats.total_errors(), 2);
///
/// stats.reset();
/// assert_eq!(stats.total_errors(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorStatistics {
    parse_errors: u64,
    validation_errors: u64,
    processing_errors: u64,
    transport_errors: u64,
    authentication_errors: u64,
    session_timer_errors: u64,
    last_reset: DateTime<Utc>,
}

impl ErrorStatistics {
    pub fn new() -> Self {
        Self {
            parse_errors: 0,
            validation_errors: 0,
            processing_errors: 0,
            transport_errors: 0,
            authentication_errors: 0,
            session_timer_errors: 0,
            last_reset: Utc::now(),
        }
    }

    fn counter_mut(&mut self, error_type: ErrorType) -> &mut u64 {
        match error_type {
            ErrorType::ParseError => &mut self.parse_errors,
            ErrorType::ValidationError => &mut self.validation_errors,
            ErrorType::ProcessingError => &mut self.processing_errors,
            ErrorType::TransportError => &mut self.transport_errors,
            ErrorType::AuthenticationError => &mut self.authentication_errors,
            ErrorType::SessionTimerError => &mut self.session_timer_errors,
        }
    }

    /// Bump the counter for `error_type`, returning the new value
    pub fn increment(&mut self, error_type: ErrorType) -> u64 {
        let counter = self.counter_mut(error_type);
        *counter = counter.saturating_add(1);
        *counter
    }

    pub fn count(&self, error_type: ErrorType) -> u64 {
        match error_type {
            ErrorType::ParseError => self.parse_errors,
            ErrorType::ValidationError => self.validation_errors,
            ErrorType::ProcessingError => self.processing_errors,
            ErrorType::TransportError => self.transport_errors,
            ErrorType::AuthenticationError => self.authentication_errors,
            ErrorType::SessionTimerError => self.session_timer_errors,
        }
    }

    /// Sum of all six counters
    pub fn total_errors(&self) -> u64 {
        ErrorType::ALL
            .iter()
            .fold(0u64, |acc, t| acc.saturating_add(self.count(*t)))
    }

    /// Zero every counter and stamp the reset time
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn last_reset(&self) -> DateTime<Utc> {
        self.last_reset
    }

    /// `(type, count)` pairs in [`ErrorType::ALL`] order
    pub fn counts(&self) -> Vec<(ErrorType, u64)> {
        ErrorType::ALL.iter().map(|t| (*t, self.count(*t))).collect()
    }
}

impl Default for ErrorStatistics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn error_type_strategy() -> impl Strategy<Value = ErrorType> {
        (0usize..ErrorType::ALL.len()).prop_map(|i| ErrorType::ALL[i])
    }

    #[test]
    fn test_reset_stamps_time() {
        let mut stats = ErrorStatistics::new();
        let before = stats.last_reset();
        stats.increment(ErrorType::ValidationError);
        stats.reset();
        assert!(stats.last_reset() >= before);
        assert_eq!(stats.count(ErrorType::ValidationError), 0);
    }

    proptest! {
        #[test]
        fn total_is_sum_of_counters(ops in proptest::collection::vec(proptest::option::of(error_type_strategy()), 0..200)) {
            let mut stats = ErrorStatistics::new();
            for op in ops {
                match op {
                    Some(t) => { stats.increment(t); }
                    None => stats.reset(),
                }
                let sum: u64 = stats.counts().iter().map(|(_, c)| c).sum();
                prop_assert_eq!(stats.total_errors(), sum);
            }
        }
    }
}
