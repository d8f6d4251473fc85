//! Shared statistics storage
//!
//! Counters, the recent-error window, the hourly histogram and the detected
//! pattern ledger share one [`RwLock`]: every recording takes the write lock
//! once, readers take the read lock and leave with a cloned snapshot.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Timelike, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::diagnostic::{ErrorStatistics, ErrorType};

/// One entry of the recent-error window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentError {
    pub timestamp: DateTime<Utc>,
    pub error_type: ErrorType,
    pub summary: String,
    pub status: Option<u16>,
    /// Validator name for validation errors, parse category for parse errors
    pub source: Option<String>,
}

/// A parse-error subtype that crossed the pattern threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedPattern {
    pub category: String,
    pub count: u64,
    pub detected_at: DateTime<Utc>,
}

/// Breakdown counters beyond the six per-type totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedStatistics {
    pub parse_error_types: BTreeMap<String, u64>,
    pub validation_errors_by_validator: BTreeMap<String, u64>,
    /// Oldest first
    pub recent_errors: VecDeque<RecentError>,
    /// Errors per UTC hour of day
    pub hourly_distribution: [u64; 24],
}

impl DetailedStatistics {
    fn new() -> Self {
        Self {
            parse_error_types: BTreeMap::new(),
            validation_errors_by_validator: BTreeMap::new(),
            recent_errors: VecDeque::new(),
            hourly_distribution: [0; 24],
        }
    }

    /// Hour with the most errors, `None` when empty
    pub fn peak_hour(&self) -> Option<usize> {
        let (hour, count) = self
            .hourly_distribution
            .iter()
            .enumerate()
            .max_by_key(|(hour, count)| (**count, std::cmp::Reverse(*hour)))?;
        (*count > 0).then_some(hour)
    }
}

impl Default for DetailedStatistics {
    fn default() -> Self {
        Self::new()
    }
}

/// What a single recording changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Counter for the error type after the increment
    pub type_count: u64,
    /// Parse-subtype or per-validator counter after the increment
    pub source_count: Option<u64>,
    /// Set when this recording crossed a multiple of the pattern threshold
    pub pattern: Option<DetectedPattern>,
}

#[derive(Debug)]
struct StoreInner {
    statistics: ErrorStatistics,
    detailed: DetailedStatistics,
    /// Oldest first, in count order per category
    patterns: Vec<DetectedPattern>,
}

/// Process-wide error statistics, owned by whoever constructs the pipeline
#[derive(Debug)]
pub struct StatisticsStore {
    recent_capacity: usize,
    inner: RwLock<StoreInner>,
}

impl Default for StatisticsStore {
    fn default() -> Self {
        Self::new(100)
    }
}

impl StatisticsStore {
    /// `recent_capacity` of zero keeps no recent entries
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            recent_capacity,
            inner: RwLock::new(StoreInner {
                statistics: ErrorStatistics::new(),
                detailed: DetailedStatistics::new(),
                patterns: Vec::new(),
            }),
        }
    }

    pub fn recent_capacity(&self) -> usize {
        self.recent_capacity
    }

    /// Count one error and append it to the recent window
    pub fn record(&self, entry: RecentError) -> RecordOutcome {
        self.record_with_patterns(entry, 0)
    }

    /// [`record`](Self::record), also noting a pattern when a parse subtype
    /// count reaches a multiple of `pattern_threshold` (zero disables)
    pub fn record_with_patterns(&self, entry: RecentError, pattern_threshold: u64) -> RecordOutcome {
        let mut inner = self.inner.write();
        let type_count = inner.statistics.increment(entry.error_type);

        let hour = entry.timestamp.hour() as usize;
        inner.detailed.hourly_distribution[hour % 24] += 1;

        let source_count = match (entry.error_type, entry.source.as_deref()) {
            (ErrorType::ParseError, Some(category)) => Some(bump(&mut inner.detailed.parse_error_types, category)),
            (ErrorType::ValidationError, Some(validator)) => {
                Some(bump(&mut inner.detailed.validation_errors_by_validator, validator))
            }
            _ => None,
        };

        let pattern = match (entry.error_type, entry.source.as_deref(), source_count) {
            (ErrorType::ParseError, Some(category), Some(count))
                if pattern_threshold > 0 && count % pattern_threshold == 0 =>
            {
                let pattern = DetectedPattern {
                    category: category.to_string(),
                    count,
                    detected_at: entry.timestamp,
                };
                inner.patterns.push(pattern.clone());
                Some(pattern)
            }
            _ => None,
        };

        if self.recent_capacity > 0 {
            while inner.detailed.recent_errors.len() >= self.recent_capacity {
                inner.detailed.recent_errors.pop_front();
            }
            inner.detailed.recent_errors.push_back(entry);
        }

        RecordOutcome {
            type_count,
            source_count,
            pattern,
        }
    }

    /// Every detected pattern since the last reset, oldest first
    pub fn detected_patterns(&self) -> Vec<DetectedPattern> {
        self.inner.read().patterns.clone()
    }

    pub fn statistics(&self) -> ErrorStatistics {
        self.inner.read().statistics.clone()
    }

    pub fn detailed(&self) -> DetailedStatistics {
        self.inner.read().detailed.clone()
    }

    pub fn total_errors(&self) -> u64 {
        self.inner.read().statistics.total_errors()
    }

    pub fn count(&self, error_type: ErrorType) -> u64 {
        self.inner.read().statistics.count(error_type)
    }

    /// Zero every counter, clear the window and stamp the reset time
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.statistics.reset();
        inner.detailed = DetailedStatistics::new();
        inner.patterns.clear();
    }
}

fn bump(map: &mut BTreeMap<String, u64>, key: &str) -> u64 {
    let counter = map.entry(key.to_string()).or_insert(0);
    *counter = counter.saturating_add(1);
    *counter
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(error_type: ErrorType, source: Option<&str>, hour: u32) -> RecentError {
        RecentError {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, hour, 15, 0).unwrap(),
            error_type,
            summary: format!("{} test", error_type),
            status: None,
            source: source.map(str::to_string),
        }
    }

    #[test]
    fn test_record_updates_all_views() {
        let store = StatisticsStore::new(10);
        let first = store.record(entry(ErrorType::ParseError, Some("header_error"), 3));
        let second = store.record(entry(ErrorType::ParseError, Some("header_error"), 3));
        store.record(entry(ErrorType::ValidationError, Some("method"), 22));

        assert_eq!(first.type_count, 1);
        assert_eq!(second.source_count, Some(2));
        assert_eq!(store.total_errors(), 3);

        let detailed = store.detailed();
        assert_eq!(detailed.parse_error_types["header_error"], 2);
        assert_eq!(detailed.validation_errors_by_validator["method"], 1);
        assert_eq!(detailed.hourly_distribution[3], 2);
        assert_eq!(detailed.hourly_distribution[22], 1);
        assert_eq!(detailed.peak_hour(), Some(3));
    }

    #[test]
    fn test_recent_window_is_fifo_bounded() {
        let store = StatisticsStore::new(3);
        for hour in 0..5 {
            store.record(entry(ErrorType::TransportError, None, hour));
        }
        let recent = store.detailed().recent_errors;
        assert_eq!(recent.len(), 3);
        let hours: Vec<u32> = recent.iter().map(|e| e.timestamp.hour()).collect();
        assert_eq!(hours, vec![2, 3, 4]);
    }

    #[test]
    fn test_patterns_recorded_with_the_count() {
        let store = StatisticsStore::new(3);
        let outcomes: Vec<RecordOutcome> = (0..5)
            .map(|_| store.record_with_patterns(entry(ErrorType::ParseError, Some("header_error"), 1), 2))
            .collect();

        let crossed: Vec<u64> = outcomes.iter().filter_map(|o| o.pattern.as_ref()).map(|p| p.count).collect();
        assert_eq!(crossed, vec![2, 4]);
        assert_eq!(store.detected_patterns().len(), 2);

        // plain recording never notes a pattern
        assert!(store.record(entry(ErrorType::ParseError, Some("header_error"), 1)).pattern.is_none());

        store.reset();
        assert!(store.detected_patterns().is_empty());
        let after = store.record_with_patterns(entry(ErrorType::ParseError, Some("header_error"), 1), 1);
        assert_eq!(after.pattern.map(|p| p.count), Some(1));
    }

    #[test]
    fn test_reset_clears_everything() {
        let store = StatisticsStore::new(3);
        store.record(entry(ErrorType::ParseError, Some("body_error"), 1));
        let before = store.statistics().last_reset();
        store.reset();

        assert_eq!(store.total_errors(), 0);
        assert!(store.detailed().parse_error_types.is_empty());
        assert!(store.detailed().recent_errors.is_empty());
        assert_eq!(store.detailed().peak_hour(), None);
        assert!(store.statistics().last_reset() >= before);
    }

    #[test]
    fn test_snapshots_are_detached() {
        let store = StatisticsStore::new(3);
        let snapshot = store.statistics();
        store.record(entry(ErrorType::AuthenticationError, None, 0));
        assert_eq!(snapshot.total_errors(), 0);
        assert_eq!(store.count(ErrorType::AuthenticationError), 1);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let store = StatisticsStore::new(0);
        store.record(entry(ErrorType::ParseError, None, 0));
        assert!(store.detailed().recent_errors.is_empty());
        assert_eq!(store.total_errors(), 1);
    }
}
