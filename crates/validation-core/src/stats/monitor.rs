//! Threshold alerting over error counts
//!
//! Each [`ErrorType`] may have a threshold and a window. Counts reported by
//! [`ErrorMonitor::get_error_counts`] are cumulative since the last reset. The
//! threshold is compared against the events inside the rolling window, or
//! against the cumulative count when the window is zero.
//!
//! ```rust
//! use std::time::Duration;
//! use rvoip_validation_core::diagnostic::ErrorType;
//! use rvoip_validation_core::stats::ErrorMonitor;
//!
//! let monitor = ErrorMonitor::new();
//! monitor.set_threshold(ErrorType::TransportError, 2, Duration::from_secs(60));
//!
//! assert!(!monitor.record_error(ErrorType::TransportError));
//! assert!(monitor.record_error(ErrorType::TransportError));
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::warn;

use crate::config::MonitorThreshold;
use crate::diagnostic::ErrorType;

/// Fired when a type reaches its threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorAlert {
    pub error_type: ErrorType,
    /// Events counted against the threshold
    pub count: u64,
    pub threshold: u64,
    pub window_ms: u64,
}

pub type AlertCallback = Arc<dyn Fn(&MonitorAlert) + Send + Sync>;

#[derive(Debug, Default)]
struct MonitorState {
    thresholds: HashMap<ErrorType, MonitorThreshold>,
    counts: HashMap<ErrorType, u64>,
    events: HashMap<ErrorType, VecDeque<Instant>>,
}

#[derive(Default)]
pub struct ErrorMonitor {
    state: Mutex<MonitorState>,
    callbacks: RwLock<Vec<AlertCallback>>,
}

impl std::fmt::Debug for ErrorMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorMonitor")
            .field("state", &*self.state.lock())
            .field("callbacks", &self.callbacks.read().len())
            .finish()
    }
}

impl ErrorMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_thresholds(thresholds: impl IntoIterator<Item = (ErrorType, MonitorThreshold)>) -> Self {
        let monitor = Self::new();
        for (error_type, config) in thresholds {
            monitor.set_threshold(error_type, config.threshold, config.window);
        }
        monitor
    }

    /// `window` of zero compares the cumulative count
    pub fn set_threshold(&self, error_type: ErrorType, threshold: u64, window: Duration) {
        self.state
            .lock()
            .thresholds
            .insert(error_type, MonitorThreshold { threshold, window });
    }

    pub fn threshold(&self, error_type: ErrorType) -> Option<MonitorThreshold> {
        self.state.lock().thresholds.get(&error_type).copied()
    }

    /// Register a callback run each time a type reaches its threshold
    pub fn on_alert(&self, callback: impl Fn(&MonitorAlert) + Send + Sync + 'static) {
        self.callbacks.write().push(Arc::new(callback));
    }

    /// Count one error; true when the type is at or above its threshold
    pub fn record_error(&self, error_type: ErrorType) -> bool {
        self.record_error_at(error_type, Instant::now())
    }

    /// [`record_error`](Self::record_error) evaluated at `now`
    ///
    /// A zero window compares the cumulative count; a non-zero window compares
    /// only the events younger than the window.
    pub fn record_error_at(&self, error_type: ErrorType, now: Instant) -> bool {
        let alert = {
            let mut state = self.state.lock();
            let total = {
                let counter = state.counts.entry(error_type).or_insert(0);
                *counter = counter.saturating_add(1);
                *counter
            };

            let Some(config) = state.thresholds.get(&error_type).copied() else {
                return false;
            };
            if config.threshold == 0 {
                return true;
            }

            let observed = if config.window.is_zero() {
                total
            } else {
                let events = state.events.entry(error_type).or_default();
                events.push_back(now);
                while let Some(oldest) = events.front() {
                    if now.saturating_duration_since(*oldest) > config.window {
                        events.pop_front();
                    } else {
                        break;
                    }
                }
                events.len() as u64
            };

            if observed < config.threshold {
                return false;
            }
            (observed == config.threshold).then(|| MonitorAlert {
                error_type,
                count: observed,
                threshold: config.threshold,
                window_ms: config.window.as_millis() as u64,
            })
        };

        if let Some(alert) = alert {
            warn!(
                error_type = %alert.error_type,
                count = alert.count,
                threshold = alert.threshold,
                window_ms = alert.window_ms,
                "Error threshold reached"
            );
            let callbacks = self.callbacks.read().clone();
            for callback in callbacks {
                callback(&alert);
            }
        }
        true
    }

    /// Cumulative counts since the last reset
    pub fn get_error_counts(&self) -> BTreeMap<ErrorType, u64> {
        self.state
            .lock()
            .counts
            .iter()
            .map(|(error_type, count)| (*error_type, *count))
            .collect()
    }

    /// Zero every counter and window; thresholds are kept
    pub fn reset_counters(&self) {
        let mut state = self.state.lock();
        state.counts.clear();
        state.events.clear();
    }
}
