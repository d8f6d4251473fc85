//! # Error statistics
//!
//! Counting, logging and alerting for everything the pipeline rejects or
//! fails to recover from.
//!
//! - [`StatisticsStore`]: the shared counters, recent-error window and
//!   hourly histogram
//! - [`ErrorLogger`]: per-type log entries with severity suppression and
//!   parse-pattern detection
//! - [`ErrorMonitor`]: per-type thresholds over rolling windows
//! - [`StatisticsCollector`]: background sampling into pluggable
//!   [`MetricCollector`]s

pub mod collector;
pub mod logger;
pub mod monitor;
pub mod store;

pub use collector::{
    ErrorRateCollector, ErrorTrendCollector, MetricCollector, StatisticsCollector, StatisticsSample, Trend,
};
pub use logger::{severity_for, ErrorLogger};
pub use monitor::{AlertCallback, ErrorMonitor, MonitorAlert};
pub use store::{DetailedStatistics, DetectedPattern, RecentError, RecordOutcome, StatisticsStore};
