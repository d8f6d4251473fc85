//! Periodic statistics sampling
//!
//! [`StatisticsCollector`] takes a snapshot of the [`StatisticsStore`] on a
//! fixed interval and hands it to every registered [`MetricCollector`]. The
//! sampler only reads snapshots, so request handling never waits on it.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::diagnostic::{ErrorStatistics, ErrorType};

use super::store::StatisticsStore;

/// One point-in-time view handed to collectors
#[derive(Debug, Clone)]
pub struct StatisticsSample {
    pub taken_at: Instant,
    pub timestamp: DateTime<Utc>,
    pub statistics: ErrorStatistics,
}

impl StatisticsSample {
    pub fn new(taken_at: Instant, statistics: ErrorStatistics) -> Self {
        Self {
            taken_at,
            timestamp: Utc::now(),
            statistics,
        }
    }
}

/// Consumer of periodic samples
pub trait MetricCollector: Send + Sync {
    fn name(&self) -> &str;

    fn collect(&self, sample: &StatisticsSample);

    /// Current findings as JSON
    fn report(&self) -> Value;

    fn reset(&self) {}
}

/// Errors per second per type between consecutive samples
#[derive(Debug, Default)]
pub struct ErrorRateCollector {
    state: Mutex<RateState>,
}

#[derive(Debug, Default)]
struct RateState {
    previous: Option<StatisticsSample>,
    rates: BTreeMap<ErrorType, f64>,
}

impl ErrorRateCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest rate for `error_type`, `None` before two samples were seen
    pub fn rate(&self, error_type: ErrorType) -> Option<f64> {
        self.state.lock().rates.get(&error_type).copied()
    }

    pub fn total_rate(&self) -> f64 {
        self.state.lock().rates.values().sum()
    }
}

impl MetricCollector for ErrorRateCollector {
    fn name(&self) -> &str {
        "error_rate"
    }

    fn collect(&self, sample: &StatisticsSample) {
        let mut state = self.state.lock();
        if let Some(previous) = &state.previous {
            let elapsed = sample.taken_at.saturating_duration_since(previous.taken_at).as_secs_f64();
            if elapsed > 0.0 {
                let rates = ErrorType::ALL
                    .into_iter()
                    .map(|t| {
                        let now = sample.statistics.count(t);
                        let before = previous.statistics.count(t);
                        // a reset between samples restarts from zero
                        let delta = if now >= before { now - before } else { now };
                        (t, delta as f64 / elapsed)
                    })
                    .collect();
                state.rates = rates;
            }
        }
        state.previous = Some(sample.clone());
    }

    fn report(&self) -> Value {
        let state = self.state.lock();
        let rates: BTreeMap<&str, f64> = state.rates.iter().map(|(t, r)| (t.as_str(), *r)).collect();
        json!({
            "errors_per_second": rates,
            "total_per_second": state.rates.values().sum::<f64>(),
        })
    }

    fn reset(&self) {
        *self.state.lock() = RateState::default();
    }
}

/// Direction of total errors over the retained history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

/// Bounded history of per-interval error totals
#[derive(Debug)]
pub struct ErrorTrendCollector {
    capacity: usize,
    state: Mutex<TrendState>,
}

#[derive(Debug, Default)]
struct TrendState {
    last_total: Option<u64>,
    /// New errors per sample interval, oldest first
    history: VecDeque<u64>,
}

impl ErrorTrendCollector {
    /// Keeps at most `capacity` intervals, minimum 2
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(2),
            state: Mutex::new(TrendState::default()),
        }
    }

    pub fn history(&self) -> Vec<u64> {
        self.state.lock().history.iter().copied().collect()
    }

    /// Compares the mean of the newer half of the history with the older half
    pub fn trend(&self) -> Trend {
        let state = self.state.lock();
        let len = state.history.len();
        if len < 2 {
            return Trend::Stable;
        }
        let split = len / 2;
        let older = state.history.iter().take(split).sum::<u64>() as f64 / split as f64;
        let newer = state.history.iter().skip(split).sum::<u64>() as f64 / (len - split) as f64;

        if newer > older {
            Trend::Increasing
        } else if newer < older {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }
}

impl MetricCollector for ErrorTrendCollector {
    fn name(&self) -> &str {
        "error_trend"
    }

    fn collect(&self, sample: &StatisticsSample) {
        let total = sample.statistics.total_errors();
        let mut state = self.state.lock();
        if let Some(last) = state.last_total {
            let delta = if total >= last { total - last } else { total };
            if state.history.len() >= self.capacity {
                state.history.pop_front();
            }
            state.history.push_back(delta);
        }
        state.last_total = Some(total);
    }

    fn report(&self) -> Value {
        json!({
            "trend": self.trend(),
            "history": self.history(),
        })
    }

    fn reset(&self) {
        *self.state.lock() = TrendState::default();
    }
}

/// Background sampler feeding registered collectors
pub struct StatisticsCollector {
    store: Arc<StatisticsStore>,
    interval: Duration,
    collectors: RwLock<Vec<Arc<dyn MetricCollector>>>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for StatisticsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.collectors.read().iter().map(|c| c.name().to_string()).collect();
        f.debug_struct("StatisticsCollector")
            .field("interval", &self.interval)
            .field("collectors", &names)
            .field("running", &self.is_running())
            .finish()
    }
}

impl StatisticsCollector {
    pub fn new(store: Arc<StatisticsStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            collectors: RwLock::new(Vec::new()),
            shutdown: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Collector with the rate and trend collectors already registered
    pub fn with_default_collectors(store: Arc<StatisticsStore>, interval: Duration) -> Self {
        let collector = Self::new(store, interval);
        collector.add_collector(Arc::new(ErrorRateCollector::new()));
        collector.add_collector(Arc::new(ErrorTrendCollector::new(60)));
        collector
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn add_collector(&self, collector: Arc<dyn MetricCollector>) {
        debug!(collector = collector.name(), "Registered metric collector");
        self.collectors.write().push(collector);
    }

    /// Take one sample now and feed every collector
    pub fn sample_now(&self) -> StatisticsSample {
        let sample = StatisticsSample::new(Instant::now(), self.store.statistics());
        let collectors = self.collectors.read().clone();
        for collector in collectors {
            collector.collect(&sample);
        }
        sample
    }

    /// `{ collector name: report }` for every collector
    pub fn report(&self) -> Value {
        let reports: serde_json::Map<String, Value> = self
            .collectors
            .read()
            .iter()
            .map(|c| (c.name().to_string(), c.report()))
            .collect();
        Value::Object(reports)
    }

    pub fn reset(&self) {
        for collector in self.collectors.read().iter() {
            collector.reset();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Spawn the sampling loop on the current tokio runtime
    ///
    /// Returns false when it is already running.
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use std::time::Duration;
    /// # use rvoip_validation_core::stats::{StatisticsCollector, StatisticsStore};
    /// # tokio_test::block_on(async {
    /// let store = Arc::new(StatisticsStore::default());
    /// let sampler = Arc::new(StatisticsCollector::with_default_collectors(store, Duration::from_secs(1)));
    ///
    /// assert!(sampler.start());
    /// assert!(!sampler.start());
    /// sampler.stop().await;
    /// assert!(!sampler.is_running());
    /// # });
    /// ```
    pub fn start(self: &Arc<Self>) -> bool {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }

        let (tx, mut rx) = watch::channel(false);
        // the loop must not keep the collector alive; dropping it also drops `tx`
        let weak = Arc::downgrade(self);
        // tokio rejects a zero period
        let period = self.interval.max(Duration::from_millis(1));
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(this) = weak.upgrade() else {
                            break;
                        };
                        let sample = this.sample_now();
                        debug!(total = sample.statistics.total_errors(), "Statistics sampled");
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Statistics sampler stopped");
        }));
        *self.shutdown.lock() = Some(tx);
        info!(interval_ms = period.as_millis() as u64, "Statistics sampler started");
        true
    }

    /// Signal the loop to stop and wait for it
    pub async fn stop(&self) {
        if let Some(tx) = self.shutdown.lock().take() {
            let _ = tx.send(true);
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}
