//! Pipeline configuration
//!
//! Every section has working defaults, so a TOML file only needs to name what
//! it changes:
//!
//! ```toml
//! supported_methods = ["INVITE", "ACK", "BYE", "CANCEL", "OPTIONS"]
//!
//! [session_timer]
//! min_se = 120
//! require_timer = true
//!
//! [circuit_breakers.database]
//! max_failures = 3
//! timeout_ms = 15000
//!
//! [retry_policies.transport]
//! max_attempts = 2
//! initial_delay_ms = 250
//! max_delay_ms = 1000
//! backoff_factor = 2.0
//! retryable_errors = ["refused"]
//! ```
//!
//! Map keys naming an [`ErrorType`] accept the snake_case label with or
//! without the `_error` suffix (`transport` or `transport_error`).

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diagnostic::suggestions::DEFAULT_SESSION_EXPIRES;
use crate::diagnostic::ErrorType;
use crate::error::{PipelineError, Result};
use crate::logging::LoggingConfig;
use crate::message::Method;
use crate::recovery::RetryPolicy;
use crate::validation::headers::RFC4028_MIN_SE;

/// Serde adapter storing a [`Duration`] as integer milliseconds
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// RFC 4028 policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTimerConfig {
    /// Smallest Session-Expires accepted, in seconds
    pub min_se: u32,
    /// Reject INVITE/UPDATE without Session-Expires with 421
    pub require_timer: bool,
    /// Interval suggested to clients that omit one
    pub default_session_expires: u32,
}

impl Default for SessionTimerConfig {
    fn default() -> Self {
        Self {
            min_se: RFC4028_MIN_SE,
            require_timer: false,
            default_session_expires: DEFAULT_SESSION_EXPIRES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Smallest non-zero Expires accepted, in seconds
    pub min_expires: u32,
    pub max_contacts: usize,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            min_expires: 60,
            max_contacts: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Parse-error subtype count that triggers a systematic-issue warning
    pub pattern_threshold: u64,
    /// Recent-error entries kept before FIFO eviction
    pub recent_error_capacity: usize,
    /// Period of the background statistics sampler
    pub sample_interval_ms: u64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            pattern_threshold: 10,
            recent_error_capacity: 100,
            sample_interval_ms: 60_000,
        }
    }
}

impl StatisticsConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

/// Trip settings for one named circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub max_failures: u32,
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
}

impl CircuitBreakerConfig {
    pub fn new(max_failures: u32, timeout: Duration) -> Self {
        Self { max_failures, timeout }
    }
}

/// Alert threshold for one error type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorThreshold {
    pub threshold: u64,
    /// Zero counts cumulatively
    #[serde(rename = "window_ms", with = "duration_ms")]
    pub window: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Keyed by error type label
    pub thresholds: BTreeMap<String, MonitorThreshold>,
}

/// Everything the pipeline reads at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub session_timer: SessionTimerConfig,
    pub supported_methods: Vec<Method>,
    pub registration: RegistrationConfig,
    pub statistics: StatisticsConfig,
    pub circuit_breakers: BTreeMap<String, CircuitBreakerConfig>,
    /// Keyed by error type label
    pub retry_policies: BTreeMap<String, RetryPolicy>,
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let supported_methods = vec![
            Method::Invite,
            Method::Ack,
            Method::Bye,
            Method::Cancel,
            Method::Register,
            Method::Options,
            Method::Info,
            Method::Prack,
            Method::Update,
            Method::Subscribe,
            Method::Notify,
            Method::Refer,
            Method::Message,
        ];

        let circuit_breakers = BTreeMap::from([
            (
                "database".to_string(),
                CircuitBreakerConfig::new(5, Duration::from_secs(30)),
            ),
            (
                "transport".to_string(),
                CircuitBreakerConfig::new(3, Duration::from_secs(10)),
            ),
            (
                "authentication".to_string(),
                CircuitBreakerConfig::new(10, Duration::from_secs(60)),
            ),
        ]);

        let retry_policies = ErrorType::ALL
            .into_iter()
            .map(|t| (t.as_str().to_string(), RetryPolicy::default_for(t)))
            .collect();

        Self {
            session_timer: SessionTimerConfig::default(),
            supported_methods,
            registration: RegistrationConfig::default(),
            statistics: StatisticsConfig::default(),
            circuit_breakers,
            retry_policies,
            monitor: MonitorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading pipeline configuration");
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.session_timer.min_se < RFC4028_MIN_SE {
            return Err(PipelineError::Config(format!(
                "session_timer.min_se must be at least {} seconds, got {}",
                RFC4028_MIN_SE, self.session_timer.min_se
            )));
        }
        if self.session_timer.default_session_expires < self.session_timer.min_se {
            return Err(PipelineError::Config(
                "session_timer.default_session_expires must not be below min_se".to_string(),
            ));
        }
        if self.supported_methods.is_empty() {
            return Err(PipelineError::Config("supported_methods must not be empty".to_string()));
        }
        if self.statistics.pattern_threshold == 0 {
            return Err(PipelineError::Config("statistics.pattern_threshold must be greater than 0".to_string()));
        }
        if self.statistics.recent_error_capacity == 0 {
            return Err(PipelineError::Config(
                "statistics.recent_error_capacity must be greater than 0".to_string(),
            ));
        }
        if self.statistics.sample_interval_ms == 0 {
            return Err(PipelineError::Config("statistics.sample_interval_ms must be greater than 0".to_string()));
        }
        for (name, breaker) in &self.circuit_breakers {
            if breaker.max_failures == 0 {
                return Err(PipelineError::Config(format!(
                    "circuit_breakers.{}.max_failures must be greater than 0",
                    name
                )));
            }
        }
        for (key, policy) in &self.retry_policies {
            key.parse::<ErrorType>().map_err(PipelineError::Config)?;
            policy
                .validate()
                .map_err(|e| PipelineError::Config(format!("retry_policies.{}: {}", key, e)))?;
        }
        for key in self.monitor.thresholds.keys() {
            key.parse::<ErrorType>().map_err(PipelineError::Config)?;
        }
        Ok(())
    }

    /// Retry policy for `error_type`, falling back to its built-in default
    pub fn retry_policy(&self, error_type: ErrorType) -> RetryPolicy {
        self.retry_policies
            .iter()
            .find(|(key, _)| key.parse::<ErrorType>().ok() == Some(error_type))
            .map(|(_, policy)| policy.clone())
            .unwrap_or_else(|| RetryPolicy::default_for(error_type))
    }

    /// Monitor thresholds resolved to error types; unparsable keys are skipped
    pub fn monitor_thresholds(&self) -> Vec<(ErrorType, MonitorThreshold)> {
        self.monitor
            .thresholds
            .iter()
            .filter_map(|(key, threshold)| key.parse::<ErrorType>().ok().map(|t| (t, *threshold)))
            .collect()
    }
}
