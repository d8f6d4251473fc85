//! # Validation pipeline
//!
//! [`ValidationPipeline`] is the one entry point a transaction layer needs.
//! It owns the validator chain, the error logger and monitor, the malformed
//! message detector and the recovery manager, and hands every terminal
//! response to a [`ResponseSink`].
//!
//! Each call reaches the sink at most once. A retry directive never produces
//! a response; a fallback response never comes with a retry directive.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use rvoip_validation_core::config::PipelineConfig;
//! use rvoip_validation_core::message::{Method, SipMessage};
//! use rvoip_validation_core::pipeline::{PipelineOutcome, ValidationPipeline};
//!
//! let sent = Arc::new(Mutex::new(Vec::new()));
//! let seen = sent.clone();
//! let pipeline = ValidationPipeline::new(PipelineConfig::default(), move |response: SipMessage| {
//!     seen.lock().unwrap().push(response);
//! })
//! .unwrap();
//!
//! // no Via, From, To, Call-ID or CSeq
//! let request = SipMessage::request(Method::Options, "sip:bob@example.com");
//! assert_eq!(pipeline.process_request(Some(&request)), PipelineOutcome::Rejected { status: 400 });
//! assert_eq!(sent.lock().unwrap().len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::diagnostic::{DetailedValidationError, DiagnosticGenerator, ErrorType};
use crate::error::Result;
use crate::malformed::{scrape_correlation_headers, MalformedMessageDetector, DETECTOR_NAME};
use crate::message::{SipMessage, StatusCode};
use crate::recovery::{RecoveryContext, RecoveryManager};
use crate::response::ResponseBuilder;
use crate::stats::{ErrorLogger, ErrorMonitor, StatisticsCollector};
use crate::validation::{ValidationChain, Validator};

/// Name reported for errors handed in by the caller rather than a validator
pub const PIPELINE_NAME: &str = "validation_pipeline";

/// Where terminal responses go, usually the transaction layer
pub trait ResponseSink: Send + Sync {
    fn send_response(&self, response: SipMessage);
}

impl<F> ResponseSink for F
where
    F: Fn(SipMessage) + Send + Sync,
{
    fn send_response(&self, response: SipMessage) {
        self(response)
    }
}

/// Sink forwarding responses over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SipMessage>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<SipMessage>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving half
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SipMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ResponseSink for ChannelSink {
    fn send_response(&self, response: SipMessage) {
        if self.tx.send(response).is_err() {
            warn!("Response receiver dropped, discarding response");
        }
    }
}

/// What happened to one request or failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Passed every validator; hand it to business logic
    Accepted,
    /// A response with this status was sent
    Rejected { status: u16 },
    /// Nothing was sent; re-run the failed operation after the delay
    Retry { after: Duration },
    /// Nothing was sent and nothing should be retried
    Dropped,
}

impl PipelineOutcome {
    /// Whether a response went to the sink
    pub fn responded(&self) -> bool {
        matches!(self, PipelineOutcome::Rejected { .. })
    }
}

pub struct ValidationPipeline {
    config: PipelineConfig,
    chain: ValidationChain,
    logger: Arc<ErrorLogger>,
    monitor: Arc<ErrorMonitor>,
    recovery: Arc<RecoveryManager>,
    detector: MalformedMessageDetector,
    generator: DiagnosticGenerator,
    sink: Arc<dyn ResponseSink>,
}

impl fmt::Debug for ValidationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("validators", &self.chain.names())
            .field("logger", &self.logger)
            .field("monitor", &self.monitor)
            .field("recovery", &self.recovery)
            .finish_non_exhaustive()
    }
}

impl ValidationPipeline {
    /// Pipeline with the standard validators and default response templates
    pub fn new(config: PipelineConfig, sink: impl ResponseSink + 'static) -> Result<Self> {
        Self::with_builder(config, ResponseBuilder::new(), Arc::new(sink))
    }

    /// Pipeline rendering every response through `builder`
    pub fn with_builder(config: PipelineConfig, builder: ResponseBuilder, sink: Arc<dyn ResponseSink>) -> Result<Self> {
        config.validate()?;

        let chain = ValidationChain::from_config(&config, &builder);
        let logger = Arc::new(ErrorLogger::from_config(&config.statistics));
        let monitor = Arc::new(ErrorMonitor::from_thresholds(config.monitor_thresholds()));
        let recovery = Arc::new(RecoveryManager::from_config(&config, builder.clone()));
        let detector = MalformedMessageDetector::new()
            .with_request_methods(config.supported_methods.clone())
            .with_builder(builder.clone());
        let generator = DiagnosticGenerator::with_builder(DETECTOR_NAME, builder);

        debug!(validators = ?chain.names(), "Validation pipeline created");
        Ok(Self {
            config,
            chain,
            logger,
            monitor,
            recovery,
            detector,
            generator,
            sink,
        })
    }

    /// Share an existing logger, for example across several pipelines
    pub fn with_logger(mut self, logger: Arc<ErrorLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<ErrorMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn add_validator<V: Validator + 'static>(&mut self, validator: V) {
        self.chain.add_validator(validator);
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn chain(&self) -> &ValidationChain {
        &self.chain
    }

    pub fn logger(&self) -> &Arc<ErrorLogger> {
        &self.logger
    }

    pub fn monitor(&self) -> &Arc<ErrorMonitor> {
        &self.monitor
    }

    pub fn recovery(&self) -> &Arc<RecoveryManager> {
        &self.recovery
    }

    /// Sampler over this pipeline's statistics, not yet started
    pub fn statistics_collector(&self) -> StatisticsCollector {
        StatisticsCollector::with_default_collectors(
            self.logger.store().clone(),
            self.config.statistics.sample_interval(),
        )
    }

    /// Validate a parsed request; rejected requests are answered here
    pub fn process_request(&self, request: Option<&SipMessage>) -> PipelineOutcome {
        let result = self.chain.validate(request);
        if result.is_valid() {
            return PipelineOutcome::Accepted;
        }

        let (response, error) = result.into_parts();
        let Some(error) = error else {
            return self.send(response);
        };

        self.logger.log_validation_error(&error, request);
        self.monitor.record_error(error.error_type());

        let response = response.unwrap_or_else(|| self.generator.build_response(request, &error));
        self.send(Some(response))
    }

    /// Answer bytes the parser rejected with one aggregated 400
    ///
    /// The detector's findings are used when it recognises the defects,
    /// otherwise the parser's own message. Without a Via header to route
    /// the response nothing is sent.
    pub fn handle_parse_failure(&self, raw: &[u8], parse_error: &str) -> PipelineOutcome {
        self.logger.log_parse_error(parse_error, Some(raw.len()));
        self.monitor.record_error(ErrorType::ParseError);

        let correlation = scrape_correlation_headers(raw);
        if !correlation.has_header("Via") {
            debug!(raw_len = raw.len(), "Unparsable message without Via, not answering");
            return PipelineOutcome::Dropped;
        }

        let response = match self.detector.analyze(raw) {
            Some((_, response)) => response,
            None => {
                let error = self.generator.parse_failure(parse_error, Some(raw.len()));
                self.generator.build_response(Some(&correlation), &error)
            }
        };
        self.send(Some(response))
    }

    /// Log a failure that escaped validation and act on the recovery decision
    pub fn handle_error(
        &self,
        error_type: ErrorType,
        error: &str,
        context: &RecoveryContext,
        request: Option<&SipMessage>,
    ) -> PipelineOutcome {
        self.log_error(error_type, error, context, request);
        self.monitor.record_error(error_type);

        let result = self.recovery.attempt_recovery(error_type, error, context);
        if result.should_retry {
            return PipelineOutcome::Retry {
                after: result.retry_after.unwrap_or_default(),
            };
        }

        match self.recovery.get_fallback_response(error_type, error, context, request) {
            Some(response) => self.send(Some(response)),
            None => PipelineOutcome::Dropped,
        }
    }

    fn log_error(&self, error_type: ErrorType, error: &str, context: &RecoveryContext, request: Option<&SipMessage>) {
        match error_type {
            ErrorType::ParseError => {
                self.logger.log_parse_error(error, None);
            }
            ErrorType::ValidationError => {
                let diagnostic = DetailedValidationError::new(
                    PIPELINE_NAME,
                    StatusCode::BadRequest.as_u16(),
                    StatusCode::BadRequest.reason_phrase(),
                    ErrorType::ValidationError,
                )
                .with_details(error);
                self.logger.log_validation_error(&diagnostic, request);
            }
            ErrorType::ProcessingError => self.logger.log_processing_error(error, request),
            ErrorType::TransportError => {
                let peer = context.values.get("peer").and_then(|v| v.as_str());
                self.logger.log_transport_error(error, peer);
            }
            ErrorType::AuthenticationError => {
                let status = context
                    .values
                    .get("status")
                    .and_then(|v| v.as_u64())
                    .and_then(|s| u16::try_from(s).ok())
                    .unwrap_or(StatusCode::Forbidden.as_u16());
                self.logger.log_authentication_error(error, status, request);
            }
            ErrorType::SessionTimerError => self.logger.log_session_timer_error(error, request),
        }
    }

    fn send(&self, response: Option<SipMessage>) -> PipelineOutcome {
        match response {
            Some(response) => {
                let status = response.status_code().unwrap_or_default();
                self.sink.send_response(response);
                PipelineOutcome::Rejected { status }
            }
            None => PipelineOutcome::Dropped,
        }
    }
}
