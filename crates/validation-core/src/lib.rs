//! # RVoIP Validation Core
//!
//! Request validation, diagnostic responses and fault recovery for SIP
//! servers.
//!
//! Every inbound request is checked against RFC 3261 structural rules and
//! RFC 4028 session-timer rules before business logic sees it. A failed
//! check becomes a protocol-correct response carrying enough detail for the
//! client to fix the request. Failures are classified, counted and, when
//! they escape validation, handed to a recovery manager that decides between
//! retrying and answering with a minimal fallback.
//!
//! ## Architecture
//!
//! - `message`: the opaque SIP message consumed by every other module
//! - `validation`: the [`Validator`] trait and the priority-ordered
//!   [`ValidationChain`]
//! - `diagnostic`: error taxonomy, detailed diagnostics and the generator
//!   that builds them
//! - `response`: renders diagnostics into responses
//! - `malformed`: raw-byte defect detection for messages the parser rejected
//! - `classify`: every substring table used to classify error text
//! - `stats`: shared counters, error logging, threshold monitoring and
//!   periodic sampling
//! - `recovery`: circuit breakers, retry policies, strategies and fallbacks
//! - `pipeline`: [`ValidationPipeline`] tying the above to a response sink
//! - `config`, `logging`, `error`: configuration, tracing setup, crate errors
//!
//! ## Example
//!
//! ```rust
//! use rvoip_validation_core::prelude::*;
//!
//! let mut config = PipelineConfig::default();
//! config.session_timer.require_timer = true;
//! let chain = ValidationChain::from_config(&config, &ResponseBuilder::new());
//!
//! let invite = SipMessage::request(Method::Invite, "sip:bob@example.com")
//!     .with_header("Via", "SIP/2.0/UDP pc33.example.com;branch=z9hG4bK776")
//!     .with_header("From", "<sip:alice@example.com>;tag=1928")
//!     .with_header("To", "<sip:bob@example.com>")
//!     .with_header("Call-ID", "a84b4c76e66710")
//!     .with_header("CSeq", "314159 INVITE");
//!
//! let result = chain.validate(Some(&invite));
//! assert!(!result.is_valid());
//! assert_eq!(result.response().and_then(SipMessage::status_code), Some(421));
//! ```

pub mod classify;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod logging;
pub mod malformed;
pub mod message;
pub mod pipeline;
pub mod recovery;
pub mod response;
pub mod stats;
pub mod validation;

pub use config::PipelineConfig;
pub use diagnostic::{DetailedValidationError, DiagnosticGenerator, ErrorStatistics, ErrorType, ValidationResult};
pub use error::{PipelineError, Result};
pub use logging::{setup_logging, LoggingConfig};
pub use malformed::{MalformedErrorKind, MalformedMessageDetector, MalformedMessageError};
pub use message::{Method, SipMessage, StatusCode};
pub use pipeline::{PipelineOutcome, ResponseSink, ValidationPipeline};
pub use recovery::{CircuitBreaker, CircuitState, RecoveryContext, RecoveryManager, RecoveryResult, RecoveryType};
pub use response::ResponseBuilder;
pub use stats::{ErrorLogger, ErrorMonitor, StatisticsCollector, StatisticsStore};
pub use validation::{ValidationChain, Validator};

pub mod prelude {
    pub use crate::{
        DetailedValidationError, DiagnosticGenerator, ErrorLogger, ErrorMonitor, ErrorType, Method, PipelineConfig,
        PipelineError, PipelineOutcome, RecoveryContext, RecoveryManager, RecoveryType, ResponseBuilder,
        ResponseSink, Result, SipMessage, StatusCode, ValidationChain, ValidationPipeline, ValidationResult,
        Validator,
    };
}
