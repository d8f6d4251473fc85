//! # Validation Chain
//!
//! Ordered, short-circuiting request validation.
//!
//! Each [`Validator`] checks one concern and reports a [`ValidationResult`].
//! The [`ValidationChain`] keeps its validators sorted by ascending
//! [`Validator::priority`] (ties keep insertion order) and stops at the first
//! applicable validator that fails.
//!
//! | Validator | Priority | Applies to |
//! |-----------|----------|------------|
//! | [`BasicStructureValidator`] | 10 | every request |
//! | [`MethodValidator`] | 20 | every request |
//! | [`SessionTimerValidator`] | 30 | INVITE, UPDATE |
//! | [`RegistrationValidator`] | 40 | REGISTER |
//!
//! ```rust
//! use rvoip_validation_core::config::PipelineConfig;
//! use rvoip_validation_core::message::{Method, SipMessage};
//! use rvoip_validation_core::response::ResponseBuilder;
//! use rvoip_validation_core::validation::ValidationChain;
//!
//! let chain = ValidationChain::from_config(&PipelineConfig::default(), &ResponseBuilder::new());
//! let request = SipMessage::request(Method::Options, "sip:bob@example.com")
//!     .with_header("Via", "SIP/2.0/UDP host;branch=z9hG4bK1")
//!     .with_header("From", "<sip:alice@example.com>;tag=1")
//!     .with_header("To", "<sip:bob@example.com>")
//!     .with_header("Call-ID", "abc")
//!     .with_header("CSeq", "1 OPTIONS");
//!
//! assert!(chain.validate(Some(&request)).is_valid());
//! ```

pub mod basic;
pub mod headers;
pub mod method;
pub mod registration;
pub mod session_timer;

use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::PipelineConfig;
use crate::diagnostic::{DetailedValidationError, ErrorType, ValidationResult};
use crate::message::{SipMessage, StatusCode};
use crate::response::ResponseBuilder;

pub use basic::BasicStructureValidator;
pub use method::MethodValidator;
pub use registration::RegistrationValidator;
pub use session_timer::SessionTimerValidator;

/// Validator name used when the chain itself rejects the input
pub const CHAIN_NAME: &str = "validation_chain";

/// A single-concern request check
pub trait Validator: Send + Sync {
    /// Check `request`; must never panic on malformed input
    fn validate(&self, request: &SipMessage) -> ValidationResult;

    /// Lower runs first
    fn priority(&self) -> i32;

    fn name(&self) -> &str;

    /// Whether this validator should run for `request`
    fn applies_to(&self, _request: &SipMessage) -> bool {
        true
    }
}

/// Validators sorted by priority, run with short-circuit on first failure
#[derive(Clone)]
pub struct ValidationChain {
    validators: Vec<Arc<dyn Validator>>,
    builder: ResponseBuilder,
}

impl std::fmt::Debug for ValidationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationChain")
            .field("validators", &self.names())
            .finish()
    }
}

impl Default for ValidationChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationChain {
    /// Empty chain; every request passes
    pub fn new() -> Self {
        Self::with_builder(ResponseBuilder::new())
    }

    pub fn with_builder(builder: ResponseBuilder) -> Self {
        Self {
            validators: Vec::new(),
            builder,
        }
    }

    /// The four standard validators configured from `config`
    pub fn from_config(config: &PipelineConfig, builder: &ResponseBuilder) -> Self {
        let mut chain = Self::with_builder(builder.clone());
        chain.add_validator(BasicStructureValidator::new().with_builder(builder.clone()));
        chain.add_validator(
            MethodValidator::new(config.supported_methods.clone()).with_builder(builder.clone()),
        );
        chain.add_validator(
            SessionTimerValidator::new(config.session_timer.min_se, config.session_timer.require_timer)
                .with_session_expires(config.session_timer.default_session_expires)
                .with_builder(builder.clone()),
        );
        chain.add_validator(
            RegistrationValidator::new(config.registration.min_expires, config.registration.max_contacts)
                .with_builder(builder.clone()),
        );
        chain
    }

    /// Insert and re-sort; equal priorities keep insertion order
    pub fn add_validator<V: Validator + 'static>(&mut self, validator: V) {
        self.add_shared(Arc::new(validator));
    }

    pub fn add_shared(&mut self, validator: Arc<dyn Validator>) {
        debug!(
            validator = validator.name(),
            priority = validator.priority(),
            "Adding validator to chain"
        );
        self.validators.push(validator);
        // Vec::sort_by_key is stable
        self.validators.sort_by_key(|v| v.priority());
    }

    /// Validator names in execution order
    pub fn names(&self) -> Vec<String> {
        self.validators.iter().map(|v| v.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Run every applicable validator in priority order
    ///
    /// A `None` message is rejected with 400 rather than treated as valid.
    pub fn validate(&self, request: Option<&SipMessage>) -> ValidationResult {
        let Some(request) = request else {
            debug!("Rejecting absent message");
            let status = StatusCode::BadRequest;
            let error = DetailedValidationError::new(
                CHAIN_NAME,
                status.as_u16(),
                status.reason_phrase(),
                ErrorType::ValidationError,
            )
            .with_details("No message was supplied for validation");
            let response = self.builder.build(None, &error);
            return ValidationResult::invalid(response, error);
        };

        for validator in &self.validators {
            if !validator.applies_to(request) {
                trace!(validator = validator.name(), "Validator does not apply");
                continue;
            }

            let result = validator.validate(request);
            if !result.is_valid() {
                debug!(
                    validator = validator.name(),
                    status = result.error().map(|e| e.code()),
                    "Request rejected by validator"
                );
                return result;
            }
            trace!(validator = validator.name(), "Validator passed");
        }

        ValidationResult::valid()
    }
}
