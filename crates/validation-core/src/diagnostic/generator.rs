//! Diagnostic generation for protocol failures
//!
//! One operation per failure class. Each fixes the status code for its class,
//! fills in missing/invalid header details, records machine-readable context
//! used by the [`ResponseBuilder`] for class-specific headers, and attaches
//! remediation suggestions.

use serde_json::{json, Value};

use crate::classify::categorize_parse_error;
use crate::message::{Method, SipMessage, StatusCode};
use crate::response::ResponseBuilder;

use super::suggestions;
use super::{DetailedValidationError, ErrorType, ValidationResult};

/// Produces [`DetailedValidationError`]s attributed to one validator
#[derive(Debug, Clone)]
pub struct DiagnosticGenerator {
    validator_name: String,
    builder: ResponseBuilder,
    session_expires: u32,
}

impl DiagnosticGenerator {
    /// Generator using the stock response templates
    pub fn new(validator_name: impl Into<String>) -> Self {
        Self::with_builder(validator_name, ResponseBuilder::new())
    }

    pub fn with_builder(validator_name: impl Into<String>, builder: ResponseBuilder) -> Self {
        Self {
            validator_name: validator_name.into(),
            builder,
            session_expires: suggestions::DEFAULT_SESSION_EXPIRES,
        }
    }

    /// Interval proposed in session-timer guidance
    pub fn with_session_expires(mut self, seconds: u32) -> Self {
        self.session_expires = seconds;
        self
    }

    pub fn session_expires(&self) -> u32 {
        self.session_expires
    }

    pub fn validator_name(&self) -> &str {
        &self.validator_name
    }

    pub fn builder(&self) -> &ResponseBuilder {
        &self.builder
    }

    fn base(&self, request: Option<&SipMessage>, status: StatusCode, error_type: ErrorType) -> DetailedValidationError {
        let mut error = DetailedValidationError::new(
            self.validator_name.clone(),
            status.as_u16(),
            status.reason_phrase(),
            error_type,
        );
        if let Some(request) = request {
            if let Some(method) = request.method() {
                error.insert_context("method", method.as_str());
            }
            if let Some(uri) = request.request_uri() {
                error.insert_context("request_uri", uri);
            }
            if let Some(call_id) = request.header("Call-ID") {
                error.insert_context("call_id", call_id);
            }
        }
        error
    }

    /// 400 with any combination of missing and invalid headers
    pub fn bad_request(
        &self,
        request: &SipMessage,
        reason: &str,
        missing: &[&str],
        invalid: &[(&str, &str)],
    ) -> DetailedValidationError {
        let mut error = self
            .base(Some(request), StatusCode::BadRequest, ErrorType::ValidationError)
            .with_details(reason);

        for header in missing {
            error.push_missing(*header);
            error.push_suggestion(suggestions::header_suggestion(header, "missing"));
        }
        for (header, why) in invalid {
            error.push_invalid(*header, *why);
            error.push_suggestion(suggestions::header_suggestion(header, why));
        }
        error
    }

    /// 400 listing required headers that are absent
    pub fn missing_headers(&self, request: &SipMessage, headers: &[&str]) -> DetailedValidationError {
        let details = format!("Missing required headers: {}", headers.join(", "));
        self.bad_request(request, &details, headers, &[])
    }

    /// 400 listing headers whose values failed validation
    pub fn invalid_headers(&self, request: &SipMessage, invalid: &[(&str, &str)]) -> DetailedValidationError {
        let details = invalid
            .iter()
            .map(|(name, why)| format!("{}: {}", name, why))
            .collect::<Vec<_>>()
            .join("; ");
        self.bad_request(request, &format!("Invalid headers: {}", details), &[], invalid)
    }

    /// 405 naming the methods this server accepts
    pub fn method_not_allowed(&self, request: &SipMessage, allowed: &[Method]) -> DetailedValidationError {
        let method = request.method().map(Method::as_str).unwrap_or("<none>");
        let mut error = self
            .base(Some(request), StatusCode::MethodNotAllowed, ErrorType::ValidationError)
            .with_details(format!("Method {} is not supported by this server", method));

        let names: Vec<Value> = allowed.iter().map(|m| Value::from(m.as_str())).collect();
        error.insert_context("allowed_methods", Value::Array(names));
        for suggestion in suggestions::method_suggestions(allowed) {
            error.push_suggestion(suggestion);
        }
        error
    }

    /// 421 for a request that must declare `extension`
    pub fn extension_required(&self, request: &SipMessage, extension: &str) -> DetailedValidationError {
        let mut error = self
            .base(Some(request), StatusCode::ExtensionRequired, ErrorType::ValidationError)
            .with_details(format!("This server requires the '{}' extension", extension));

        error.insert_context("extension", extension);
        for suggestion in suggestions::extension_suggestions(extension, self.session_expires) {
            error.push_suggestion(suggestion);
        }
        error
    }

    /// 422 for a Session-Expires below the negotiated minimum
    pub fn interval_too_brief(&self, request: &SipMessage, min_se: u32, requested: u32) -> DetailedValidationError {
        let mut error = self
            .base(Some(request), StatusCode::SessionIntervalTooSmall, ErrorType::ValidationError)
            .with_details(format!(
                "Session-Expires {} is smaller than the minimum of {} seconds",
                requested, min_se
            ));

        error.insert_context("min_se", min_se);
        error.insert_context("requested", requested);
        for suggestion in suggestions::interval_suggestions(min_se, requested) {
            error.push_suggestion(suggestion);
        }
        error
    }

    /// 423 for a REGISTER whose Expires is below the registrar minimum
    pub fn registration_interval_too_brief(
        &self,
        request: &SipMessage,
        min_expires: u32,
        requested: u32,
    ) -> DetailedValidationError {
        let mut error = self
            .base(Some(request), StatusCode::IntervalTooBrief, ErrorType::ValidationError)
            .with_details(format!(
                "Registration interval {} is smaller than the minimum of {} seconds",
                requested, min_expires
            ));

        error.insert_context("min_expires", min_expires);
        error.insert_context("requested", requested);
        for suggestion in suggestions::registration_interval_suggestions(min_expires, requested) {
            error.push_suggestion(suggestion);
        }
        error
    }

    /// 400 for a message the parser rejected
    pub fn parse_failure(&self, message: &str, raw_len: Option<usize>) -> DetailedValidationError {
        let category = categorize_parse_error(message);
        let mut error = self
            .base(None, StatusCode::BadRequest, ErrorType::ParseError)
            .with_details(format!("Failed to parse message: {}", message));

        error.insert_context("parse_category", category.as_str());
        if let Some(len) = raw_len {
            error.insert_context("raw_length", json!(len));
        }
        for suggestion in suggestions::parse_suggestions(category) {
            error.push_suggestion(suggestion);
        }
        error
    }

    /// Render a diagnostic into its response
    pub fn build_response(&self, request: Option<&SipMessage>, error: &DetailedValidationError) -> SipMessage {
        self.builder.build(request, error)
    }

    /// Wrap a diagnostic into a failing [`ValidationResult`]
    pub fn reject(&self, request: &SipMessage, error: DetailedValidationError) -> ValidationResult {
        let response = self.builder.build(Some(request), &error);
        ValidationResult::invalid(response, error)
    }

    pub fn bad_request_response(
        &self,
        request: &SipMessage,
        reason: &str,
        missing: &[&str],
        invalid: &[(&str, &str)],
    ) -> SipMessage {
        let error = self.bad_request(request, reason, missing, invalid);
        self.builder.build(Some(request), &error)
    }

    pub fn method_not_allowed_response(&self, request: &SipMessage, allowed: &[Method]) -> SipMessage {
        let error = self.method_not_allowed(request, allowed);
        self.builder.build(Some(request), &error)
    }

    pub fn extension_required_response(&self, request: &SipMessage, extension: &str) -> SipMessage {
        let error = self.extension_required(request, extension);
        self.builder.build(Some(request), &error)
    }

    pub fn interval_too_brief_response(&self, request: &SipMessage, min_se: u32, requested: u32) -> SipMessage {
        let error = self.interval_too_brief(request, min_se, requested);
        self.builder.build(Some(request), &error)
    }
}
