//! Detailed validation errors and validator results

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::message::SipMessage;

use super::ErrorType;

/// Everything a remote client needs to correct a rejected request
///
/// Values are produced by the [`DiagnosticGenerator`](super::DiagnosticGenerator)
/// and rendered once by the [`ResponseBuilder`](crate::response::ResponseBuilder).
/// Fields are read-only after construction.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{validator_name}: {code} {reason}")]
pub struct DetailedValidationError {
    validator_name: String,
    code: u16,
    reason: String,
    details: String,
    missing_headers: Vec<String>,
    invalid_headers: IndexMap<String, String>,
    suggestions: Vec<String>,
    context: IndexMap<String, Value>,
    error_type: ErrorType,
}

impl DetailedValidationError {
    pub(crate) fn new(
        validator_name: impl Into<String>,
        code: u16,
        reason: impl Into<String>,
        error_type: ErrorType,
    ) -> Self {
        Self {
            validator_name: validator_name.into(),
            code,
            reason: reason.into(),
            details: String::new(),
            missing_headers: Vec::new(),
            invalid_headers: IndexMap::new(),
            suggestions: Vec::new(),
            context: IndexMap::new(),
            error_type,
        }
    }

    pub(crate) fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub(crate) fn push_missing(&mut self, header: impl Into<String>) {
        self.missing_headers.push(header.into());
    }

    pub(crate) fn push_invalid(&mut self, header: impl Into<String>, reason: impl Into<String>) {
        self.invalid_headers.insert(header.into(), reason.into());
    }

    /// Suggestions are de-duplicated, first occurrence wins
    pub(crate) fn push_suggestion(&mut self, suggestion: impl Into<String>) {
        let suggestion = suggestion.into();
        if !self.suggestions.contains(&suggestion) {
            self.suggestions.push(suggestion);
        }
    }

    pub(crate) fn insert_context(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.context.insert(key.into(), value.into());
    }

    /// Name of the validator that produced the error
    pub fn validator_name(&self) -> &str {
        &self.validator_name
    }

    /// SIP status code the response will carry
    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn missing_headers(&self) -> &[String] {
        &self.missing_headers
    }

    pub fn invalid_headers(&self) -> &IndexMap<String, String> {
        &self.invalid_headers
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn context(&self) -> &IndexMap<String, Value> {
        &self.context
    }

    /// Convenience lookup of an integer context value
    pub fn context_u64(&self, key: &str) -> Option<u64> {
        self.context.get(key).and_then(Value::as_u64)
    }

    /// Convenience lookup of a string context value
    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(Value::as_str)
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }
}

/// Outcome of a single validator or of the whole chain
///
/// A result is valid exactly when it carries neither a response nor an error;
/// the constructors are the only way to build one.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    valid: bool,
    response: Option<SipMessage>,
    error: Option<DetailedValidationError>,
}

impl ValidationResult {
    /// Passing result
    pub fn valid() -> Self {
        Self {
            valid: true,
            response: None,
            error: None,
        }
    }

    /// Failing result with the response to send and the diagnostic behind it
    pub fn invalid(response: SipMessage, error: DetailedValidationError) -> Self {
        Self {
            valid: false,
            response: Some(response),
            error: Some(error),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn response(&self) -> Option<&SipMessage> {
        self.response.as_ref()
    }

    pub fn error(&self) -> Option<&DetailedValidationError> {
        self.error.as_ref()
    }

    /// Split into the response and diagnostic, both `None` when valid
    pub fn into_parts(self) -> (Option<SipMessage>, Option<DetailedValidationError>) {
        (self.response, self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::StatusCode;

    #[test]
    fn test_valid_result_has_no_payload() {
        let result = ValidationResult::valid();
        assert!(result.is_valid());
        assert!(result.response().is_none());
        assert!(result.error().is_none());
    }

    #[test]
    fn test_invalid_result_carries_both() {
        let err = DetailedValidationError::new("basic", 400, "Bad Request", ErrorType::ValidationError);
        let result = ValidationResult::invalid(SipMessage::response(StatusCode::BadRequest), err);
        assert!(!result.is_valid());
        let (response, error) = result.into_parts();
        assert_eq!(response.and_then(|r| r.status_code()), Some(400));
        assert_eq!(error.map(|e| e.validator_name().to_string()), Some("basic".to_string()));
    }

    #[test]
    fn test_suggestions_are_deduplicated() {
        let mut err = DetailedValidationError::new("basic", 400, "Bad Request", ErrorType::ValidationError);
        err.push_suggestion("add Via");
        err.push_suggestion("add Via");
        err.push_suggestion("add To");
        assert_eq!(err.suggestions(), &["add Via".to_string(), "add To".to_string()]);
        assert_eq!(err.to_string(), "basic: 400 Bad Request");
    }
}
