//! RFC 3261 structural checks that every request must pass first

use crate::diagnostic::{DiagnosticGenerator, ValidationResult};
use crate::message::SipMessage;
use crate::response::ResponseBuilder;

use super::headers::{validate_content_length, validate_cseq, validate_max_forwards, validate_request_uri};
use super::Validator;

/// Headers every request must carry (RFC 3261 §8.1.1)
pub const REQUIRED_HEADERS: [&str; 5] = ["Via", "From", "To", "Call-ID", "CSeq"];

/// Required headers, Request-URI scheme, CSeq, Max-Forwards and Content-Length
///
/// All defects found are reported together in one 400.
#[derive(Debug, Clone)]
pub struct BasicStructureValidator {
    generator: DiagnosticGenerator,
}

impl Default for BasicStructureValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl BasicStructureValidator {
    pub const NAME: &'static str = "basic_structure";
    pub const PRIORITY: i32 = 10;

    pub fn new() -> Self {
        Self {
            generator: DiagnosticGenerator::new(Self::NAME),
        }
    }

    pub fn with_builder(mut self, builder: ResponseBuilder) -> Self {
        self.generator = DiagnosticGenerator::with_builder(Self::NAME, builder);
        self
    }
}

impl Validator for BasicStructureValidator {
    fn validate(&self, request: &SipMessage) -> ValidationResult {
        let missing: Vec<&str> = REQUIRED_HEADERS
            .iter()
            .copied()
            .filter(|name| !request.has_header(name))
            .collect();

        let mut invalid: Vec<(&str, String)> = Vec::new();
        if let Some(reason) = validate_request_uri(request) {
            invalid.push(("Request-URI", reason));
        }
        if let Some(reason) = validate_cseq(request) {
            invalid.push(("CSeq", reason));
        }
        if let Some(reason) = validate_max_forwards(request) {
            invalid.push(("Max-Forwards", reason));
        }
        if let Some(reason) = validate_content_length(request) {
            invalid.push(("Content-Length", reason));
        }

        if missing.is_empty() && invalid.is_empty() {
            return ValidationResult::valid();
        }

        let invalid: Vec<(&str, &str)> = invalid.iter().map(|(h, r)| (*h, r.as_str())).collect();
        let error = if invalid.is_empty() {
            self.generator.missing_headers(request, &missing)
        } else if missing.is_empty() {
            self.generator.invalid_headers(request, &invalid)
        } else {
            self.generator
                .bad_request(request, "Request failed basic structure validation", &missing, &invalid)
        };
        self.generator.reject(request, error)
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn applies_to(&self, request: &SipMessage) -> bool {
        request.is_request()
    }
}
