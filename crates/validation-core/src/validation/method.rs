//! Method support check

use crate::diagnostic::{DiagnosticGenerator, ValidationResult};
use crate::message::{Method, SipMessage};
use crate::response::ResponseBuilder;

use super::Validator;

/// Rejects methods outside the configured set with 405 and an Allow header
#[derive(Debug, Clone)]
pub struct MethodValidator {
    supported: Vec<Method>,
    generator: DiagnosticGenerator,
}

impl MethodValidator {
    pub const NAME: &'static str = "method";
    pub const PRIORITY: i32 = 20;

    pub fn new(supported: Vec<Method>) -> Self {
        Self {
            supported,
            generator: DiagnosticGenerator::new(Self::NAME),
        }
    }

    pub fn with_builder(mut self, builder: ResponseBuilder) -> Self {
        self.generator = DiagnosticGenerator::with_builder(Self::NAME, builder);
        self
    }

    pub fn supported(&self) -> &[Method] {
        &self.supported
    }
}

impl Validator for MethodValidator {
    fn validate(&self, request: &SipMessage) -> ValidationResult {
        match request.method() {
            Some(method) if self.supported.contains(method) => ValidationResult::valid(),
            _ => {
                let error = self.generator.method_not_allowed(request, &self.supported);
                self.generator.reject(request, error)
            }
        }
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
