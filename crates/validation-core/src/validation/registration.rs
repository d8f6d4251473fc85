//! REGISTER-specific rules (RFC 3261 §10.3)

use crate::diagnostic::{DiagnosticGenerator, ValidationResult};
use crate::message::{Method, SipMessage};
use crate::response::ResponseBuilder;

use super::headers::{contact_expires_param, uri_user_part};
use super::Validator;

#[derive(Debug, Clone)]
pub struct RegistrationValidator {
    min_expires: u32,
    max_contacts: usize,
    generator: DiagnosticGenerator,
}

impl Default for RegistrationValidator {
    fn default() -> Self {
        Self::new(60, 10)
    }
}

impl RegistrationValidator {
    pub const NAME: &'static str = "registration";
    pub const PRIORITY: i32 = 40;

    pub fn new(min_expires: u32, max_contacts: usize) -> Self {
        Self {
            min_expires,
            max_contacts,
            generator: DiagnosticGenerator::new(Self::NAME),
        }
    }

    pub fn with_builder(mut self, builder: ResponseBuilder) -> Self {
        self.generator = DiagnosticGenerator::with_builder(Self::NAME, builder);
        self
    }

    fn invalid(&self, request: &SipMessage, header: &str, reason: &str) -> ValidationResult {
        let error = self.generator.invalid_headers(request, &[(header, reason)]);
        self.generator.reject(request, error)
    }
}

impl Validator for RegistrationValidator {
    fn validate(&self, request: &SipMessage) -> ValidationResult {
        if let Some(user) = request.request_uri().and_then(uri_user_part) {
            let reason = format!("REGISTER Request-URI must not contain a user part ('{}')", user);
            return self.invalid(request, "Request-URI", &reason);
        }

        let expires = match request.header("Expires").map(|v| v.trim().parse::<u32>()) {
            Some(Ok(value)) => Some(value),
            Some(Err(_)) => {
                return self.invalid(request, "Expires", "Expires must be a non-negative integer");
            }
            None => None,
        };

        let contacts = request.headers().list_values("Contact");
        let wildcard = contacts.iter().any(|c| c.trim() == "*");
        if wildcard {
            if contacts.len() != 1 {
                return self.invalid(request, "Contact", "Contact '*' must be the only Contact value");
            }
            if expires != Some(0) {
                return self.invalid(request, "Contact", "Contact '*' requires 'Expires: 0'");
            }
            return ValidationResult::valid();
        }

        if contacts.len() > self.max_contacts {
            let reason = format!(
                "{} Contact values exceed the limit of {}",
                contacts.len(),
                self.max_contacts
            );
            return self.invalid(request, "Contact", &reason);
        }

        // per-contact expires overrides the Expires header
        let mut shortest: Option<u32> = None;
        for contact in &contacts {
            let requested = match contact_expires_param(contact) {
                Ok(param) => param.or(expires),
                Err(reason) => return self.invalid(request, "Contact", &reason),
            };
            if let Some(value) = requested.filter(|v| *v > 0) {
                shortest = Some(shortest.map_or(value, |s| s.min(value)));
            }
        }
        if contacts.is_empty() {
            shortest = expires.filter(|v| *v > 0);
        }

        match shortest {
            Some(requested) if requested < self.min_expires => {
                let error = self
                    .generator
                    .registration_interval_too_brief(request, self.min_expires, requested);
                self.generator.reject(request, error)
            }
            _ => ValidationResult::valid(),
        }
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn applies_to(&self, request: &SipMessage) -> bool {
        request.method() == Some(&Method::Register)
    }
}
