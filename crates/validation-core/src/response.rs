//! # Response Builder
//!
//! Turns a [`DetailedValidationError`] (or a bare status) into a wire-ready
//! SIP response.
//!
//! Every response copies the RFC 3261 §8.2.6.2 correlation headers from the
//! request (all Via values in order, From, To, Call-ID, CSeq), adds a To tag
//! when the request had none, and carries a Content-Length matching the body.
//! Class-specific headers are derived from the diagnostic:
//!
//! | Code | Extra headers |
//! |------|---------------|
//! | 400  | `X-Validation-Error` summarizing missing/invalid headers |
//! | 405  | `Allow` with the supported methods |
//! | 421  | `Require` and `Supported` naming the extension |
//! | 422  | `Min-SE` |
//! | 423  | `Min-Expires` |
//!
//! Codes without a template render with the 500 template, keeping the real
//! code on the status line and "Unknown Error" as the reason.
//!
//! ```rust
//! use rvoip_validation_core::diagnostic::DiagnosticGenerator;
//! use rvoip_validation_core::message::{Method, SipMessage};
//!
//! let request = SipMessage::request(Method::Invite, "sip:bob@example.com")
//!     .with_header("Call-ID", "abc");
//! let generator = DiagnosticGenerator::new("session_timer");
//! let response = generator.interval_too_brief_response(&request, 90, 30);
//!
//! assert_eq!(response.status_code(), Some(422));
//! assert_eq!(response.header("Min-SE"), Some("90"));
//! assert_eq!(response.header("Call-ID"), Some("abc"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::diagnostic::DetailedValidationError;
use crate::message::{SipMessage, StatusCode};

/// Headers copied from the request into every response
pub const CORRELATION_HEADERS: [&str; 5] = ["Via", "From", "To", "Call-ID", "CSeq"];

/// Name of the diagnostic summary header added to 400 responses
pub const DIAGNOSTIC_HEADER: &str = "X-Validation-Error";

/// Static parts of a response for one status code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTemplate {
    /// Reason phrase for the status line
    pub reason: String,
    /// Headers added verbatim
    pub headers: Vec<(String, String)>,
    /// Leading body text; empty means no body
    pub body: String,
}

impl ResponseTemplate {
    pub fn new(reason: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

fn default_templates() -> HashMap<u16, ResponseTemplate> {
    let mut templates = HashMap::new();
    let mut add = |status: StatusCode, body: &str| {
        templates.insert(status.as_u16(), ResponseTemplate::new(status.reason_phrase(), body));
    };

    add(StatusCode::BadRequest, "The request could not be understood due to malformed syntax.");
    add(StatusCode::Unauthorized, "");
    add(StatusCode::MethodNotAllowed, "The request method is not allowed for this server.");
    add(StatusCode::RequestTimeout, "");
    add(StatusCode::ExtensionRequired, "The server requires an extension the request did not declare.");
    add(StatusCode::SessionIntervalTooSmall, "The requested session interval is below the minimum this server accepts.");
    add(StatusCode::IntervalTooBrief, "The requested registration interval is below the minimum this server accepts.");
    add(StatusCode::ServerInternalError, "");
    add(StatusCode::ServiceUnavailable, "");

    templates
}

/// Builds responses from templates and diagnostics
///
/// Cloning is cheap; the template table is shared.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    templates: Arc<HashMap<u16, ResponseTemplate>>,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuilder {
    /// Builder with the stock templates
    pub fn new() -> Self {
        Self {
            templates: Arc::new(default_templates()),
        }
    }

    /// Replace or add the template for `code`
    pub fn with_template(mut self, code: u16, template: ResponseTemplate) -> Self {
        Arc::make_mut(&mut self.templates).insert(code, template);
        self
    }

    /// Template for `code`, `None` if the 500 fallback would be used
    pub fn template(&self, code: u16) -> Option<&ResponseTemplate> {
        self.templates.get(&code)
    }

    /// Resolve the template and status-line reason for `code`
    fn resolve(&self, code: u16) -> (ResponseTemplate, String) {
        match self.templates.get(&code) {
            Some(template) => (template.clone(), template.reason.clone()),
            None => {
                let fallback = self
                    .templates
                    .get(&StatusCode::ServerInternalError.as_u16())
                    .cloned()
                    .unwrap_or_else(|| ResponseTemplate::new(StatusCode::ServerInternalError.reason_phrase(), ""));
                (fallback, StatusCode::Custom(code).reason_phrase().to_string())
            }
        }
    }

    /// Full diagnostic response for a rejected request
    pub fn build(&self, request: Option<&SipMessage>, error: &DetailedValidationError) -> SipMessage {
        let code = error.code();
        let (template, reason) = self.resolve(code);

        let mut response = SipMessage::response_with_reason(code, reason);
        if let Some(request) = request {
            copy_correlation_headers(request, &mut response);
        }
        for (name, value) in &template.headers {
            response.add_header(name.clone(), value.clone());
        }
        add_class_headers(&mut response, error);

        // 5xx bodies never carry internal detail
        let body = if code >= 500 {
            template.body.clone()
        } else {
            render_body(&template.body, error)
        };
        finish_body(&mut response, body);
        response
    }

    /// Minimal response with no diagnostic body
    pub fn build_status(&self, request: Option<&SipMessage>, status: StatusCode) -> SipMessage {
        let code = status.as_u16();
        let (template, reason) = self.resolve(code);

        let mut response = SipMessage::response_with_reason(code, reason);
        if let Some(request) = request {
            copy_correlation_headers(request, &mut response);
        }
        for (name, value) in &template.headers {
            response.add_header(name.clone(), value.clone());
        }
        finish_body(&mut response, String::new());
        response
    }
}

/// Copy Via/From/To/Call-ID/CSeq from `request` into `response`
///
/// All Via values are copied in order. A To header without a tag gets one.
pub fn copy_correlation_headers(request: &SipMessage, response: &mut SipMessage) {
    for name in CORRELATION_HEADERS {
        for value in request.headers().get_all(name) {
            if name == "To" && !has_tag(value) {
                response.add_header(name, format!("{};tag={}", value, generate_tag()));
            } else {
                response.add_header(name, value);
            }
        }
    }
}

fn has_tag(value: &str) -> bool {
    // params after the closing '>' when the URI is bracketed
    let params = value.rsplit_once('>').map(|(_, p)| p).unwrap_or(value);
    params
        .split(';')
        .skip(1)
        .any(|p| p.trim().to_ascii_lowercase().starts_with("tag="))
}

fn generate_tag() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..10].to_string()
}

fn add_class_headers(response: &mut SipMessage, error: &DetailedValidationError) {
    match StatusCode::from_u16(error.code()) {
        StatusCode::BadRequest => {
            if let Some(summary) = diagnostic_summary(error) {
                response.set_header(DIAGNOSTIC_HEADER, summary);
            }
        }
        StatusCode::MethodNotAllowed => {
            let allowed = match error.context().get("allowed_methods") {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                _ => String::new(),
            };
            response.set_header("Allow", allowed);
        }
        StatusCode::ExtensionRequired => {
            let extension = error.context_str("extension").unwrap_or("timer").to_string();
            response.set_header("Require", extension.clone());
            response.set_header("Supported", extension);
        }
        StatusCode::SessionIntervalTooSmall => {
            if let Some(min_se) = error.context_u64("min_se") {
                response.set_header("Min-SE", min_se.to_string());
            }
        }
        StatusCode::IntervalTooBrief => {
            if let Some(min_expires) = error.context_u64("min_expires") {
                response.set_header("Min-Expires", min_expires.to_string());
            }
        }
        _ => {}
    }
}

/// `Missing: Via, From; Invalid: CSeq` style summary, `None` when nothing to report
pub fn diagnostic_summary(error: &DetailedValidationError) -> Option<String> {
    let mut parts = Vec::new();
    if !error.missing_headers().is_empty() {
        parts.push(format!("Missing: {}", error.missing_headers().join(", ")));
    }
    if !error.invalid_headers().is_empty() {
        let names = error.invalid_headers().keys().cloned().collect::<Vec<_>>();
        parts.push(format!("Invalid: {}", names.join(", ")));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

fn render_body(template: &str, error: &DetailedValidationError) -> String {
    let mut sections = Vec::new();
    if !template.is_empty() {
        sections.push(template.to_string());
    }
    if !error.details().is_empty() {
        sections.push(error.details().to_string());
    }
    if !error.suggestions().is_empty() {
        let bullets = error
            .suggestions()
            .iter()
            .map(|s| format!("- {}", s))
            .collect::<Vec<_>>()
            .join("\r\n");
        sections.push(format!("Suggestions:\r\n{}", bullets));
    }
    if sections.is_empty() {
        String::new()
    } else {
        let mut body = sections.join("\r\n\r\n");
        body.push_str("\r\n");
        body
    }
}

fn finish_body(response: &mut SipMessage, body: String) {
    if !body.is_empty() {
        response.set_header("Content-Type", "text/plain");
    }
    response.set_header("Content-Length", body.len().to_string());
    response.set_body(body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::ErrorType;
    use crate::message::Method;

    fn request() -> SipMessage {
        SipMessage::request(Method::Invite, "sip:bob@example.com")
            .with_header("Via", "SIP/2.0/UDP a.example.com;branch=z9hG4bK1")
            .with_header("Via", "SIP/2.0/UDP b.example.com;branch=z9hG4bK2")
            .with_header("From", "<sip:alice@example.com>;tag=88")
            .with_header("To", "<sip:bob@example.com>")
            .with_header("Call-ID", "cid-1")
            .with_header("CSeq", "7 INVITE")
            .with_header("Max-Forwards", "70")
    }

    #[test]
    fn test_correlation_headers_copied_in_order() {
        let builder = ResponseBuilder::new();
        let response = builder.build_status(Some(&request()), StatusCode::ServiceUnavailable);

        assert_eq!(
            response.headers().get_all("Via"),
            vec![
                "SIP/2.0/UDP a.example.com;branch=z9hG4bK1",
                "SIP/2.0/UDP b.example.com;branch=z9hG4bK2"
            ]
        );
        assert_eq!(response.header("Call-ID"), Some("cid-1"));
        assert_eq!(response.header("CSeq"), Some("7 INVITE"));
        assert!(response.header("To").unwrap().starts_with("<sip:bob@example.com>;tag="));
        assert!(!response.has_header("Max-Forwards"));
        assert_eq!(response.header("Content-Length"), Some("0"));
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_existing_to_tag_is_preserved() {
        let req = SipMessage::request(Method::Bye, "sip:bob@example.com").with_header("To", "<sip:bob@example.com>;tag=xyz");
        let mut response = SipMessage::response(StatusCode::Ok);
        copy_correlation_headers(&req, &mut response);
        assert_eq!(response.header("To"), Some("<sip:bob@example.com>;tag=xyz"));
    }

    #[test]
    fn test_unknown_code_falls_back_to_500_template() {
        let builder = ResponseBuilder::new();
        let err = DetailedValidationError::new("custom", 499, "weird", ErrorType::ValidationError)
            .with_details("secret internals");
        let response = builder.build(None, &err);

        assert_eq!(response.status_code(), Some(499));
        assert_eq!(response.reason_phrase(), Some("Unknown Error"));
    }

    #[test]
    fn test_server_errors_stay_terse() {
        let builder = ResponseBuilder::new();
        let mut err = DetailedValidationError::new("core", 500, "Internal Server Error", ErrorType::ProcessingError)
            .with_details("db password rejected");
        err.push_suggestion("should not leak");
        let response = builder.build(None, &err);

        assert!(response.body().is_empty());
        assert_eq!(response.header("Content-Length"), Some("0"));
    }

    #[test]
    fn test_body_contains_details_and_bullets() {
        let builder = ResponseBuilder::new();
        let mut err = DetailedValidationError::new("basic", 400, "Bad Request", ErrorType::ValidationError)
            .with_details("Missing required headers: Via");
        err.push_missing("Via");
        err.push_invalid("CSeq", "not a number");
        err.push_suggestion("Add a Via header");
        let response = builder.build(Some(&request()), &err);

        let body = String::from_utf8_lossy(response.body()).to_string();
        assert!(body.starts_with("The request could not be understood"));
        assert!(body.contains("Missing required headers: Via"));
        assert!(body.contains("Suggestions:\r\n- Add a Via header"));
        assert_eq!(response.header("Content-Length"), Some(body.len().to_string().as_str()));
        assert_eq!(response.header("Content-Type"), Some("text/plain"));
        assert_eq!(response.header(DIAGNOSTIC_HEADER), Some("Missing: Via; Invalid: CSeq"));
    }

    #[test]
    fn test_custom_template_headers() {
        let builder = ResponseBuilder::new().with_template(
            503,
            ResponseTemplate::new("Service Unavailable", "").with_header("Retry-After", "30"),
        );
        let response = builder.build_status(None, StatusCode::ServiceUnavailable);
        assert_eq!(response.header("Retry-After"), Some("30"));
    }
}
