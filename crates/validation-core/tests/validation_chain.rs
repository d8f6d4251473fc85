//! Validation chain tests
//!
//! Ordering and short-circuit behaviour of the chain, plus the standard
//! validators working together on realistic requests.

use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use rvoip_validation_core::config::PipelineConfig;
use rvoip_validation_core::diagnostic::{DiagnosticGenerator, ValidationResult};
use rvoip_validation_core::message::{Method, SipMessage};
use rvoip_validation_core::response::ResponseBuilder;
use rvoip_validation_core::validation::{ValidationChain, Validator};

/// Records its invocation, then passes or fails as configured
struct Scripted {
    name: String,
    priority: i32,
    fails: bool,
    applies: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Scripted {
    fn new(name: &str, priority: i32, calls: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            priority,
            fails: false,
            applies: true,
            calls: calls.clone(),
        }
    }

    fn failing(mut self) -> Self {
        self.fails = true;
        self
    }

    fn not_applicable(mut self) -> Self {
        self.applies = false;
        self
    }
}

impl Validator for Scripted {
    fn validate(&self, request: &SipMessage) -> ValidationResult {
        self.calls.lock().push(self.name.clone());
        if !self.fails {
            return ValidationResult::valid();
        }
        let generator = DiagnosticGenerator::new(self.name.clone());
        let error = generator.bad_request(request, "scripted failure", &[], &[]);
        generator.reject(request, error)
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn applies_to(&self, _request: &SipMessage) -> bool {
        self.applies
    }
}

fn invite() -> SipMessage {
    SipMessage::request(Method::Invite, "sip:bob@biloxi.example.com")
        .with_header("Via", "SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK776asdhds")
        .with_header("Max-Forwards", "70")
        .with_header("From", "Alice <sip:alice@atlanta.example.com>;tag=1928301774")
        .with_header("To", "Bob <sip:bob@biloxi.example.com>")
        .with_header("Call-ID", "a84b4c76e66710@pc33.atlanta.example.com")
        .with_header("CSeq", "314159 INVITE")
        .with_header("Content-Length", "0")
}

#[test]
fn test_chain_runs_in_priority_order_and_stops_at_first_failure() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut chain = ValidationChain::new();
    chain.add_validator(Scripted::new("third", 30, &calls));
    chain.add_validator(Scripted::new("second", 20, &calls).failing());
    chain.add_validator(Scripted::new("first", 10, &calls));
    chain.add_validator(Scripted::new("never", 40, &calls).failing());

    let result = chain.validate(Some(&invite()));

    assert!(!result.is_valid());
    assert_eq!(result.error().map(|e| e.validator_name()), Some("second"));
    assert_eq!(*calls.lock(), vec!["first", "second"]);
}

#[test]
fn test_non_applicable_validators_are_skipped() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut chain = ValidationChain::new();
    chain.add_validator(Scripted::new("skipped", 1, &calls).failing().not_applicable());
    chain.add_validator(Scripted::new("runs", 2, &calls));

    assert!(chain.validate(Some(&invite())).is_valid());
    assert_eq!(*calls.lock(), vec!["runs"]);
}

#[test]
fn test_standard_chain_layout() {
    let chain = ValidationChain::from_config(&PipelineConfig::default(), &ResponseBuilder::new());
    assert_eq!(
        chain.names(),
        vec!["basic_structure", "method", "session_timer", "registration"]
    );
}

#[test]
fn test_compact_headers_are_accepted() {
    let chain = ValidationChain::from_config(&PipelineConfig::default(), &ResponseBuilder::new());
    let request = SipMessage::request(Method::Options, "sip:bob@biloxi.example.com")
        .with_header("v", "SIP/2.0/TCP client.example.com;branch=z9hG4bK1")
        .with_header("f", "<sip:alice@example.com>;tag=88")
        .with_header("t", "<sip:bob@biloxi.example.com>")
        .with_header("i", "compact-call")
        .with_header("CSeq", "7 OPTIONS")
        .with_header("l", "0");

    assert!(chain.validate(Some(&request)).is_valid());
}

#[test]
fn test_basic_structure_reports_everything_at_once() {
    let chain = ValidationChain::from_config(&PipelineConfig::default(), &ResponseBuilder::new());
    let request = SipMessage::request(Method::Invite, "sip:bob@biloxi.example.com")
        .with_header("Via", "SIP/2.0/UDP host;branch=z9hG4bK2")
        .with_header("CSeq", "1 BYE")
        .with_header("Content-Length", "12");

    let result = chain.validate(Some(&request));
    let error = result.error().expect("rejected");

    assert_eq!(error.code(), 400);
    assert_eq!(error.missing_headers(), ["From", "To", "Call-ID"]);
    let invalid: Vec<&String> = error.invalid_headers().keys().collect();
    assert_eq!(invalid, vec!["CSeq", "Content-Length"]);
    assert!(error.invalid_headers()["Content-Length"].contains("does not match actual body length"));
}

#[test]
fn test_unsupported_method_gets_allow_header() {
    let mut config = PipelineConfig::default();
    config.supported_methods = vec![Method::Invite, Method::Register, Method::Options];
    let chain = ValidationChain::from_config(&config, &ResponseBuilder::new());

    let request = SipMessage::request(Method::Publish, "sip:presence@example.com")
        .with_header("Via", "SIP/2.0/UDP host;branch=z9hG4bK3")
        .with_header("From", "<sip:alice@example.com>;tag=4")
        .with_header("To", "<sip:presence@example.com>")
        .with_header("Call-ID", "publish-1")
        .with_header("CSeq", "1 PUBLISH");

    let result = chain.validate(Some(&request));
    let response = result.response().expect("response");
    assert_eq!(response.status_code(), Some(405));
    assert_eq!(response.header("Allow"), Some("INVITE, REGISTER, OPTIONS"));
}

#[test]
fn test_register_interval_too_brief() {
    let chain = ValidationChain::from_config(&PipelineConfig::default(), &ResponseBuilder::new());
    let request = SipMessage::request(Method::Register, "sip:registrar.example.com")
        .with_header("Via", "SIP/2.0/UDP host;branch=z9hG4bK4")
        .with_header("From", "<sip:alice@example.com>;tag=5")
        .with_header("To", "<sip:alice@example.com>")
        .with_header("Call-ID", "reg-1")
        .with_header("CSeq", "1 REGISTER")
        .with_header("Contact", "<sip:alice@192.0.2.4>")
        .with_header("Expires", "30");

    let result = chain.validate(Some(&request));
    let response = result.response().expect("response");
    assert_eq!(response.status_code(), Some(423));
    assert_eq!(response.header("Min-Expires"), Some("60"));
}

#[test]
fn test_session_interval_too_small() {
    let chain = ValidationChain::from_config(&PipelineConfig::default(), &ResponseBuilder::new());
    let request = invite().with_header("Session-Expires", "30;refresher=uac");

    let result = chain.validate(Some(&request));
    let response = result.response().expect("response");
    assert_eq!(response.status_code(), Some(422));
    assert_eq!(response.reason_phrase(), Some("Session Interval Too Small"));
    assert_eq!(response.header("Min-SE"), Some("90"));
}

proptest! {
    #[test]
    fn prop_validators_run_in_non_decreasing_priority(priorities in prop::collection::vec(-50i32..50, 1..12)) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut chain = ValidationChain::new();
        for (index, priority) in priorities.iter().enumerate() {
            chain.add_validator(Scripted::new(&format!("{}:{}", priority, index), *priority, &calls));
        }

        prop_assert!(chain.validate(Some(&invite())).is_valid());

        let seen: Vec<(i32, usize)> = calls
            .lock()
            .iter()
            .map(|entry| {
                let (priority, index) = entry.split_once(':').unwrap();
                (priority.parse().unwrap(), index.parse().unwrap())
            })
            .collect();
        prop_assert_eq!(seen.len(), priorities.len());
        // equal priorities keep insertion order
        prop_assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }
}
