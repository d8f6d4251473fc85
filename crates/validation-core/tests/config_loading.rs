//! Configuration loading tests

use std::path::PathBuf;
use std::time::Duration;

use pretty_assertions::assert_eq;

use rvoip_validation_core::config::PipelineConfig;
use rvoip_validation_core::diagnostic::ErrorType;
use rvoip_validation_core::error::PipelineError;
use rvoip_validation_core::message::{Method, SipMessage};
use rvoip_validation_core::pipeline::{PipelineOutcome, ValidationPipeline};

const SERVER_TOML: &str = r#"
supported_methods = ["INVITE", "ACK", "BYE", "CANCEL", "OPTIONS", "UPDATE"]

[session_timer]
min_se = 300
require_timer = true
default_session_expires = 1800

[statistics]
pattern_threshold = 5

[circuit_breakers.database]
max_failures = 2
timeout_ms = 1500

[retry_policies.processing]
max_attempts = 1
initial_delay_ms = 100
max_delay_ms = 400
backoff_factor = 2.0
retryable_errors = ["database"]

[monitor.thresholds.parse_error]
threshold = 20
window_ms = 60000
"#;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}-{}.toml", name, uuid::Uuid::new_v4()))
}

#[test]
fn test_load_from_file() {
    let path = temp_path("validation-config");
    std::fs::write(&path, SERVER_TOML).expect("write config");

    let config = PipelineConfig::from_file(&path).expect("load config");
    std::fs::remove_file(&path).ok();

    assert_eq!(config.session_timer.min_se, 300);
    assert!(config.session_timer.require_timer);
    assert_eq!(config.supported_methods.last(), Some(&Method::Update));
    assert_eq!(config.statistics.pattern_threshold, 5);
    assert_eq!(config.statistics.recent_error_capacity, 100);
    assert_eq!(config.circuit_breakers["database"].timeout, Duration::from_millis(1500));
    assert_eq!(config.retry_policy(ErrorType::ProcessingError).max_attempts, 1);
    // not named in the file, so the built-in policy applies
    assert_eq!(config.retry_policy(ErrorType::TransportError).max_attempts, 5);

    let thresholds = config.monitor_thresholds();
    assert_eq!(thresholds.len(), 1);
    assert_eq!(thresholds[0].0, ErrorType::ParseError);
    assert_eq!(thresholds[0].1.threshold, 20);
}

#[test]
fn test_missing_file_is_io_error() {
    let result = PipelineConfig::from_file(temp_path("does-not-exist"));
    assert!(matches!(result, Err(PipelineError::Io(_))));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let result = PipelineConfig::from_toml_str("[session_timer\nmin_se = 90");
    assert!(matches!(result, Err(PipelineError::ConfigParse(_))));
}

#[test]
fn test_semantic_errors_are_config_errors() {
    let below_rfc = PipelineConfig::from_toml_str("[session_timer]\nmin_se = 60\n");
    assert!(matches!(below_rfc, Err(PipelineError::Config(_))));

    let unknown_type = PipelineConfig::from_toml_str("[monitor.thresholds.billing]\nthreshold = 1\nwindow_ms = 0\n");
    assert!(matches!(unknown_type, Err(PipelineError::Config(_))));
}

#[test]
fn test_toml_round_trip_preserves_config() {
    let config = PipelineConfig::from_toml_str(SERVER_TOML).expect("parse");
    let rendered = config.to_toml_string().expect("render");
    assert_eq!(PipelineConfig::from_toml_str(&rendered).expect("reparse"), config);
}

#[test]
fn test_offered_session_interval_reaches_421() {
    let config = PipelineConfig::from_toml_str(
        "[session_timer]\nrequire_timer = true\ndefault_session_expires = 3600\n",
    )
    .expect("parse");
    let sent = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen = sent.clone();
    let pipeline = ValidationPipeline::new(config, move |response: SipMessage| seen.lock().push(response))
        .expect("pipeline");

    let request = SipMessage::request(Method::Invite, "sip:bob@example.com")
        .with_header("Via", "SIP/2.0/UDP host;branch=z9hG4bK11")
        .with_header("From", "<sip:alice@example.com>;tag=11")
        .with_header("To", "<sip:bob@example.com>")
        .with_header("Call-ID", "offered-interval")
        .with_header("CSeq", "11 INVITE");

    assert_eq!(
        pipeline.process_request(Some(&request)),
        PipelineOutcome::Rejected { status: 421 }
    );
    let sent = sent.lock();
    let body = String::from_utf8_lossy(sent[0].body()).to_string();
    assert!(body.contains("Session-Expires: 3600;refresher=uac"));
}

#[test]
fn test_loaded_policy_drives_pipeline() {
    let config = PipelineConfig::from_toml_str(SERVER_TOML).expect("parse");
    let pipeline = ValidationPipeline::new(config, |_: SipMessage| {}).expect("pipeline");

    let request = SipMessage::request(Method::Invite, "sip:bob@example.com")
        .with_header("Via", "SIP/2.0/UDP host;branch=z9hG4bK10")
        .with_header("From", "<sip:alice@example.com>;tag=10")
        .with_header("To", "<sip:bob@example.com>")
        .with_header("Call-ID", "configured")
        .with_header("CSeq", "10 INVITE")
        .with_header("Session-Expires", "120");

    // 120 is valid under RFC 4028 but below the configured 300
    assert_eq!(
        pipeline.process_request(Some(&request)),
        PipelineOutcome::Rejected { status: 422 }
    );
}
