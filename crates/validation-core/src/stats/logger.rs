//! Error logging, counting and pattern detection
//!
//! Every `log_*` call does the same four things:
//!
//! 1. picks a severity from [`severity_for`] (some entries are suppressed)
//! 2. counts the error in the shared [`StatisticsStore`]
//! 3. appends a recent-error entry and bumps the current hour
//! 4. for parse errors, counts the categorized subtype and checks for a
//!    systematic pattern; for validation errors, counts per validator
//!
//! Suppressed entries are still counted.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, trace, warn, Level};

use crate::classify::{categorize_parse_error, ParseErrorCategory};
use crate::config::StatisticsConfig;
use crate::diagnostic::{DetailedValidationError, ErrorStatistics, ErrorType};
use crate::message::SipMessage;

use super::store::{DetailedStatistics, DetectedPattern, RecentError, StatisticsStore};

/// Status that suppresses validation/authentication log entries
const UNAUTHORIZED: u16 = 401;

/// Log level for an error, `None` when the entry is suppressed
///
/// Validation and authentication failures answered with 401 are not logged,
/// so credential-guessing traffic cannot flood the logs.
pub fn severity_for(error_type: ErrorType, status: Option<u16>) -> Option<Level> {
    match error_type {
        ErrorType::ParseError => Some(Level::WARN),
        ErrorType::ValidationError if status == Some(UNAUTHORIZED) => None,
        ErrorType::ValidationError => Some(Level::INFO),
        ErrorType::ProcessingError => Some(Level::ERROR),
        ErrorType::TransportError => Some(Level::ERROR),
        ErrorType::AuthenticationError if status == Some(UNAUTHORIZED) => None,
        ErrorType::AuthenticationError => Some(Level::WARN),
        ErrorType::SessionTimerError => Some(Level::WARN),
    }
}

#[derive(Debug)]
pub struct ErrorLogger {
    store: Arc<StatisticsStore>,
    pattern_threshold: u64,
}

impl ErrorLogger {
    /// `pattern_threshold` of zero disables pattern detection
    pub fn new(store: Arc<StatisticsStore>, pattern_threshold: u64) -> Self {
        Self {
            store,
            pattern_threshold,
        }
    }

    pub fn from_config(config: &StatisticsConfig) -> Self {
        Self::new(
            Arc::new(StatisticsStore::new(config.recent_error_capacity)),
            config.pattern_threshold,
        )
    }

    pub fn store(&self) -> &Arc<StatisticsStore> {
        &self.store
    }

    pub fn pattern_threshold(&self) -> u64 {
        self.pattern_threshold
    }

    /// Log a parser failure; returns its category
    pub fn log_parse_error(&self, message: &str, raw_len: Option<usize>) -> ParseErrorCategory {
        let category = categorize_parse_error(message);
        let summary = format!("{}: {}", category, message);
        emit(
            ErrorType::ParseError,
            Some(400),
            &format!("{} (raw length: {})", summary, raw_len.map_or("unknown".to_string(), |l| l.to_string())),
        );

        let outcome = self.store.record_with_patterns(
            self.entry(
                ErrorType::ParseError,
                summary,
                Some(400),
                Some(category.as_str().to_string()),
            ),
            self.pattern_threshold,
        );
        if let Some(pattern) = outcome.pattern {
            warn!(
                category = %pattern.category,
                count = pattern.count,
                threshold = self.pattern_threshold,
                "Systematic parse issue detected: {} errors of category {}",
                pattern.count,
                pattern.category
            );
        }
        category
    }

    /// Log a rejected request, attributed to the validator that rejected it
    pub fn log_validation_error(&self, error: &DetailedValidationError, request: Option<&SipMessage>) {
        let status = Some(error.code());
        let summary = format!(
            "{} rejected {} with {} {}: {}",
            error.validator_name(),
            describe(request),
            error.code(),
            error.reason(),
            error.details()
        );
        if severity_for(ErrorType::ValidationError, status).is_some() {
            info!(
                error_type = %ErrorType::ValidationError,
                validator = error.validator_name(),
                status = error.code(),
                missing = ?error.missing_headers(),
                invalid = ?error.invalid_headers().keys().collect::<Vec<_>>(),
                "{}",
                summary
            );
        }

        self.store.record(self.entry(
            ErrorType::ValidationError,
            summary,
            status,
            Some(error.validator_name().to_string()),
        ));
    }

    pub fn log_processing_error(&self, message: &str, request: Option<&SipMessage>) {
        self.log_simple(ErrorType::ProcessingError, message, request, Some(500));
    }

    pub fn log_transport_error(&self, message: &str, peer: Option<&str>) {
        let summary = format!("transport failure with {}: {}", peer.unwrap_or("unknown peer"), message);
        emit(ErrorType::TransportError, None, &summary);
        self.store.record(self.entry(ErrorType::TransportError, summary, None, None));
    }

    /// `status` is the response sent for the failure, usually 401 or 403
    pub fn log_authentication_error(&self, message: &str, status: u16, request: Option<&SipMessage>) {
        self.log_simple(ErrorType::AuthenticationError, message, request, Some(status));
    }

    pub fn log_session_timer_error(&self, message: &str, request: Option<&SipMessage>) {
        self.log_simple(ErrorType::SessionTimerError, message, request, None);
    }

    fn log_simple(&self, error_type: ErrorType, message: &str, request: Option<&SipMessage>, status: Option<u16>) {
        let summary = format!("{} while handling {}: {}", error_type, describe(request), message);
        emit(error_type, status, &summary);
        self.store.record(self.entry(error_type, summary, status, None));
    }

    fn entry(&self, error_type: ErrorType, summary: String, status: Option<u16>, source: Option<String>) -> RecentError {
        RecentError {
            timestamp: Utc::now(),
            error_type,
            summary,
            status,
            source,
        }
    }

    /// Every pattern warning since the last reset, oldest first
    pub fn detected_patterns(&self) -> Vec<DetectedPattern> {
        self.store.detected_patterns()
    }

    /// One informational entry summarizing current totals
    pub fn log_error_summary(&self) {
        let statistics = self.store.statistics();
        let detailed = self.store.detailed();
        info!(
            total = statistics.total_errors(),
            parse = statistics.count(ErrorType::ParseError),
            validation = statistics.count(ErrorType::ValidationError),
            processing = statistics.count(ErrorType::ProcessingError),
            transport = statistics.count(ErrorType::TransportError),
            authentication = statistics.count(ErrorType::AuthenticationError),
            session_timer = statistics.count(ErrorType::SessionTimerError),
            peak_hour = detailed.peak_hour(),
            since = %statistics.last_reset(),
            "Error summary"
        );
    }

    pub fn reset_statistics(&self) {
        self.store.reset();
        debug!("Error statistics reset");
    }

    pub fn statistics(&self) -> ErrorStatistics {
        self.store.statistics()
    }

    pub fn detailed_statistics(&self) -> DetailedStatistics {
        self.store.detailed()
    }
}

fn describe(request: Option<&SipMessage>) -> String {
    match request {
        Some(request) => format!(
            "{} {} (Call-ID {})",
            request.method().map(|m| m.as_str()).unwrap_or("response"),
            request.request_uri().unwrap_or("-"),
            request.header("Call-ID").unwrap_or("-")
        ),
        None => "unparsed message".to_string(),
    }
}

fn emit(error_type: ErrorType, status: Option<u16>, message: &str) {
    let Some(level) = severity_for(error_type, status) else {
        trace!(error_type = %error_type, status, "Suppressed error log entry");
        return;
    };
    if level == Level::ERROR {
        error!(error_type = %error_type, status, "{}", message);
    } else if level == Level::WARN {
        warn!(error_type = %error_type, status, "{}", message);
    } else if level == Level::INFO {
        info!(error_type = %error_type, status, "{}", message);
    } else {
        debug!(error_type = %error_type, status, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticGenerator;
    use crate::message::Method;
    use tracing_test::traced_test;

    fn logger(threshold: u64) -> ErrorLogger {
        ErrorLogger::new(Arc::new(StatisticsStore::new(50)), threshold)
    }

    #[test]
    fn test_severity_policy() {
        assert_eq!(severity_for(ErrorType::ParseError, None), Some(Level::WARN));
        assert_eq!(severity_for(ErrorType::ValidationError, Some(400)), Some(Level::INFO));
        assert_eq!(severity_for(ErrorType::ValidationError, Some(401)), None);
        assert_eq!(severity_for(ErrorType::AuthenticationError, Some(401)), None);
        assert_eq!(severity_for(ErrorType::AuthenticationError, Some(403)), Some(Level::WARN));
        assert_eq!(severity_for(ErrorType::ProcessingError, Some(401)), Some(Level::ERROR));
        assert_eq!(severity_for(ErrorType::SessionTimerError, None), Some(Level::WARN));
    }

    #[test]
    fn test_parse_errors_are_categorized() {
        let logger = logger(10);
        assert_eq!(
            logger.log_parse_error("failed to parse start line: junk", Some(12)),
            ParseErrorCategory::StartLine
        );
        logger.log_parse_error("invalid Content-Length: x", None);

        let detailed = logger.detailed_statistics();
        assert_eq!(detailed.parse_error_types["start_line_error"], 1);
        assert_eq!(detailed.parse_error_types["content_length_error"], 1);
        assert_eq!(logger.statistics().count(ErrorType::ParseError), 2);
    }

    #[traced_test]
    #[test]
    fn test_pattern_warning_once_per_multiple() {
        let logger = logger(3);
        for _ in 0..7 {
            logger.log_parse_error("bad header line", None);
        }

        let patterns = logger.detected_patterns();
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].count, 3);
        assert_eq!(patterns[1].count, 6);
        assert_eq!(patterns[0].category, "header_error");
        assert!(logs_contain("Systematic parse issue detected"));
    }

    #[test]
    fn test_reset_rearms_patterns() {
        let logger = logger(2);
        logger.log_parse_error("bad header", None);
        logger.reset_statistics();
        logger.log_parse_error("bad header", None);
        assert!(logger.detected_patterns().is_empty());
        logger.log_parse_error("bad header", None);
        assert_eq!(logger.detected_patterns().len(), 1);
    }

    #[traced_test]
    #[test]
    fn test_validation_errors_counted_per_validator() {
        let logger = logger(10);
        let request = SipMessage::request(Method::Invite, "sip:bob@example.com").with_header("Call-ID", "v-1");
        let error = DiagnosticGenerator::new("session_timer").extension_required(&request, "timer");
        logger.log_validation_error(&error, Some(&request));

        let detailed = logger.detailed_statistics();
        assert_eq!(detailed.validation_errors_by_validator["session_timer"], 1);
        assert_eq!(detailed.recent_errors[0].status, Some(421));
        assert!(detailed.recent_errors[0].summary.contains("INVITE sip:bob@example.com"));
        assert!(logs_contain("session_timer rejected INVITE"));
    }

    #[traced_test]
    #[test]
    fn test_unauthorized_is_counted_but_not_logged() {
        let logger = logger(10);
        logger.log_authentication_error("digest mismatch for alice", 401, None);
        assert_eq!(logger.statistics().count(ErrorType::AuthenticationError), 1);
        assert!(!logs_contain("digest mismatch for alice"));

        logger.log_authentication_error("account locked for carol", 403, None);
        assert!(logs_contain("account locked for carol"));
    }

    #[traced_test]
    #[test]
    fn test_summary_and_other_types() {
        let logger = logger(10);
        logger.log_processing_error("database unavailable", None);
        logger.log_transport_error("connection reset", Some("192.0.2.1:5060"));
        logger.log_session_timer_error("refresh missed", None);
        logger.log_error_summary();

        assert_eq!(logger.statistics().total_errors(), 3);
        assert!(logs_contain("Error summary"));
        assert!(logs_contain("192.0.2.1:5060"));
    }
}
