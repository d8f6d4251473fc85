//! RFC 4028 session-timer negotiation checks for INVITE and UPDATE
//!
//! | Request | Outcome |
//! |---------|---------|
//! | Session-Expires or Min-SE unparsable | 400 |
//! | Session-Expires below max(policy min, request Min-SE, 90) | 422 with `Min-SE` |
//! | `Require: timer` without Session-Expires | 400 |
//! | no Session-Expires while policy mandates timers | 421 with `Require: timer` |

use tracing::trace;

use crate::diagnostic::{DiagnosticGenerator, ValidationResult};
use crate::diagnostic::suggestions::DEFAULT_SESSION_EXPIRES;
use crate::message::SipMessage;
use crate::response::ResponseBuilder;

use super::headers::{has_option_tag, is_session_timer_method, parse_min_se, parse_session_expires, RFC4028_MIN_SE};
use super::Validator;

/// Option tag for session timers
pub const TIMER_OPTION_TAG: &str = "timer";

#[derive(Debug, Clone)]
pub struct SessionTimerValidator {
    min_se: u32,
    require_timer: bool,
    session_expires: u32,
    generator: DiagnosticGenerator,
}

impl Default for SessionTimerValidator {
    fn default() -> Self {
        Self::new(RFC4028_MIN_SE, false)
    }
}

impl SessionTimerValidator {
    pub const NAME: &'static str = "session_timer";
    pub const PRIORITY: i32 = 30;

    /// `min_se` below 90 is raised to 90
    pub fn new(min_se: u32, require_timer: bool) -> Self {
        Self {
            min_se: min_se.max(RFC4028_MIN_SE),
            require_timer,
            session_expires: DEFAULT_SESSION_EXPIRES,
            generator: DiagnosticGenerator::new(Self::NAME),
        }
    }

    pub fn with_builder(mut self, builder: ResponseBuilder) -> Self {
        self.generator =
            DiagnosticGenerator::with_builder(Self::NAME, builder).with_session_expires(self.session_expires);
        self
    }

    /// Interval suggested in the 421 sent when a mandated timer is absent
    pub fn with_session_expires(mut self, seconds: u32) -> Self {
        self.session_expires = seconds;
        self.generator = self.generator.with_session_expires(seconds);
        self
    }

    pub fn session_expires(&self) -> u32 {
        self.session_expires
    }

    pub fn min_se(&self) -> u32 {
        self.min_se
    }

    pub fn require_timer(&self) -> bool {
        self.require_timer
    }
}

impl Validator for SessionTimerValidator {
    fn validate(&self, request: &SipMessage) -> ValidationResult {
        let request_min_se = match request.header("Min-SE").map(parse_min_se) {
            Some(Ok(value)) => Some(value),
            Some(Err(reason)) => {
                let error = self.generator.invalid_headers(request, &[("Min-SE", reason.as_str())]);
                return self.generator.reject(request, error);
            }
            None => None,
        };

        let Some(raw) = request.header("Session-Expires") else {
            if self.require_timer {
                let error = self.generator.extension_required(request, TIMER_OPTION_TAG);
                return self.generator.reject(request, error);
            }
            if has_option_tag(request, "Require", TIMER_OPTION_TAG) {
                let error = self.generator.bad_request(
                    request,
                    "Require: timer was sent without a Session-Expires header",
                    &["Session-Expires"],
                    &[],
                );
                return self.generator.reject(request, error);
            }
            return ValidationResult::valid();
        };

        let session_expires = match parse_session_expires(raw) {
            Ok(parsed) => parsed,
            Err(reason) => {
                let error = self
                    .generator
                    .invalid_headers(request, &[("Session-Expires", reason.as_str())]);
                return self.generator.reject(request, error);
            }
        };

        let effective_min = request_min_se.map_or(self.min_se, |m| m.max(self.min_se));
        trace!(
            requested = session_expires.delta_seconds,
            min_se = effective_min,
            "Checking session interval"
        );
        if session_expires.delta_seconds < effective_min {
            let error = self
                .generator
                .interval_too_brief(request, effective_min, session_expires.delta_seconds);
            return self.generator.reject(request, error);
        }

        ValidationResult::valid()
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn applies_to(&self, request: &SipMessage) -> bool {
        request.method().is_some_and(is_session_timer_method)
    }
}
