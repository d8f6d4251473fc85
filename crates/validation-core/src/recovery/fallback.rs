//! Last-resort responders

use crate::diagnostic::ErrorType;
use crate::message::{SipMessage, StatusCode};
use crate::response::ResponseBuilder;

/// Minimal response per error type, or none at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackHandler {
    /// Answer with a bare status
    Respond(StatusCode),
    /// Leave the response to the component that owns the failure
    Decline,
}

impl FallbackHandler {
    pub fn for_error_type(error_type: ErrorType) -> Self {
        match error_type {
            ErrorType::ParseError | ErrorType::ValidationError => FallbackHandler::Respond(StatusCode::BadRequest),
            ErrorType::ProcessingError => FallbackHandler::Respond(StatusCode::ServerInternalError),
            ErrorType::TransportError => FallbackHandler::Respond(StatusCode::ServiceUnavailable),
            // auth challenges and timer negotiation carry their own responses
            ErrorType::AuthenticationError | ErrorType::SessionTimerError => FallbackHandler::Decline,
        }
    }

    /// Empty-bodied response with Content-Length 0, `None` when declining
    pub fn respond(&self, request: Option<&SipMessage>, builder: &ResponseBuilder) -> Option<SipMessage> {
        match self {
            FallbackHandler::Respond(status) => Some(builder.build_status(request, *status)),
            FallbackHandler::Decline => None,
        }
    }
}
