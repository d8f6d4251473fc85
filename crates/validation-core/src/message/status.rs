//! # SIP Status Codes
//!
//! The subset of RFC 3261 / RFC 4028 status codes this crate produces, with
//! their canonical reason phrases. Responses built by the
//! [`ResponseBuilder`](crate::response::ResponseBuilder) must reproduce these
//! phrases verbatim, so they live in one place.

use std::fmt;

use serde::{Deserialize, Serialize};

/// SIP status codes produced by the validation and recovery pipeline
///
/// # Examples
///
/// ```rust
/// use rvoip_validation_core::message::StatusCode;
///
/// let status = StatusCode::SessionIntervalTooSmall;
/// assert_eq!(status.as_u16(), 422);
/// assert_eq!(status.reason_phrase(), "Session Interval Too Small");
///
/// assert_eq!(StatusCode::from_u16(405), StatusCode::MethodNotAllowed);
/// assert_eq!(StatusCode::from_u16(499), StatusCode::Custom(499));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", from = "u16")]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 401 Unauthorized
    Unauthorized,
    /// 403 Forbidden
    Forbidden,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 408 Request Timeout
    RequestTimeout,
    /// 420 Bad Extension
    BadExtension,
    /// 421 Extension Required
    ExtensionRequired,
    /// 422 Session Interval Too Small
    SessionIntervalTooSmall,
    /// 423 Interval Too Brief
    IntervalTooBrief,
    /// 500 Server Internal Error
    ServerInternalError,
    /// 501 Not Implemented
    NotImplemented,
    /// 503 Service Unavailable
    ServiceUnavailable,
    /// 505 Version Not Supported
    VersionNotSupported,
    /// Any other code
    Custom(u16),
}

impl StatusCode {
    /// Numeric value of the code
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::Unauthorized => 401,
            StatusCode::Forbidden => 403,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::RequestTimeout => 408,
            StatusCode::BadExtension => 420,
            StatusCode::ExtensionRequired => 421,
            StatusCode::SessionIntervalTooSmall => 422,
            StatusCode::IntervalTooBrief => 423,
            StatusCode::ServerInternalError => 500,
            StatusCode::NotImplemented => 501,
            StatusCode::ServiceUnavailable => 503,
            StatusCode::VersionNotSupported => 505,
            StatusCode::Custom(code) => *code,
        }
    }

    /// Map a numeric code to a known variant, or [`StatusCode::Custom`]
    pub fn from_u16(code: u16) -> Self {
        match code {
            200 => StatusCode::Ok,
            400 => StatusCode::BadRequest,
            401 => StatusCode::Unauthorized,
            403 => StatusCode::Forbidden,
            405 => StatusCode::MethodNotAllowed,
            408 => StatusCode::RequestTimeout,
            420 => StatusCode::BadExtension,
            421 => StatusCode::ExtensionRequired,
            422 => StatusCode::SessionIntervalTooSmall,
            423 => StatusCode::IntervalTooBrief,
            500 => StatusCode::ServerInternalError,
            501 => StatusCode::NotImplemented,
            503 => StatusCode::ServiceUnavailable,
            505 => StatusCode::VersionNotSupported,
            other => StatusCode::Custom(other),
        }
    }

    /// Canonical reason phrase; custom codes report "Unknown Error"
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::RequestTimeout => "Request Timeout",
            StatusCode::BadExtension => "Bad Extension",
            StatusCode::ExtensionRequired => "Extension Required",
            StatusCode::SessionIntervalTooSmall => "Session Interval Too Small",
            StatusCode::IntervalTooBrief => "Interval Too Brief",
            StatusCode::ServerInternalError => "Internal Server Error",
            StatusCode::NotImplemented => "Not Implemented",
            StatusCode::ServiceUnavailable => "Service Unavailable",
            StatusCode::VersionNotSupported => "Version Not Supported",
            StatusCode::Custom(_) => "Unknown Error",
        }
    }

    /// 4xx
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.as_u16())
    }

    /// 5xx
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.as_u16())
    }
}

impl From<StatusCode> for u16 {
    fn from(status: StatusCode) -> Self {
        status.as_u16()
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode::from_u16(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}
