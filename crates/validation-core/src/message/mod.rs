//! # SIP Message Model
//!
//! The structured message the validation pipeline consumes and produces.
//!
//! Parsing wire bytes into a [`SipMessage`] belongs to the parser layer; this
//! crate only reads and writes the start line, the ordered header list and the
//! body. Raw-byte inspection of messages that failed to parse lives in
//! [`crate::malformed`].
//!
//! ## Examples
//!
//! ```rust
//! use rvoip_validation_core::message::{Method, SipMessage, StatusCode};
//!
//! let request = SipMessage::request(Method::Options, "sip:bob@example.com")
//!     .with_header("Via", "SIP/2.0/UDP pc33.example.com;branch=z9hG4bK776asdhds")
//!     .with_header("Call-ID", "a84b4c76e66710")
//!     .with_header("CSeq", "1 OPTIONS");
//!
//! assert!(request.is_request());
//! assert_eq!(request.method(), Some(&Method::Options));
//! assert_eq!(request.header("call-id"), Some("a84b4c76e66710"));
//!
//! let response = SipMessage::response(StatusCode::BadRequest);
//! assert_eq!(response.status_code(), Some(400));
//! assert_eq!(response.reason_phrase(), Some("Bad Request"));
//! ```

pub mod headers;
pub mod method;
pub mod status;

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use headers::{Header, Headers};
pub use method::Method;
pub use status::StatusCode;

/// Protocol version token this stack speaks
pub const SIP_VERSION: &str = "SIP/2.0";

/// First line of a SIP message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartLine {
    Request {
        method: Method,
        uri: String,
        version: String,
    },
    Response {
        status: u16,
        reason: String,
        version: String,
    },
}

/// A SIP request or response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipMessage {
    start_line: StartLine,
    headers: Headers,
    #[serde(with = "body_bytes")]
    body: Bytes,
}

impl SipMessage {
    /// New SIP/2.0 request with no headers and an empty body
    pub fn request(method: Method, uri: impl Into<String>) -> Self {
        Self {
            start_line: StartLine::Request {
                method,
                uri: uri.into(),
                version: SIP_VERSION.to_string(),
            },
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// New SIP/2.0 response carrying the canonical reason phrase
    pub fn response(status: StatusCode) -> Self {
        Self::response_with_reason(status.as_u16(), status.reason_phrase())
    }

    /// New SIP/2.0 response with an explicit reason phrase
    pub fn response_with_reason(code: u16, reason: impl Into<String>) -> Self {
        Self {
            start_line: StartLine::Response {
                status: code,
                reason: reason.into(),
                version: SIP_VERSION.to_string(),
            },
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Builder-style header append
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Builder-style body replacement
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn start_line(&self) -> &StartLine {
        &self.start_line
    }

    pub fn is_request(&self) -> bool {
        matches!(self.start_line, StartLine::Request { .. })
    }

    pub fn is_response(&self) -> bool {
        matches!(self.start_line, StartLine::Response { .. })
    }

    /// Request method, `None` for responses
    pub fn method(&self) -> Option<&Method> {
        match &self.start_line {
            StartLine::Request { method, .. } => Some(method),
            StartLine::Response { .. } => None,
        }
    }

    /// Request-URI, `None` for responses
    pub fn request_uri(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Request { uri, .. } => Some(uri),
            StartLine::Response { .. } => None,
        }
    }

    /// Status code, `None` for requests
    pub fn status_code(&self) -> Option<u16> {
        match &self.start_line {
            StartLine::Response { status, .. } => Some(*status),
            StartLine::Request { .. } => None,
        }
    }

    /// Reason phrase, `None` for requests
    pub fn reason_phrase(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Response { reason, .. } => Some(reason),
            StartLine::Request { .. } => None,
        }
    }

    pub fn version(&self) -> &str {
        match &self.start_line {
            StartLine::Request { version, .. } | StartLine::Response { version, .. } => version,
        }
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// First value of a header (case-insensitive, compact-form aware)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.has(name)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.add(name, value);
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Serialize to wire format
    pub fn to_bytes(&self) -> Bytes {
        let mut out = Vec::with_capacity(256 + self.body.len());
        out.extend_from_slice(self.head_to_string().as_bytes());
        out.extend_from_slice(&self.body);
        Bytes::from(out)
    }

    fn head_to_string(&self) -> String {
        let mut head = match &self.start_line {
            StartLine::Request { method, uri, version } => format!("{} {} {}\r\n", method, uri, version),
            StartLine::Response { status, reason, version } => format!("{} {} {}\r\n", version, status, reason),
        };
        for header in &self.headers {
            head.push_str(&header.name);
            head.push_str(": ");
            head.push_str(&header.value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");
        head
    }
}

impl fmt::Display for SipMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.head_to_string())?;
        f.write_str(&String::from_utf8_lossy(&self.body))
    }
}

mod body_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(body)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let raw: Vec<u8> = Deserialize::deserialize(deserializer)?;
        Ok(Bytes::from(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = SipMessage::request(Method::Invite, "sip:bob@example.com")
            .with_header("Call-ID", "x1")
            .with_header("Content-Length", "4")
            .with_body("v=0\n");

        let wire = request.to_string();
        assert!(wire.starts_with("INVITE sip:bob@example.com SIP/2.0\r\n"));
        assert!(wire.contains("Call-ID: x1\r\n"));
        assert!(wire.ends_with("\r\n\r\nv=0\n"));
        assert_eq!(request.to_bytes().len(), wire.len());
    }

    #[test]
    fn test_response_accessors() {
        let response = SipMessage::response_with_reason(599, "Whatever");
        assert!(response.is_response());
        assert_eq!(response.method(), None);
        assert_eq!(response.request_uri(), None);
        assert_eq!(response.status_code(), Some(599));
        assert_eq!(response.reason_phrase(), Some("Whatever"));
        assert_eq!(response.version(), "SIP/2.0");
        assert!(response.to_string().starts_with("SIP/2.0 599 Whatever\r\n"));
    }

    #[test]
    fn test_set_header_overwrites() {
        let mut msg = SipMessage::response(StatusCode::Ok).with_header("Content-Length", "10");
        msg.set_header("content-length", "0");
        assert_eq!(msg.headers().get_all("Content-Length"), vec!["0"]);
    }
}
