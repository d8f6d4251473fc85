//! # Malformed-Message Detector
//!
//! Inspects raw bytes independently of the structured parser, so a message
//! the parser rejected can still be answered with a precise 400.
//!
//! Checks run in a fixed order and every finding is kept:
//!
//! 1. Line endings: bare LF only, or a mix of LF and CRLF
//! 2. Start line: token count, then request-line or status-line rules
//! 3. Header lines up to the first empty line: `name: value` shape, plus value
//!    checks for Content-Length, CSeq, Max-Forwards and Via
//! 4. Encoding: the first NUL byte anywhere, the first non-ASCII byte in the
//!    header section
//!
//! ```rust
//! use rvoip_validation_core::malformed::{MalformedErrorKind, MalformedMessageDetector};
//!
//! let detector = MalformedMessageDetector::new();
//! let findings = detector.detect(b"INVITE sip:bob@example.com SIP/2.0\nVia: SIP/2.0/UDP h;branch=z9hG4bK1\n\n");
//! assert_eq!(findings[0].kind, MalformedErrorKind::LineEnding);
//! ```

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::diagnostic::{DetailedValidationError, ErrorType};
use crate::message::headers::expand_compact;
use crate::message::{Method, SipMessage, SIP_VERSION};
use crate::response::{ResponseBuilder, CORRELATION_HEADERS};

/// Validator name used on aggregated diagnostics
pub const DETECTOR_NAME: &str = "malformed_message_detector";

/// Defect class found in raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MalformedErrorKind {
    StartLine,
    Header,
    HeaderValue,
    Body,
    LineEnding,
    Encoding,
}

impl fmt::Display for MalformedErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MalformedErrorKind::StartLine => "StartLine",
            MalformedErrorKind::Header => "Header",
            MalformedErrorKind::HeaderValue => "HeaderValue",
            MalformedErrorKind::Body => "Body",
            MalformedErrorKind::LineEnding => "LineEnding",
            MalformedErrorKind::Encoding => "Encoding",
        };
        f.write_str(label)
    }
}

/// One defect found in a raw message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MalformedMessageError {
    pub kind: MalformedErrorKind,
    pub description: String,
    /// Human-readable position, e.g. `line 3` or `byte 17`
    pub location: String,
    pub suggestion: String,
    pub context: IndexMap<String, Value>,
}

impl MalformedMessageError {
    fn new(
        kind: MalformedErrorKind,
        description: impl Into<String>,
        location: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            location: location.into(),
            suggestion: suggestion.into(),
            context: IndexMap::new(),
        }
    }

    fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

impl fmt::Display for MalformedMessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.kind, self.description, self.location)
    }
}

/// A line of the raw message; `end` excludes the LF but includes any CR
struct RawLine<'a> {
    start: usize,
    end: usize,
    text: &'a [u8],
}

impl RawLine<'_> {
    fn as_str(&self) -> String {
        String::from_utf8_lossy(self.text).into_owned()
    }

    fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

fn split_lines(raw: &[u8]) -> Vec<RawLine<'_>> {
    let mut lines = Vec::new();
    let mut start = 0usize;
    for (idx, byte) in raw.iter().enumerate() {
        if *byte == b'\n' {
            lines.push(make_line(raw, start, idx));
            start = idx + 1;
        }
    }
    lines.push(make_line(raw, start, raw.len()));
    lines
}

fn make_line(raw: &[u8], start: usize, end: usize) -> RawLine<'_> {
    let mut text = &raw[start..end];
    if let Some(stripped) = text.strip_suffix(b"\r") {
        text = stripped;
    }
    RawLine { start, end, text }
}

/// Layout of the header section
struct Sections {
    /// Index of the terminating blank line, if any
    blank_line: Option<usize>,
    /// Byte offset where the header section ends
    header_end: usize,
    /// Byte offset where the body begins
    body_start: usize,
}

fn find_sections(raw: &[u8], lines: &[RawLine<'_>]) -> Sections {
    let blank_line = lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, line)| line.is_blank() && line.end < raw.len())
        .map(|(idx, _)| idx);

    match blank_line {
        Some(idx) => Sections {
            blank_line: Some(idx),
            header_end: lines[idx].start,
            body_start: (lines[idx].end + 1).min(raw.len()),
        },
        None => Sections {
            blank_line: None,
            header_end: raw.len(),
            body_start: raw.len(),
        },
    }
}

/// Raw-bytes defect scanner
#[derive(Debug, Clone)]
pub struct MalformedMessageDetector {
    request_methods: Vec<Method>,
    builder: ResponseBuilder,
}

impl Default for MalformedMessageDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MalformedMessageDetector {
    /// Detector accepting every standard method on request lines
    pub fn new() -> Self {
        Self {
            request_methods: Method::STANDARD.to_vec(),
            builder: ResponseBuilder::new(),
        }
    }

    /// Restrict the request-line method set
    pub fn with_request_methods(mut self, methods: Vec<Method>) -> Self {
        self.request_methods = methods;
        self
    }

    pub fn with_builder(mut self, builder: ResponseBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Scan `raw` and return every defect found, in check order
    pub fn detect(&self, raw: &[u8]) -> Vec<MalformedMessageError> {
        let mut findings = Vec::new();

        if raw.is_empty() {
            findings.push(MalformedMessageError::new(
                MalformedErrorKind::StartLine,
                "message is empty",
                "byte 0",
                "Send a complete SIP message",
            ));
            return findings;
        }

        let lines = split_lines(raw);
        let sections = find_sections(raw, &lines);

        self.check_line_endings(raw, &lines, &mut findings);
        let request_method = self.check_start_line(&lines[0], &mut findings);
        self.check_headers(raw, &lines, &sections, request_method.as_deref(), &mut findings);
        self.check_encoding(raw, &sections, &mut findings);

        debug!(defects = findings.len(), bytes = raw.len(), "Raw message scan finished");
        findings
    }

    fn check_line_endings(&self, raw: &[u8], lines: &[RawLine<'_>], findings: &mut Vec<MalformedMessageError>) {
        let lf_count = raw.iter().filter(|b| **b == b'\n').count();
        let crlf_count = raw.windows(2).filter(|w| w == b"\r\n").count();

        if lf_count == 0 {
            return;
        }

        // first line terminated by a bare LF
        let first_bare = lines
            .iter()
            .position(|l| l.end < raw.len() && !raw[l.start..l.end].ends_with(b"\r"))
            .map(|i| i + 1)
            .unwrap_or(1);

        if crlf_count == 0 {
            findings.push(
                MalformedMessageError::new(
                    MalformedErrorKind::LineEnding,
                    "lines are terminated by bare LF instead of CRLF",
                    format!("line {}", first_bare),
                    "Terminate every line with CRLF (\\r\\n) as required by RFC 3261",
                )
                .with_context("lf_count", lf_count),
            );
        } else if lf_count != crlf_count {
            findings.push(
                MalformedMessageError::new(
                    MalformedErrorKind::LineEnding,
                    "mixed line endings (LF and CRLF)",
                    format!("line {}", first_bare),
                    "Use CRLF consistently for every line",
                )
                .with_context("lf_count", lf_count)
                .with_context("crlf_count", crlf_count),
            );
        }
    }

    /// Returns the request method token when the start line is a request line
    fn check_start_line(&self, line: &RawLine<'_>, findings: &mut Vec<MalformedMessageError>) -> Option<String> {
        let text = line.as_str();
        let tokens: Vec<&str> = text.split_whitespace().collect();

        if tokens.is_empty() {
            findings.push(MalformedMessageError::new(
                MalformedErrorKind::StartLine,
                "start line is empty",
                "line 1",
                "Begin the message with a request line or a status line",
            ));
            return None;
        }
        if tokens.len() < 3 {
            findings.push(
                MalformedMessageError::new(
                    MalformedErrorKind::StartLine,
                    format!("start line has {} parts, expected at least 3", tokens.len()),
                    "line 1",
                    "Use 'METHOD sip:uri SIP/2.0' or 'SIP/2.0 CODE Reason'",
                )
                .with_context("start_line", text.clone()),
            );
            return None;
        }

        if tokens[0].to_ascii_uppercase().starts_with("SIP/") {
            self.check_status_line(&tokens, findings);
            None
        } else {
            self.check_request_line(&tokens, findings);
            Some(tokens[0].to_string())
        }
    }

    fn check_request_line(&self, tokens: &[&str], findings: &mut Vec<MalformedMessageError>) {
        let method = tokens[0];
        if !self.request_methods.iter().any(|m| m.as_str() == method) {
            findings.push(
                MalformedMessageError::new(
                    MalformedErrorKind::StartLine,
                    format!("unknown request method '{}'", method),
                    "line 1, method",
                    "Use an upper-case standard method such as INVITE, REGISTER or OPTIONS",
                )
                .with_context("method", method),
            );
        }

        let uri = tokens[1].to_ascii_lowercase();
        if !(uri.starts_with("sip:") || uri.starts_with("sips:")) {
            findings.push(
                MalformedMessageError::new(
                    MalformedErrorKind::StartLine,
                    format!("Request-URI '{}' does not use the sip: or sips: scheme", tokens[1]),
                    "line 1, Request-URI",
                    "Use a Request-URI of the form sip:user@host",
                )
                .with_context("request_uri", tokens[1]),
            );
        }

        let version = tokens[tokens.len() - 1];
        if tokens.len() > 3 {
            findings.push(MalformedMessageError::new(
                MalformedErrorKind::StartLine,
                "request line has more than 3 parts",
                "line 1",
                "Escape or remove whitespace inside the Request-URI",
            ));
        }
        if version != SIP_VERSION {
            findings.push(
                MalformedMessageError::new(
                    MalformedErrorKind::StartLine,
                    format!("unsupported protocol version '{}'", version),
                    "line 1, version",
                    "Use 'SIP/2.0' as the protocol version",
                )
                .with_context("version", version),
            );
        }
    }

    fn check_status_line(&self, tokens: &[&str], findings: &mut Vec<MalformedMessageError>) {
        if tokens[0] != SIP_VERSION {
            findings.push(
                MalformedMessageError::new(
                    MalformedErrorKind::StartLine,
                    format!("unsupported protocol version '{}'", tokens[0]),
                    "line 1, version",
                    "Use 'SIP/2.0' as the protocol version",
                )
                .with_context("version", tokens[0]),
            );
        }

        match tokens[1].parse::<u16>() {
            Ok(code) if (100..=699).contains(&code) => {}
            _ => findings.push(
                MalformedMessageError::new(
                    MalformedErrorKind::StartLine,
                    format!("invalid status code '{}'", tokens[1]),
                    "line 1, status code",
                    "Status codes are three-digit integers between 100 and 699",
                )
                .with_context("status_code", tokens[1]),
            ),
        }
    }

    fn check_headers(
        &self,
        raw: &[u8],
        lines: &[RawLine<'_>],
        sections: &Sections,
        request_method: Option<&str>,
        findings: &mut Vec<MalformedMessageError>,
    ) {
        let last = sections.blank_line.unwrap_or(lines.len());
        let body_len = raw.len() - sections.body_start;

        for (idx, line) in lines.iter().enumerate().take(last).skip(1) {
            let number = idx + 1;
            if line.text.is_empty() {
                // trailing segment of a message with no blank line
                continue;
            }
            if matches!(line.text.first(), Some(b' ') | Some(b'\t')) {
                continue;
            }

            let text = line.as_str();
            let Some((name, value)) = text.split_once(':') else {
                findings.push(
                    MalformedMessageError::new(
                        MalformedErrorKind::Header,
                        "header line is missing the ':' separator",
                        format!("line {}", number),
                        "Write headers as 'Name: value'",
                    )
                    .with_context("line", text.clone()),
                );
                continue;
            };

            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                findings.push(
                    MalformedMessageError::new(
                        MalformedErrorKind::Header,
                        format!("invalid header name '{}'", name),
                        format!("line {}", number),
                        "Header names are tokens without whitespace, followed directly by ':'",
                    )
                    .with_context("line", text.clone()),
                );
                continue;
            }

            self.check_header_value(name, value.trim(), number, body_len, request_method, findings);
        }

        if sections.blank_line.is_none() && lines.len() > 1 {
            findings.push(MalformedMessageError::new(
                MalformedErrorKind::Header,
                "header section is not terminated by an empty line",
                format!("line {}", lines.len()),
                "End the header section with an empty line (CRLF CRLF)",
            ));
        }
    }

    fn check_header_value(
        &self,
        name: &str,
        value: &str,
        line: usize,
        body_len: usize,
        request_method: Option<&str>,
        findings: &mut Vec<MalformedMessageError>,
    ) {
        let canonical = expand_compact(name).to_ascii_lowercase();
        let location = format!("line {}, header '{}'", line, name);
        let mut push = |description: String, suggestion: &str| {
            findings.push(
                MalformedMessageError::new(MalformedErrorKind::HeaderValue, description, location.clone(), suggestion)
                    .with_context("header", name)
                    .with_context("value", value),
            );
        };

        match canonical.as_str() {
            "content-length" => match value.parse::<usize>() {
                Ok(declared) if declared != body_len => push(
                    format!(
                        "Content-Length {} does not match actual body length {}",
                        declared, body_len
                    ),
                    "Set Content-Length to the exact number of bytes in the body",
                ),
                Ok(_) => {}
                Err(_) => push(
                    format!("Content-Length '{}' is not a non-negative integer", value),
                    "Content-Length must be a non-negative integer",
                ),
            },
            "cseq" => {
                let parts: Vec<&str> = value.split_whitespace().collect();
                if parts.len() != 2 || parts[0].parse::<u32>().is_err() {
                    push(
                        format!("CSeq '{}' must be '<sequence> <METHOD>'", value),
                        "Use 'CSeq: <number> <METHOD>', e.g. 'CSeq: 1 INVITE'",
                    );
                } else if let Some(method) = request_method {
                    if parts[1] != method {
                        push(
                            format!("CSeq method '{}' does not match request method '{}'", parts[1], method),
                            "The CSeq method must equal the request-line method",
                        );
                    }
                }
            }
            "max-forwards" => {
                if value.parse::<u8>().is_err() {
                    push(
                        format!("Max-Forwards '{}' is not an integer between 0 and 255", value),
                        "Set Max-Forwards to an integer between 0 and 255, typically 70",
                    );
                }
            }
            "via" => {
                if !value.to_ascii_uppercase().contains("SIP/2.0/") {
                    push(
                        format!("Via '{}' lacks the 'SIP/2.0/<transport>' protocol", value),
                        "Start the Via value with 'SIP/2.0/UDP', 'SIP/2.0/TCP' or similar",
                    );
                }
                if !value.to_ascii_lowercase().contains(";branch=") {
                    push(
                        format!("Via '{}' has no branch parameter", value),
                        "Add a ';branch=z9hG4bK...' parameter to the Via header",
                    );
                }
            }
            _ => {}
        }
    }

    fn check_encoding(&self, raw: &[u8], sections: &Sections, findings: &mut Vec<MalformedMessageError>) {
        if let Some(pos) = raw.iter().position(|b| *b == 0) {
            findings.push(
                MalformedMessageError::new(
                    MalformedErrorKind::Encoding,
                    "message contains a NUL byte",
                    format!("byte {}", pos),
                    "Remove NUL bytes; SIP messages are text",
                )
                .with_context("offset", pos),
            );
        }

        if let Some(pos) = raw[..sections.header_end].iter().position(|b| *b > 127) {
            findings.push(
                MalformedMessageError::new(
                    MalformedErrorKind::Encoding,
                    "header section contains a non-ASCII byte",
                    format!("byte {}", pos),
                    "Encode header values in ASCII; use percent-encoding or quoted strings for other characters",
                )
                .with_context("offset", pos)
                .with_context("byte", raw[pos]),
            );
        }
    }

    /// Aggregate findings into one 400 diagnostic, `None` if there are none
    pub fn to_validation_error(&self, findings: &[MalformedMessageError]) -> Option<DetailedValidationError> {
        if findings.is_empty() {
            return None;
        }

        let details = findings.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
        let mut error = DetailedValidationError::new(DETECTOR_NAME, 400, "Bad Request", ErrorType::ParseError)
            .with_details(format!("Malformed message: {}", details));

        for finding in findings {
            error.push_suggestion(finding.suggestion.clone());
        }
        error.insert_context("defect_count", findings.len());
        let kinds: Vec<Value> = findings.iter().map(|f| Value::from(f.kind.to_string())).collect();
        error.insert_context("defects", Value::Array(kinds));
        Some(error)
    }

    /// Scan `raw` and, when defective, build the aggregated 400 response
    ///
    /// Correlation headers are scraped from the raw header lines so the
    /// response still matches the client transaction.
    pub fn analyze(&self, raw: &[u8]) -> Option<(DetailedValidationError, SipMessage)> {
        let findings = self.detect(raw);
        let error = self.to_validation_error(&findings)?;
        let scraped = scrape_correlation_headers(raw);
        let response = self.builder.build(Some(&scraped), &error);
        Some((error, response))
    }
}

/// Best-effort extraction of Via/From/To/Call-ID/CSeq from raw text
pub fn scrape_correlation_headers(raw: &[u8]) -> SipMessage {
    let mut holder = SipMessage::request(Method::Extension("UNPARSED".to_string()), "");
    for line in split_lines(raw).iter().skip(1) {
        if line.is_blank() {
            break;
        }
        let text = line.as_str();
        let Some((name, value)) = text.split_once(':') else {
            continue;
        };
        let full = expand_compact(name.trim());
        if let Some(canonical) = CORRELATION_HEADERS.iter().find(|h| h.eq_ignore_ascii_case(full)) {
            holder.add_header(*canonical, value.trim());
        }
    }
    holder
}
