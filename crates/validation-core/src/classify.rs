//! # Error message classification
//!
//! Upstream components report failures as free text, so categorization and
//! recoverability decisions are made by matching fragments of that text. All
//! fragment tables live in this module and nowhere else: call sites only see
//! the enums returned here. Matching is case-insensitive and the first table
//! entry that matches wins.
//!
//! ```rust
//! use rvoip_validation_core::classify::{categorize_parse_error, ParseErrorCategory};
//!
//! assert_eq!(
//!     categorize_parse_error("failed to parse start line: missing version"),
//!     ParseErrorCategory::StartLine
//! );
//! assert_eq!(categorize_parse_error("something odd"), ParseErrorCategory::Unknown);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sub-category of a parse failure, used as the per-subtype statistics key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorCategory {
    StartLine,
    Header,
    ContentLength,
    Body,
    EmptyMessage,
    InvalidMethod,
    Version,
    Unknown,
}

impl ParseErrorCategory {
    /// Statistics key, e.g. `start_line_error`
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseErrorCategory::StartLine => "start_line_error",
            ParseErrorCategory::Header => "header_error",
            ParseErrorCategory::ContentLength => "content_length_error",
            ParseErrorCategory::Body => "body_error",
            ParseErrorCategory::EmptyMessage => "empty_message_error",
            ParseErrorCategory::InvalidMethod => "invalid_method_error",
            ParseErrorCategory::Version => "version_error",
            ParseErrorCategory::Unknown => "unknown_parse_error",
        }
    }
}

impl fmt::Display for ParseErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered parse-error fragments; the first matching row wins
///
/// Matching ignores ASCII case. The base fragment per row is "start line",
/// "header", "content-length", "body", "empty message", "invalid method" and
/// "version". The extra fragments are "request line" and "status line"
/// (start line), "no data" (empty message), and "unknown method" and
/// "unsupported method" (invalid method).
const PARSE_CATEGORIES: &[(&[&str], ParseErrorCategory)] = &[
    (&["start line", "request line", "status line"], ParseErrorCategory::StartLine),
    (&["header"], ParseErrorCategory::Header),
    (&["content-length"], ParseErrorCategory::ContentLength),
    (&["body"], ParseErrorCategory::Body),
    (&["empty message", "no data"], ParseErrorCategory::EmptyMessage),
    (&["invalid method", "unknown method", "unsupported method"], ParseErrorCategory::InvalidMethod),
    (&["version"], ParseErrorCategory::Version),
];

/// Categorize a parse failure from its message text
pub fn categorize_parse_error(message: &str) -> ParseErrorCategory {
    first_match(message, PARSE_CATEGORIES).unwrap_or(ParseErrorCategory::Unknown)
}

const PARSE_RECOVERABLE: &[&str] = &["line ending", "header format"];

/// True when a parse failure is the kind a client can fix mechanically
pub fn is_parse_error_correctable(message: &str) -> bool {
    contains_any(message, PARSE_RECOVERABLE)
}

/// Transient processing failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingFault {
    Database,
    Connection,
    Timeout,
    Temporary,
}

const PROCESSING_FAULTS: &[(&[&str], ProcessingFault)] = &[
    (&["database"], ProcessingFault::Database),
    (&["connection"], ProcessingFault::Connection),
    (&["timeout"], ProcessingFault::Timeout),
    (&["temporary"], ProcessingFault::Temporary),
];

/// Classify a processing failure; `None` means not transient
pub fn classify_processing_error(message: &str) -> Option<ProcessingFault> {
    first_match(message, PROCESSING_FAULTS)
}

/// Transport failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFault {
    Refused,
    Reset,
    Timeout,
    Connection,
    Network,
}

const TRANSPORT_FAULTS: &[(&[&str], TransportFault)] = &[
    (&["refused"], TransportFault::Refused),
    (&["reset"], TransportFault::Reset),
    (&["timeout"], TransportFault::Timeout),
    (&["connection"], TransportFault::Connection),
    (&["network"], TransportFault::Network),
];

/// Classify a transport failure; `None` means not recoverable
pub fn classify_transport_error(message: &str) -> Option<TransportFault> {
    first_match(message, TRANSPORT_FAULTS)
}

/// Case-insensitive check of `message` against a substring set
pub fn contains_any(message: &str, fragments: &[impl AsRef<str>]) -> bool {
    let lower = message.to_ascii_lowercase();
    fragments
        .iter()
        .any(|f| lower.contains(&f.as_ref().to_ascii_lowercase()))
}

fn first_match<T: Copy>(message: &str, table: &[(&[&str], T)]) -> Option<T> {
    let lower = message.to_ascii_lowercase();
    table
        .iter()
        .find(|(fragments, _)| fragments.iter().any(|f| lower.contains(f)))
        .map(|(_, value)| *value)
}
