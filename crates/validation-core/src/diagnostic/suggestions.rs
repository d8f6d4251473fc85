//! Remediation text attached to diagnostics
//!
//! Suggestions are deterministic: the same header always yields the same
//! advice, so clients and tests can rely on them.

use crate::classify::ParseErrorCategory;
use crate::message::Method;

/// Header-specific advice, keyed by lower-case full header name
const HEADER_SUGGESTIONS: &[(&str, &str)] = &[
    (
        "via",
        "Add a Via header such as 'Via: SIP/2.0/UDP host:5060;branch=z9hG4bK<unique>' with a branch starting with the RFC 3261 magic cookie 'z9hG4bK'",
    ),
    (
        "from",
        "Include a From header with a SIP URI and a tag parameter, e.g. 'From: <sip:alice@example.com>;tag=1928301774'",
    ),
    (
        "to",
        "Include a To header naming the logical recipient, e.g. 'To: <sip:bob@example.com>'",
    ),
    (
        "call-id",
        "Include a globally unique Call-ID header, e.g. 'Call-ID: a84b4c76e66710@pc33.example.com'",
    ),
    (
        "cseq",
        "Include a CSeq header with a sequence number and the request method, e.g. 'CSeq: 314159 INVITE'",
    ),
    (
        "max-forwards",
        "Set Max-Forwards to an integer between 0 and 255; 70 is the recommended initial value",
    ),
    (
        "contact",
        "Provide a Contact header with a reachable SIP URI, e.g. 'Contact: <sip:alice@192.0.2.4:5060>'",
    ),
    (
        "content-length",
        "Set Content-Length to the exact number of bytes in the message body",
    ),
    (
        "content-type",
        "Declare the body format with Content-Type, e.g. 'Content-Type: application/sdp'",
    ),
    (
        "session-expires",
        "Use 'Session-Expires: <seconds>[;refresher=uac|uas]' with a value of at least 90 seconds",
    ),
    (
        "min-se",
        "Min-SE must be an integer number of seconds no smaller than 90",
    ),
    (
        "expires",
        "Expires must be a non-negative integer number of seconds",
    ),
    (
        "request-uri",
        "Use a sip:, sips: or tel: Request-URI; REGISTER Request-URIs must name the domain only",
    ),
];

/// Suggestion for a missing or invalid header
///
/// Unknown headers get a generic hint that echoes the header name and the
/// raw reason.
pub fn header_suggestion(header: &str, reason: &str) -> String {
    let key = header.to_ascii_lowercase();
    HEADER_SUGGESTIONS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, text)| text.to_string())
        .unwrap_or_else(|| format!("Check the '{}' header: {}", header, reason))
}

/// One suggestion per supported method, plus a summary line
pub fn method_suggestions(allowed: &[Method]) -> Vec<String> {
    let list = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
    let mut out = vec![format!("Use one of the supported methods: {}", list)];
    out.extend(allowed.iter().map(|m| format!("{} is supported", m)));
    out
}

/// Session interval offered to clients that send none, in seconds
pub const DEFAULT_SESSION_EXPIRES: u32 = 1800;

/// Guidance for a required extension
///
/// `session_expires` is the interval proposed when the extension is "timer".
pub fn extension_suggestions(extension: &str, session_expires: u32) -> Vec<String> {
    let mut out = vec![
        format!("Add 'Supported: {}' to the request", extension),
        format!("Retry the request including 'Require: {}' support", extension),
    ];
    if extension.eq_ignore_ascii_case("timer") {
        out.push(format!(
            "Include a Session-Expires header, e.g. 'Session-Expires: {};refresher=uac'",
            session_expires
        ));
        out.push("Honour the server's Min-SE value when choosing the session interval".to_string());
    }
    out
}

/// Guidance for a session interval below the accepted minimum
pub fn interval_suggestions(min_se: u32, requested: u32) -> Vec<String> {
    vec![
        format!(
            "Increase Session-Expires from {} to at least {} seconds",
            requested, min_se
        ),
        format!("Add 'Min-SE: {}' to the retried request", min_se),
    ]
}

/// Guidance for a registration interval below the accepted minimum
pub fn registration_interval_suggestions(min_expires: u32, requested: u32) -> Vec<String> {
    vec![format!(
        "Increase Expires from {} to at least {} seconds, or use Expires: 0 to unregister",
        requested, min_expires
    )]
}

/// Guidance per parse failure category
pub fn parse_suggestions(category: ParseErrorCategory) -> Vec<String> {
    let text: &[&str] = match category {
        ParseErrorCategory::StartLine => &[
            "Start the message with 'METHOD sip:uri SIP/2.0' for requests or 'SIP/2.0 CODE Reason' for responses",
        ],
        ParseErrorCategory::Header => &[
            "Write every header as 'Name: value' on its own line terminated by CRLF",
        ],
        ParseErrorCategory::ContentLength => &[
            "Set Content-Length to the exact number of bytes in the message body",
        ],
        ParseErrorCategory::Body => &[
            "Make sure the body matches the declared Content-Length and Content-Type",
        ],
        ParseErrorCategory::EmptyMessage => &["Send a complete SIP message; the datagram was empty"],
        ParseErrorCategory::InvalidMethod => &["Use a standard SIP method token in upper case"],
        ParseErrorCategory::Version => &["Use 'SIP/2.0' as the protocol version"],
        ParseErrorCategory::Unknown => &["Verify the message follows RFC 3261 syntax"],
    };
    text.iter().map(|s| s.to_string()).collect()
}
