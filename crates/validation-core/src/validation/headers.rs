//! Header value checks shared by the validators
//!
//! Each check returns `Some(reason)` when the header is present and wrong,
//! `None` when it is absent or acceptable. Absence is the caller's concern.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::message::{Method, SipMessage};

/// Smallest Session-Expires/Min-SE any server may accept
pub const RFC4028_MIN_SE: u32 = 90;

/// Request-URI schemes accepted by the structure validator
pub const REQUEST_URI_SCHEMES: [&str; 3] = ["sip:", "sips:", "tel:"];

/// Content-Length must equal the body length
pub fn validate_content_length(message: &SipMessage) -> Option<String> {
    let value = message.header("Content-Length")?;
    match value.trim().parse::<usize>() {
        Ok(declared) if declared == message.body().len() => None,
        Ok(declared) => Some(format!(
            "Content-Length {} does not match actual body length {}",
            declared,
            message.body().len()
        )),
        Err(_) => Some(format!("Content-Length '{}' is not a non-negative integer", value)),
    }
}

/// CSeq must be `<u32> <METHOD>`, with the method matching the request line
pub fn validate_cseq(message: &SipMessage) -> Option<String> {
    let value = message.header("CSeq")?;
    let mut parts = value.split_whitespace();
    let (Some(number), Some(method), None) = (parts.next(), parts.next(), parts.next()) else {
        return Some(format!("CSeq '{}' must be '<sequence> <METHOD>'", value));
    };

    if number.parse::<u32>().is_err() {
        return Some(format!("CSeq sequence number '{}' is not a 32-bit unsigned integer", number));
    }
    match message.method() {
        Some(request_method) if request_method.as_str() != method => Some(format!(
            "CSeq method '{}' does not match request method '{}'",
            method, request_method
        )),
        _ => None,
    }
}

/// Max-Forwards must be an integer in 0..=255
pub fn validate_max_forwards(message: &SipMessage) -> Option<String> {
    let value = message.header("Max-Forwards")?;
    match value.trim().parse::<u8>() {
        Ok(_) => None,
        Err(_) => Some(format!("Max-Forwards '{}' is not an integer between 0 and 255", value)),
    }
}

/// Request-URI must be present and use a sip:, sips: or tel: scheme
pub fn validate_request_uri(message: &SipMessage) -> Option<String> {
    let uri = message.request_uri()?;
    if uri.trim().is_empty() {
        return Some("Request-URI is empty".to_string());
    }
    let lower = uri.to_ascii_lowercase();
    if REQUEST_URI_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
        None
    } else {
        Some(format!("Request-URI '{}' must use the sip:, sips: or tel: scheme", uri))
    }
}

/// True when `header` lists `tag` as one of its comma-separated option tags
pub fn has_option_tag(message: &SipMessage, header: &str, tag: &str) -> bool {
    message
        .headers()
        .list_values(header)
        .iter()
        .any(|value| value.trim().eq_ignore_ascii_case(tag))
}

/// RFC 4028 refresher role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Refresher {
    Uac,
    Uas,
}

impl fmt::Display for Refresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refresher::Uac => f.write_str("uac"),
            Refresher::Uas => f.write_str("uas"),
        }
    }
}

impl FromStr for Refresher {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uac" => Ok(Refresher::Uac),
            "uas" => Ok(Refresher::Uas),
            other => Err(format!("refresher '{}' must be 'uac' or 'uas'", other)),
        }
    }
}

/// Parsed `Session-Expires: <delta>[;refresher=uac|uas]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionExpires {
    pub delta_seconds: u32,
    pub refresher: Option<Refresher>,
}

/// Parse a Session-Expires value; unknown parameters are ignored
pub fn parse_session_expires(value: &str) -> Result<SessionExpires, String> {
    let mut parts = value.split(';');
    let delta = parts.next().unwrap_or_default().trim();
    let delta_seconds = delta
        .parse::<u32>()
        .map_err(|_| format!("Session-Expires '{}' is not an integer number of seconds", delta))?;

    let mut refresher = None;
    for param in parts {
        let Some((name, val)) = param.split_once('=') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("refresher") {
            refresher = Some(val.parse::<Refresher>()?);
        }
    }

    Ok(SessionExpires {
        delta_seconds,
        refresher,
    })
}

/// Parse a Min-SE value, ignoring any parameters
pub fn parse_min_se(value: &str) -> Result<u32, String> {
    let delta = value.split(';').next().unwrap_or_default().trim();
    delta
        .parse::<u32>()
        .map_err(|_| format!("Min-SE '{}' is not an integer number of seconds", delta))
}

/// User part of a sip:/sips: URI, if any
pub fn uri_user_part(uri: &str) -> Option<&str> {
    let rest = uri.split_once(':').map(|(_, r)| r)?;
    let rest = rest.split(['?', ';']).next().unwrap_or(rest);
    rest.split_once('@').map(|(user, _)| user).filter(|u| !u.is_empty())
}

/// `expires` parameter of a Contact value, `Err` when present but not numeric
pub fn contact_expires_param(contact: &str) -> Result<Option<u32>, String> {
    let params = contact.rsplit_once('>').map(|(_, p)| p).unwrap_or(contact);
    for param in params.split(';').skip(1) {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("expires") {
            return value
                .trim()
                .parse::<u32>()
                .map(Some)
                .map_err(|_| format!("Contact expires parameter '{}' is not an integer", value.trim()));
        }
    }
    Ok(None)
}

/// Methods subject to session-timer negotiation
pub fn is_session_timer_method(method: &Method) -> bool {
    matches!(method, Method::Invite | Method::Update)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with_body(length: &str, body: &'static [u8]) -> SipMessage {
        SipMessage::request(Method::Message, "sip:bob@example.com")
            .with_header("Content-Length", length)
            .with_body(body)
    }

    #[test]
    fn test_content_length_mismatch_is_reported() {
        let reason = validate_content_length(&message_with_body("10", b"hello")).unwrap();
        assert!(reason.contains("does not match actual body length"));
    }

    #[test]
    fn test_content_length_matching_body_is_valid() {
        assert_eq!(validate_content_length(&message_with_body("5", b"hello")), None);
        assert_eq!(validate_content_length(&message_with_body("0", b"")), None);
    }

    #[test]
    fn test_content_length_compact_form() {
        let message = SipMessage::request(Method::Message, "sip:bob@example.com")
            .with_header("l", "3")
            .with_body(&b"abcd"[..]);
        assert!(validate_content_length(&message).is_some());
    }

    #[test]
    fn test_cseq_rules() {
        let ok = SipMessage::request(Method::Invite, "sip:b@h").with_header("CSeq", "42 INVITE");
        assert_eq!(validate_cseq(&ok), None);

        let wrong_method = SipMessage::request(Method::Invite, "sip:b@h").with_header("CSeq", "42 BYE");
        assert!(validate_cseq(&wrong_method).unwrap().contains("does not match request method"));

        let not_number = SipMessage::request(Method::Invite, "sip:b@h").with_header("CSeq", "x INVITE");
        assert!(validate_cseq(&not_number).is_some());

        let three = SipMessage::request(Method::Invite, "sip:b@h").with_header("CSeq", "1 INVITE extra");
        assert!(validate_cseq(&three).is_some());
    }

    #[test]
    fn test_max_forwards_range() {
        let ok = SipMessage::request(Method::Options, "sip:b@h").with_header("Max-Forwards", "70");
        let bad = SipMessage::request(Method::Options, "sip:b@h").with_header("Max-Forwards", "256");
        assert_eq!(validate_max_forwards(&ok), None);
        assert!(validate_max_forwards(&bad).is_some());
    }

    #[test]
    fn test_request_uri_schemes() {
        for uri in ["sip:b@h", "SIPS:b@h", "tel:+15551234"] {
            assert_eq!(validate_request_uri(&SipMessage::request(Method::Invite, uri)), None);
        }
        assert!(validate_request_uri(&SipMessage::request(Method::Invite, "http://h")).is_some());
        assert!(validate_request_uri(&SipMessage::request(Method::Invite, "")).is_some());
    }

    #[test]
    fn test_parse_session_expires() {
        assert_eq!(
            parse_session_expires("1800;refresher=uac"),
            Ok(SessionExpires {
                delta_seconds: 1800,
                refresher: Some(Refresher::Uac)
            })
        );
        assert_eq!(parse_session_expires(" 90 ").map(|s| s.refresher), Ok(None));
        assert!(parse_session_expires("soon").is_err());
        assert!(parse_session_expires("1800;refresher=proxy").is_err());
    }

    #[test]
    fn test_uri_user_part() {
        assert_eq!(uri_user_part("sip:alice@example.com"), Some("alice"));
        assert_eq!(uri_user_part("sip:example.com;transport=tcp"), None);
        assert_eq!(uri_user_part("sip:example.com?subject=a@b"), None);
    }

    #[test]
    fn test_contact_expires_param() {
        assert_eq!(contact_expires_param("<sip:a@h>;expires=30"), Ok(Some(30)));
        assert_eq!(contact_expires_param("<sip:a@h;expires=30>"), Ok(None));
        assert!(contact_expires_param("<sip:a@h>;expires=never").is_err());
    }

    #[test]
    fn test_option_tags() {
        let message = SipMessage::request(Method::Invite, "sip:b@h").with_header("Supported", "100rel, Timer");
        assert!(has_option_tag(&message, "Supported", "timer"));
        assert!(has_option_tag(&message, "k", "100rel"));
        assert!(!has_option_tag(&message, "Require", "timer"));
    }
}
