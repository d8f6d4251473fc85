//! SIP request methods

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// SIP request method
///
/// Covers the RFC 3261 core methods plus the common extensions (PRACK, UPDATE,
/// SUBSCRIBE/NOTIFY, REFER, MESSAGE, PUBLISH). Anything else is carried as
/// [`Method::Extension`] so that method-support checks can still name it.
///
/// # Examples
///
/// ```rust
/// use rvoip_validation_core::message::Method;
///
/// let method: Method = "invite".parse().unwrap();
/// assert_eq!(method, Method::Invite);
/// assert_eq!(method.as_str(), "INVITE");
///
/// let custom: Method = "FOO".parse().unwrap();
/// assert_eq!(custom, Method::Extension("FOO".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Method {
    Invite,
    Ack,
    Bye,
    Cancel,
    Register,
    Options,
    Info,
    Prack,
    Update,
    Subscribe,
    Notify,
    Refer,
    Message,
    Publish,
    /// Any other token
    Extension(String),
}

impl Method {
    /// Every method the stack knows by name, in RFC order
    pub const STANDARD: [Method; 14] = [
        Method::Invite,
        Method::Ack,
        Method::Bye,
        Method::Cancel,
        Method::Register,
        Method::Options,
        Method::Info,
        Method::Prack,
        Method::Update,
        Method::Subscribe,
        Method::Notify,
        Method::Refer,
        Method::Message,
        Method::Publish,
    ];

    /// Canonical upper-case token
    pub fn as_str(&self) -> &str {
        match self {
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Register => "REGISTER",
            Method::Options => "OPTIONS",
            Method::Info => "INFO",
            Method::Prack => "PRACK",
            Method::Update => "UPDATE",
            Method::Subscribe => "SUBSCRIBE",
            Method::Notify => "NOTIFY",
            Method::Refer => "REFER",
            Method::Message => "MESSAGE",
            Method::Publish => "PUBLISH",
            Method::Extension(token) => token,
        }
    }

    /// Returns true for methods that are not extension tokens
    pub fn is_standard(&self) -> bool {
        !matches!(self, Method::Extension(_))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a method token is empty or contains whitespace
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid method token: {0:?}")]
pub struct InvalidMethod(pub String);

impl FromStr for Method {
    type Err = InvalidMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(InvalidMethod(s.to_string()));
        }

        let upper = s.to_ascii_uppercase();
        let method = Method::STANDARD
            .iter()
            .find(|m| m.as_str() == upper)
            .cloned()
            .unwrap_or(Method::Extension(s.to_string()));
        Ok(method)
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.as_str().to_string()
    }
}

impl TryFrom<String> for Method {
    type Error = InvalidMethod;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
