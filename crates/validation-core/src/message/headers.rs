//! Ordered SIP header storage
//!
//! Header names keep the spelling the caller used, but every lookup compares
//! names case-insensitively and resolves the RFC 3261 §7.3.3 compact forms
//! (`v` for Via, `l` for Content-Length and so on).

use serde::{Deserialize, Serialize};

/// Compact form → full header name
const COMPACT_FORMS: &[(&str, &str)] = &[
    ("a", "Accept-Contact"),
    ("b", "Referred-By"),
    ("c", "Content-Type"),
    ("e", "Content-Encoding"),
    ("f", "From"),
    ("i", "Call-ID"),
    ("k", "Supported"),
    ("l", "Content-Length"),
    ("m", "Contact"),
    ("o", "Event"),
    ("r", "Refer-To"),
    ("s", "Subject"),
    ("t", "To"),
    ("u", "Allow-Events"),
    ("v", "Via"),
    ("x", "Session-Expires"),
];

/// Expand a compact header name to its full form; other names are returned as-is
pub fn expand_compact(name: &str) -> &str {
    if name.len() == 1 {
        let lower = name.to_ascii_lowercase();
        if let Some((_, full)) = COMPACT_FORMS.iter().find(|(short, _)| *short == lower) {
            return full;
        }
    }
    name
}

/// True when two header names refer to the same header
pub fn names_match(a: &str, b: &str) -> bool {
    expand_compact(a).eq_ignore_ascii_case(expand_compact(b))
}

/// A single header line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered header list
///
/// # Examples
///
/// ```rust
/// use rvoip_validation_core::message::Headers;
///
/// let mut headers = Headers::new();
/// headers.add("v", "SIP/2.0/UDP host;branch=z9hG4bK1");
/// headers.add("Supported", "timer, 100rel");
///
/// assert!(headers.has("Via"));
/// assert_eq!(headers.list_values("supported"), vec!["timer", "100rel"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(Vec<Header>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// First value of the named header
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|h| names_match(&h.name, name))
            .map(|h| h.value.as_str())
    }

    /// Every value of the named header, in message order
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|h| names_match(&h.name, name))
            .map(|h| h.value.as_str())
            .collect()
    }

    /// Every comma-separated element across all occurrences of the header
    ///
    /// Commas inside quoted strings or `<...>` are not treated as separators.
    pub fn list_values(&self, name: &str) -> Vec<&str> {
        self.get_all(name)
            .into_iter()
            .flat_map(split_list)
            .collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.iter().any(|h| names_match(&h.name, name))
    }

    /// Replace every occurrence of the header with a single value
    ///
    /// The replacement keeps the position of the first occurrence.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.0.iter().position(|h| names_match(&h.name, &name)) {
            Some(idx) => {
                self.0[idx] = Header::new(name.clone(), value);
                let mut seen = 0usize;
                self.0.retain(|h| {
                    if names_match(&h.name, &name) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.0.push(Header::new(name, value)),
        }
    }

    /// Append a header after any existing ones
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push(Header::new(name, value));
    }

    /// Remove every occurrence, returning how many were removed
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.0.len();
        self.0.retain(|h| !names_match(&h.name, name));
        before - self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Header> for Headers {
    fn from_iter<I: IntoIterator<Item = Header>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Split a header value on top-level commas
fn split_list(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut angle_depth = 0u32;
    let mut start = 0usize;

    for (idx, ch) in value.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => angle_depth += 1,
            '>' if !in_quotes => angle_depth = angle_depth.saturating_sub(1),
            ',' if !in_quotes && angle_depth == 0 => {
                parts.push(value[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(value[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_and_case_insensitive_lookup() {
        let mut headers = Headers::new();
        headers.add("l", "12");
        headers.add("CALL-ID", "abc@host");

        assert_eq!(headers.get("Content-Length"), Some("12"));
        assert_eq!(headers.get("call-id"), Some("abc@host"));
        assert_eq!(headers.get("i"), Some("abc@host"));
        assert!(!headers.has("To"));
    }

    #[test]
    fn test_set_replaces_all_occurrences_in_place() {
        let mut headers = Headers::new();
        headers.add("Via", "a");
        headers.add("From", "f");
        headers.add("v", "b");
        headers.set("Via", "c");

        assert_eq!(headers.get_all("Via"), vec!["c"]);
        assert_eq!(headers.iter().next().map(|h| h.value.as_str()), Some("c"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_list_values_respects_quotes_and_brackets() {
        let mut headers = Headers::new();
        headers.add("Contact", "\"Doe, John\" <sip:john@host>, <sip:a@b;x=1,2>");
        headers.add("Contact", "sip:c@d");

        let values = headers.list_values("m");
        assert_eq!(values.len(), 3);
        assert_eq!(values[0], "\"Doe, John\" <sip:john@host>");
        assert_eq!(values[2], "sip:c@d");
    }

    #[test]
    fn test_remove_counts() {
        let mut headers = Headers::new();
        headers.add("Require", "timer");
        headers.add("require", "100rel");
        assert_eq!(headers.remove("REQUIRE"), 2);
        assert!(headers.is_empty());
    }
}
