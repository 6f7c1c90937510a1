use serde::{Deserialize, Serialize};

/// Well-known header names, for callers that want to avoid typos without
/// pulling in a full typed-header enum (SIP/SDP deployments routinely
/// carry headers this crate has never heard of — see the design notes on
/// dynamic parameter maps).
pub struct HeaderName;

impl HeaderName {
    pub const VIA: &'static str = "Via";
    pub const FROM: &'static str = "From";
    pub const TO: &'static str = "To";
    pub const CALL_ID: &'static str = "Call-ID";
    pub const CSEQ: &'static str = "CSeq";
    pub const CONTACT: &'static str = "Contact";
    pub const MAX_FORWARDS: &'static str = "Max-Forwards";
    pub const CONTENT_LENGTH: &'static str = "Content-Length";
    pub const CONTENT_TYPE: &'static str = "Content-Type";
    pub const RECORD_ROUTE: &'static str = "Record-Route";
    pub const ROUTE: &'static str = "Route";
    pub const SESSION_EXPIRES: &'static str = "Session-Expires";
    pub const MIN_SE: &'static str = "Min-SE";
    pub const SUPPORTED: &'static str = "Supported";
    pub const REQUIRE: &'static str = "Require";
    pub const AUTHORIZATION: &'static str = "Authorization";
    pub const WWW_AUTHENTICATE: &'static str = "WWW-Authenticate";
}

/// A case-insensitive, order-preserving, multi-value header map.
///
/// SIP headers can repeat (multiple `Via`, multiple `Route`) and header
/// name casing is not significant on the wire, but the order headers were
/// received in can matter for diagnostics and for round-tripping through a
/// real parser. Both properties are preserved here rather than collapsing
/// into a `HashMap<String, String>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any existing values under the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    /// Replace all existing values for `name` with a single new value.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> &mut Self {
        self.remove(name.as_ref());
        self.entries.push((name.as_ref().to_string(), value.into()));
        self
    }

    /// Remove every header whose name matches `name`, case-insensitively.
    pub fn remove(&mut self, name: impl AsRef<str>) -> &mut Self {
        let name = name.as_ref();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        self.entries.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// The first value stored under `name`, if any.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values stored under `name`, in insertion order.
    pub fn get_all(&self, name: impl AsRef<str>) -> Vec<&str> {
        let name = name.as_ref();
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
