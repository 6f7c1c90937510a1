use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::HeaderMap;

/// A SIP response, as the parser collaborator would hand it to us.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub reason: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    #[serde(skip)]
    pub source_addr: Option<SocketAddr>,
    #[serde(skip)]
    pub dest_addr: Option<SocketAddr>,
}

impl Response {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers: HeaderMap::new(),
            body: Vec::new(),
            source_addr: None,
            dest_addr: None,
        }
    }

    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn is_provisional(&self) -> bool {
        (100..200).contains(&self.status)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_failure(&self) -> bool {
        self.status >= 300
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        self.headers.set(crate::HeaderName::CONTENT_LENGTH, body.len().to_string());
        self.body = body;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_class_helpers() {
        assert!(Response::new(180, "Ringing").is_provisional());
        assert!(Response::new(200, "OK").is_success());
        assert!(Response::new(486, "Busy Here").is_failure());
        assert!(!Response::new(200, "OK").is_failure());
    }
}
