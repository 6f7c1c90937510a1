use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::{HeaderMap, Method};

/// A SIP request, as the parser collaborator would hand it to us.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    /// The Request-URI, kept as opaque text — URI structure is the
    /// parser collaborator's concern; the header codec (C1) only ever
    /// needs to extract or rebuild the `<...>` wrapper, not resolve it.
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    #[serde(skip)]
    pub source_addr: Option<SocketAddr>,
    #[serde(skip)]
    pub dest_addr: Option<SocketAddr>,
}

impl Request {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: HeaderMap::new(),
            body: Vec::new(),
            source_addr: None,
            dest_addr: None,
        }
    }

    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn call_id(&self) -> Option<&str> {
        self.header(crate::HeaderName::CALL_ID)
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        self.headers.set(crate::HeaderName::CONTENT_LENGTH, body.len().to_string());
        self.body = body;
        self
    }

    /// A structural clone that a transaction/dialog layer can mutate
    /// in place to adapt the message for the opposite leg.
    pub fn clone_for_adaptation(&self) -> Self {
        self.clone()
    }
}
