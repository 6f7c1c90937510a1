//! Trait boundaries for the external collaborators the B2BUA engine
//! depends on.
//!
//! None of these are implemented here — the wire parser/serializer, the
//! transport manager, the transaction state machine, and the
//! registrar/user store are all deliberately out of scope. The B2BUA &
//! hunt engine is the one component that actually calls through these
//! boundaries, emitting outbound messages to the transport
//! collaborator, so the traits live here; the facade crate re-exports
//! them for callers wiring up a `Server`.

use std::net::SocketAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use callcore_message::{Message, Request, Response};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport send failed: {0}")]
    SendFailed(String),
}

/// The transport layer that owns sockets. The core never binds
/// a port; it only ever calls `send`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, bytes: Vec<u8>, protocol: &str, destination: SocketAddr) -> Result<(), TransportError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParserError {
    #[error("parse failed: {0}")]
    Malformed(String),
}

/// The wire parser/serializer. Named `MessageParser` rather than the
/// bare "Parser" to avoid clashing with the `serde`-flavored naming the
/// rest of the stack uses for its own (de)serialization.
pub trait MessageParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<Message, ParserError>;
    fn serialize(&self, message: &Message) -> Vec<u8>;
}

/// A handle into the RFC 3261 Section 17 transaction state machine.
/// The core consumes this; it does not reimplement transaction timers.
pub trait TxnHandle: Send + Sync {
    fn id(&self) -> &str;
    fn is_client(&self) -> bool;
}

/// The transaction layer.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn create_transaction(&self, message: &Message) -> Box<dyn TxnHandle>;
    async fn find_transaction(&self, message: &Message) -> Option<Box<dyn TxnHandle>>;
    async fn cleanup_expired(&self);
}

/// A registered contact, as the registrar/user-store collaborator would
/// hand it to us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub uri: String,
    pub expires: DateTime<Utc>,
}

/// An opaque credential record; the digest is never inspected by the
/// core itself — actual credential verification is a collaborator
/// responsibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub realm: String,
    pub password_digest: String,
}

/// The registrar / user-store collaborator.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_contacts(&self, aor: &str) -> Vec<Contact>;
    async fn get_user(&self, username: &str, realm: &str) -> Option<User>;
}

/// Convenience used by the engine to emit a response it built locally —
/// a thin shim over `MessageParser::serialize` + `Transport::send` so
/// call sites don't repeat the two-step dance.
pub async fn emit_response(parser: &dyn MessageParser, transport: &dyn Transport, response: &Response, destination: SocketAddr) -> Result<(), TransportError> {
    let bytes = parser.serialize(&Message::Response(response.clone()));
    transport.send(bytes, "UDP", destination).await
}

pub async fn emit_request(parser: &dyn MessageParser, transport: &dyn Transport, request: &Request, destination: SocketAddr) -> Result<(), TransportError> {
    let bytes = parser.serialize(&Message::Request(request.clone()));
    transport.send(bytes, "UDP", destination).await
}
