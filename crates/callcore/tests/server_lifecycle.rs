//! Exercises the facade's `Server` wiring: start/stop sequencing,
//! pipeline mutation, and that `stop` ends every still-active session.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use callcore::collaborators::{Contact, MessageParser, ParserError, Transport, TransactionSource, TransportError, TxnHandle, User, UserStore};
use callcore::{Config, Server};
use callcore_message::{HeaderName, Message, Method, Request};

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<SocketAddr>>,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, _bytes: Vec<u8>, _protocol: &str, destination: SocketAddr) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(destination);
        Ok(())
    }
}

struct NoopParser;

impl MessageParser for NoopParser {
    fn parse(&self, _bytes: &[u8]) -> Result<Message, ParserError> {
        Err(ParserError::Malformed("not used in tests".to_string()))
    }

    fn serialize(&self, message: &Message) -> Vec<u8> {
        format!("{:?}", message).into_bytes()
    }
}

struct FakeTxnHandle {
    id: String,
}

impl TxnHandle for FakeTxnHandle {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_client(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct FakeTransactionSource {
    counter: Mutex<u64>,
}

#[async_trait]
impl TransactionSource for FakeTransactionSource {
    async fn create_transaction(&self, _message: &Message) -> Box<dyn TxnHandle> {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        Box::new(FakeTxnHandle { id: format!("txn-{}", *counter) })
    }

    async fn find_transaction(&self, _message: &Message) -> Option<Box<dyn TxnHandle>> {
        None
    }

    async fn cleanup_expired(&self) {}
}

struct EmptyUserStore;

#[async_trait]
impl UserStore for EmptyUserStore {
    async fn find_contacts(&self, _aor: &str) -> Vec<Contact> {
        Vec::new()
    }

    async fn get_user(&self, _username: &str, _realm: &str) -> Option<User> {
        None
    }
}

fn invite(call_id: &str) -> Request {
    let mut req = Request::new(Method::Invite, "sip:bob@192.0.2.2");
    req.headers.set(HeaderName::VIA, "SIP/2.0/UDP 192.0.2.1:5060;branch=z9hG4bK1");
    req.headers.set(HeaderName::CALL_ID, call_id);
    req.headers.set(HeaderName::FROM, "<sip:alice@192.0.2.1>;tag=a-tag");
    req.headers.set(HeaderName::TO, "<sip:bob@192.0.2.2>");
    req.headers.set(HeaderName::CONTACT, "<sip:alice@192.0.2.1>");
    req.headers.set(HeaderName::CSEQ, "1 INVITE");
    req.source_addr = Some("192.0.2.1:5060".parse().unwrap());
    req
}

fn server() -> Arc<Server> {
    Server::new(
        Config::default(),
        Arc::new(RecordingTransport::default()),
        Arc::new(NoopParser),
        Arc::new(FakeTransactionSource::default()),
        Arc::new(EmptyUserStore),
    )
}

#[tokio::test]
async fn start_then_stop_ends_active_sessions_and_is_idle_after() {
    let server = server();
    server.start().await;

    let session_id = server.engine().create_session(&invite("call-1"), "sip:bob@192.0.2.2:5060").await.unwrap();
    assert_eq!(server.engine().session_count(), 1);

    server.stop().await;

    let session = server.engine().get_session(&session_id).unwrap();
    let session = session.read().await;
    assert_eq!(session.status, callcore::SessionStatus::Failed);
}

#[tokio::test]
async fn validate_rejects_invite_without_call_id() {
    let server = server();
    let mut req = invite("call-2");
    req.headers.remove(HeaderName::CALL_ID);

    let result = server.validate(&req).await;
    assert!(!result.valid);
    assert_eq!(result.error_code, 400);
}

#[tokio::test]
async fn removing_the_auth_validator_lets_unauthenticated_register_through() {
    let mut config = Config::default();
    config.require_auth = true;
    let server = Server::new(
        config,
        Arc::new(RecordingTransport::default()),
        Arc::new(NoopParser),
        Arc::new(FakeTransactionSource::default()),
        Arc::new(EmptyUserStore),
    );

    let mut register = invite("call-3");
    register.method = Method::Register;
    assert_eq!(server.validate(&register).await.error_code, 401);

    server.remove_validator("auth").await;
    assert!(server.validate(&register).await.valid);
}
