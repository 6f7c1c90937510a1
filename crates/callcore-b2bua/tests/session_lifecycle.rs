//! End-to-end scenarios driven purely through `B2buaEngine`'s public API,
//! with fake `Transport`/`MessageParser`/`UserStore` collaborators that
//! just record what would have gone out on the wire.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use callcore_b2bua::collaborators::{Contact, MessageParser, ParserError, Transport, TransactionSource, TransportError, TxnHandle, User, UserStore};
use callcore_b2bua::{B2buaConfig, B2buaEngine, EndReason, HuntGroup, HuntGroupStrategy, Member};
use callcore_dialog::DialogRegistry;
use callcore_message::{HeaderName, Message, Method, Request, Response};
use callcore_timer::{Config as TimerConfig, SessionTimerManager};

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, bytes: Vec<u8>, _protocol: &str, destination: SocketAddr) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push((bytes, destination));
        Ok(())
    }
}

/// A parser that just round-trips a tagged debug string; the engine
/// never inspects what `serialize` returns, only hands it to the
/// transport, so a faithful wire format isn't needed for these tests.
struct NoopParser;

impl MessageParser for NoopParser {
    fn parse(&self, _bytes: &[u8]) -> Result<Message, ParserError> {
        Err(ParserError::Malformed("not used in tests".to_string()))
    }

    fn serialize(&self, message: &Message) -> Vec<u8> {
        format!("{:?}", message).into_bytes()
    }
}

/// A transaction handle that only ever reports the id it was built with —
/// tests never need `is_client()` to return anything meaningful.
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

/// A transaction source that hands out a fresh id per call and never
/// matches a response to an existing transaction — the engine treats a
/// `None` from `find_transaction` as "nothing to log", which is fine for
/// these tests since they drive the engine through its own leg/session
/// state rather than through this collaborator.
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

fn harness() -> (Arc<B2buaEngine>, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let dialogs = Arc::new(DialogRegistry::new());
    let timers = Arc::new(SessionTimerManager::new(TimerConfig::default()));
    let engine = B2buaEngine::new(
        B2buaConfig::default(),
        dialogs,
        timers,
        transport.clone(),
        Arc::new(NoopParser),
        Arc::new(FakeTransactionSource::default()),
        Arc::new(EmptyUserStore),
    );
    (engine, transport)
}

fn invite(call_id: &str, from_uri: &str, from_tag: &str, to_uri: &str, source: &str) -> Request {
    let mut req = Request::new(Method::Invite, to_uri);
    req.headers.set(HeaderName::CALL_ID, call_id);
    req.headers.set(HeaderName::FROM, format!("<{from_uri}>;tag={from_tag}"));
    req.headers.set(HeaderName::TO, format!("<{to_uri}>"));
    req.headers.set(HeaderName::CONTACT, format!("<{from_uri}>"));
    req.headers.set(HeaderName::CSEQ, "1 INVITE");
    req.source_addr = Some(source.parse().unwrap());
    req.body = b"v=0\r\no=alice 1 1 IN IP4 198.51.100.1\r\ns=-\r\nc=IN IP4 198.51.100.1\r\nt=0 0\r\nm=audio 40000 RTP/AVP 0\r\n".to_vec();
    req
}

fn ok_with_tag(to_tag: &str, from: &str) -> Response {
    let mut resp = Response::new(200, "OK");
    resp.headers.set(HeaderName::FROM, from);
    resp.headers.set(HeaderName::TO, format!("<sip:callee@192.0.2.2>;tag={to_tag}"));
    resp.headers.set(HeaderName::CONTACT, "<sip:callee@192.0.2.2:5060>");
    resp.source_addr = Some("192.0.2.2:5060".parse().unwrap());
    resp.body = b"v=0\r\no=bob 2 2 IN IP4 192.0.2.2\r\ns=-\r\nc=IN IP4 192.0.2.2\r\nt=0 0\r\nm=audio 50000 RTP/AVP 0\r\n".to_vec();
    resp
}

#[tokio::test]
async fn direct_call_setup_bridges_and_tears_down_on_bye() {
    let (engine, transport) = harness();
    let caller_invite = invite("call-1", "sip:alice@192.0.2.1", "a-tag", "sip:bob@192.0.2.2", "192.0.2.1:5060");

    let session_id = engine.create_session(&caller_invite, "sip:bob@192.0.2.2:5060").await.unwrap();
    assert_eq!(transport.sent.lock().unwrap().len(), 1, "callee INVITE should go out immediately");

    let session_handle = engine.get_session(&session_id).unwrap();
    let callee_from_tag = {
        let session = session_handle.read().await;
        session.callee_leg.as_ref().unwrap().from_tag.clone()
    };
    let from_header = format!("<sip:server@sip.local:5060>;tag={callee_from_tag}");

    let ok = ok_with_tag("b-tag", &from_header);
    engine.handle_callee_response(&session_id, &ok).await.unwrap();

    {
        let session = session_handle.read().await;
        assert_eq!(session.status, callcore_b2bua::SessionStatus::Connected);
        assert!(session.connect_time.is_some());
    }
    assert_eq!(transport.sent.lock().unwrap().len(), 2, "200 OK should be relayed to the caller");

    let mut bye = Request::new(Method::Bye, "sip:alice@192.0.2.1");
    bye.headers.set(HeaderName::CALL_ID, "call-1");
    bye.headers.set(HeaderName::CSEQ, "2 BYE");
    engine.handle_caller_bye(&session_id, &bye).await.unwrap();

    let session = session_handle.read().await;
    assert_eq!(session.status, callcore_b2bua::SessionStatus::Ended);
    assert!(session.end_time.is_some());
}

#[tokio::test]
async fn bridge_creates_session_timer_with_negotiated_expiry_not_default() {
    let (engine, _transport) = harness();
    let mut caller_invite = invite("call-1b", "sip:alice@192.0.2.1", "a-tag", "sip:bob@192.0.2.2", "192.0.2.1:5060");
    caller_invite.headers.set(HeaderName::SESSION_EXPIRES, "600;refresher=uac");

    let session_id = engine.create_session(&caller_invite, "sip:bob@192.0.2.2:5060").await.unwrap();

    let session_handle = engine.get_session(&session_id).unwrap();
    let callee_from_tag = {
        let session = session_handle.read().await;
        session.callee_leg.as_ref().unwrap().from_tag.clone()
    };
    let from_header = format!("<sip:server@sip.local:5060>;tag={callee_from_tag}");
    let ok = ok_with_tag("b-tag", &from_header);
    engine.handle_callee_response(&session_id, &ok).await.unwrap();

    let timer_session = engine.timers().get("call-1b").await.expect("session timer should exist after bridging");
    let seconds = (timer_session.expiry() - chrono::Utc::now()).num_seconds();
    // 600s requested, not the 1800s default_expires the manager would
    // otherwise use, and not a hardcoded constant either.
    assert!((595..=600).contains(&seconds), "expected ~600s from the negotiated Session-Expires, got {seconds}s");
}

#[tokio::test]
async fn simultaneous_hunt_group_first_answer_wins_and_cancels_rest() {
    let (engine, transport) = harness();
    let caller_invite = invite("call-2", "sip:alice@192.0.2.1", "a-tag", "sip:2000@sip.local", "192.0.2.1:5060");

    let mut group = HuntGroup::new("2000", HuntGroupStrategy::Simultaneous);
    group.members.push(Member::new(1, "2001"));
    group.members.push(Member::new(2, "2002"));

    let session_id = engine.create_hunt_group_session(&caller_invite, &group).await.unwrap();
    assert_eq!(transport.sent.lock().unwrap().len(), 2, "both members should be invited at once");

    let leg_id = {
        let session = engine.get_session(&session_id).unwrap();
        let session = session.read().await;
        session.pending_legs.values().next().unwrap().id.clone()
    };

    let answer = ok_with_tag("winner-tag", "<sip:alice@192.0.2.1>;tag=a-tag");
    engine.handle_member_response(&session_id, &leg_id, &answer).await.unwrap();

    // one CANCEL for the losing member plus the OK relayed to the caller
    assert_eq!(transport.sent.lock().unwrap().len(), 4);

    let session = engine.get_session(&session_id).unwrap();
    let session = session.read().await;
    assert_eq!(session.status, callcore_b2bua::SessionStatus::Connected);
    assert!(session.pending_legs.is_empty());
    assert_eq!(session.answered_leg_id, Some(leg_id));
}

#[tokio::test]
async fn sequential_hunt_group_advances_on_failure_and_aggregates_final_error() {
    let (engine, transport) = harness();
    let caller_invite = invite("call-3", "sip:alice@192.0.2.1", "a-tag", "sip:2000@sip.local", "192.0.2.1:5060");

    let mut group = HuntGroup::new("2000", HuntGroupStrategy::Sequential);
    group.members.push(Member::new(1, "2001"));
    group.members.push(Member::new(2, "2002"));

    let session_id = engine.create_hunt_group_session(&caller_invite, &group).await.unwrap();
    assert_eq!(transport.sent.lock().unwrap().len(), 1, "sequential hunt only tries the first member");

    let first_leg_id = {
        let session = engine.get_session(&session_id).unwrap();
        let session = session.read().await;
        session.pending_legs.values().next().unwrap().id.clone()
    };

    let mut busy = Response::new(486, "Busy Here");
    busy.source_addr = Some("192.0.2.3:5060".parse().unwrap());
    engine.handle_member_response(&session_id, &first_leg_id, &busy).await.unwrap();
    assert_eq!(transport.sent.lock().unwrap().len(), 2, "second member should now be tried");

    let second_leg_id = {
        let session = engine.get_session(&session_id).unwrap();
        let session = session.read().await;
        session.pending_legs.values().next().unwrap().id.clone()
    };

    let mut not_found = Response::new(404, "Not Found");
    not_found.source_addr = Some("192.0.2.4:5060".parse().unwrap());
    engine.handle_member_response(&session_id, &second_leg_id, &not_found).await.unwrap();

    let session = engine.get_session(&session_id).unwrap();
    let session = session.read().await;
    assert_eq!(session.status, callcore_b2bua::SessionStatus::Failed);
}

#[tokio::test]
async fn late_2xx_after_cancel_is_byed_not_promoted() {
    let (engine, transport) = harness();
    let caller_invite = invite("call-4", "sip:alice@192.0.2.1", "a-tag", "sip:2000@sip.local", "192.0.2.1:5060");

    let mut group = HuntGroup::new("2000", HuntGroupStrategy::Simultaneous);
    group.members.push(Member::new(1, "2001"));
    group.members.push(Member::new(2, "2002"));

    let session_id = engine.create_hunt_group_session(&caller_invite, &group).await.unwrap();

    let mut leg_ids: VecDeque<_> = {
        let session = engine.get_session(&session_id).unwrap();
        let session = session.read().await;
        session.pending_legs.keys().cloned().collect()
    };
    let winner = leg_ids.pop_front().unwrap();
    let loser = leg_ids.pop_front().unwrap();

    let first_answer = ok_with_tag("winner-tag", "<sip:alice@192.0.2.1>;tag=a-tag");
    engine.handle_member_response(&session_id, &winner, &first_answer).await.unwrap();

    let sent_before_late_answer = transport.sent.lock().unwrap().len();

    let late_answer = ok_with_tag("late-tag", "<sip:alice@192.0.2.1>;tag=a-tag");
    engine.handle_member_response(&session_id, &loser, &late_answer).await.unwrap();

    assert_eq!(transport.sent.lock().unwrap().len(), sent_before_late_answer + 1, "late winner gets a BYE, not a bridge");

    let session = engine.get_session(&session_id).unwrap();
    let session = session.read().await;
    assert_eq!(session.answered_leg_id, Some(winner));
}

#[tokio::test]
async fn ending_a_session_removes_its_session_timer() {
    let (engine, _transport) = harness();
    let caller_invite = invite("call-5", "sip:alice@192.0.2.1", "a-tag", "sip:bob@192.0.2.2", "192.0.2.1:5060");
    let session_id = engine.create_session(&caller_invite, "sip:bob@192.0.2.2:5060").await.unwrap();

    engine.end_session(&session_id, EndReason::Error, callcore_b2bua::EndedBy::System).await.unwrap();
    let session = engine.get_session(&session_id).unwrap();
    let session = session.read().await;
    assert_eq!(session.status, callcore_b2bua::SessionStatus::Failed);

    // Ending twice must stay idempotent (spec boundary behavior).
    drop(session);
    engine.end_session(&session_id, EndReason::Bye, callcore_b2bua::EndedBy::Caller).await.unwrap();
    let session = engine.get_session(&session_id).unwrap();
    let session = session.read().await;
    assert_eq!(session.status, callcore_b2bua::SessionStatus::Failed, "first termination reason wins");
}

async fn connected_call(call_id: &str) -> (Arc<B2buaEngine>, Arc<RecordingTransport>, callcore_b2bua::SessionId) {
    let (engine, transport) = harness();
    let caller_invite = invite(call_id, "sip:alice@192.0.2.1", "a-tag", "sip:bob@192.0.2.2", "192.0.2.1:5060");
    let session_id = engine.create_session(&caller_invite, "sip:bob@192.0.2.2:5060").await.unwrap();

    let session_handle = engine.get_session(&session_id).unwrap();
    let callee_from_tag = {
        let session = session_handle.read().await;
        session.callee_leg.as_ref().unwrap().from_tag.clone()
    };
    let from_header = format!("<sip:server@sip.local:5060>;tag={callee_from_tag}");
    let ok = ok_with_tag("b-tag", &from_header);
    engine.handle_callee_response(&session_id, &ok).await.unwrap();

    (engine, transport, session_id)
}

#[tokio::test]
async fn other_caller_method_is_adapted_and_forwarded_to_callee() {
    let (engine, transport) = connected_call("call-6").await;
    let sent_before = transport.sent.lock().unwrap().len();

    let mut info = Request::new(Method::Info, "sip:bob@192.0.2.2");
    info.headers.set(HeaderName::CALL_ID, "call-6");
    info.headers.set(HeaderName::CSEQ, "2 INFO");
    engine.handle_caller_other(&engine.find_session_id_by_call_id("call-6").unwrap(), &info).await.unwrap();

    assert_eq!(transport.sent.lock().unwrap().len(), sent_before + 1, "non-dialog-terminating method is forwarded to the callee leg");
}

#[tokio::test]
async fn callee_originated_bye_is_translated_to_caller_and_ends_session() {
    let (engine, transport) = connected_call("call-7").await;
    let session_id = engine.find_session_id_by_call_id("call-7").unwrap();
    let sent_before = transport.sent.lock().unwrap().len();

    let callee_call_id = {
        let session = engine.get_session(&session_id).unwrap();
        let session = session.read().await;
        session.callee_leg.as_ref().unwrap().call_id.clone()
    };
    let mut bye = Request::new(Method::Bye, "sip:server@sip.local:5060");
    bye.headers.set(HeaderName::CALL_ID, &callee_call_id);
    bye.headers.set(HeaderName::CSEQ, "2 BYE");

    engine.handle_callee_request(&session_id, &bye).await.unwrap();

    assert_eq!(transport.sent.lock().unwrap().len(), sent_before + 1, "BYE translated onto the caller leg");
    let session = engine.get_session(&session_id).unwrap();
    let session = session.read().await;
    assert_eq!(session.status, callcore_b2bua::SessionStatus::Ended);
}
