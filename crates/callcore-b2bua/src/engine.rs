use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use callcore_dialog::DialogRegistry;
use callcore_headers::{extract_tag, extract_uri, generate_branch, parse_cseq};
use callcore_message::{HeaderName, Message, Method, Request, Response};
use callcore_timer::SessionTimerManager;

use crate::adapt::{adapt_request_for_leg, build_cancel};
use crate::aggregator::ErrorAggregator;
use crate::collaborators::{emit_request, emit_response, MessageParser, Transport, TransactionSource, UserStore};
use crate::config::B2buaConfig;
use crate::destination::resolve_destination;
use crate::error::{B2buaError, B2buaResult};
use crate::huntgroup::{HuntGroup, Member};
use crate::ids::{LegId, SessionId};
use crate::leg::{CallLeg, LegStatus};
use crate::session::{B2BUASession, SessionStatus};
use crate::stats::{EndReason, EndedBy, StatisticsCollector};

fn generate_tag() -> String {
    generate_branch().trim_start_matches("z9hG4bK").to_string()
}

/// Mangle an SDP body for the opposite leg's address. Bodies that
/// don't parse as SDP (empty INVITE, unrelated body) are passed through
/// unchanged — mangling failure is not itself a validation concern here,
/// `callcore-validate`'s pipeline is where malformed bodies get rejected.
fn mangle_sdp(body: &[u8], server_host: &str) -> Vec<u8> {
    if body.is_empty() {
        return body.to_vec();
    }
    let Ok(text) = std::str::from_utf8(body) else {
        return body.to_vec();
    };
    let Ok(parsed) = callcore_sdp::parse(text) else {
        return body.to_vec();
    };
    let address = server_host.split(':').next().unwrap_or(server_host);
    let mangled = callcore_sdp::mangle_for_b2bua(&parsed, address, None);
    callcore_sdp::generate(&mangled).into_bytes()
}

/// The B2BUA & hunt engine: session lifecycle, cross-leg message
/// adaptation, hunt-group forking, error aggregation, and statistics.
///
/// Owns three secondary indexes (`SessionID -> Session`, `Call-ID ->
/// Session`, `LegID -> Session`) as `DashMap`s — an arena model that
/// resolves the Session<->Leg cyclic reference: legs live inside their
/// owning session, and every index stores only a `SessionId`, never a
/// leg pointer.
pub struct B2buaEngine {
    config: B2buaConfig,
    dialogs: Arc<DialogRegistry>,
    timers: Arc<SessionTimerManager>,
    transport: Arc<dyn Transport>,
    parser: Arc<dyn MessageParser>,
    transactions: Arc<dyn TransactionSource>,
    #[allow(dead_code)]
    user_store: Arc<dyn UserStore>,
    sessions: DashMap<SessionId, Arc<RwLock<B2BUASession>>>,
    sessions_by_call_id: DashMap<String, SessionId>,
    sessions_by_leg_id: DashMap<LegId, SessionId>,
    aggregators: DashMap<SessionId, Arc<RwLock<ErrorAggregator>>>,
    /// Members not yet tried in a Sequential (or RoundRobin/LongestIdle,
    /// which currently alias to the same walk) hunt-group fork.
    sequential_remaining: DashMap<SessionId, VecDeque<Member>>,
    ring_timeout_stop: DashMap<SessionId, Arc<AtomicBool>>,
    stats: StatisticsCollector,
    cleanup_running: Arc<AtomicBool>,
}

impl B2buaEngine {
    pub fn new(
        config: B2buaConfig,
        dialogs: Arc<DialogRegistry>,
        timers: Arc<SessionTimerManager>,
        transport: Arc<dyn Transport>,
        parser: Arc<dyn MessageParser>,
        transactions: Arc<dyn TransactionSource>,
        user_store: Arc<dyn UserStore>,
    ) -> Arc<Self> {
        Arc::new(B2buaEngine {
            config,
            dialogs,
            timers,
            transport,
            parser,
            transactions,
            user_store,
            sessions: DashMap::new(),
            sessions_by_call_id: DashMap::new(),
            sessions_by_leg_id: DashMap::new(),
            aggregators: DashMap::new(),
            sequential_remaining: DashMap::new(),
            ring_timeout_stop: DashMap::new(),
            stats: StatisticsCollector::new(),
            cleanup_running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn stats(&self) -> &StatisticsCollector {
        &self.stats
    }

    pub fn timers(&self) -> &Arc<SessionTimerManager> {
        &self.timers
    }

    /// Install the Session-Timer Manager's termination callback as a
    /// weak reference that does not assume the session still exists.
    /// `Arc::downgrade` is the mechanism: if this engine has already been
    /// dropped by the time the timer fires, `upgrade()` returns `None`
    /// and the callback is simply a no-op.
    pub async fn install_termination_callback(self: &Arc<Self>) {
        let weak: Weak<B2buaEngine> = Arc::downgrade(self);
        self.timers
            .set_termination_callback(move |call_id| {
                if let Some(engine) = weak.upgrade() {
                    tokio::spawn(async move {
                        engine.handle_timer_expiry(&call_id).await;
                    });
                }
            })
            .await;
    }

    async fn handle_timer_expiry(&self, call_id: &str) {
        if let Some(session_id) = self.find_session_id_by_call_id(call_id) {
            debug!(%call_id, session_id = %session_id, "session timer expired");
            if let Err(err) = self.end_session(&session_id, EndReason::Timeout, EndedBy::System).await {
                warn!(%call_id, %err, "failed to end session on timer expiry");
            }
        }
    }

    // -- Lookups -----------------------------------------------------

    pub fn get_session(&self, id: &SessionId) -> Option<Arc<RwLock<B2BUASession>>> {
        self.sessions.get(id).map(|e| e.value().clone())
    }

    pub fn find_session_id_by_call_id(&self, call_id: &str) -> Option<SessionId> {
        self.sessions_by_call_id.get(call_id).map(|e| e.value().clone())
    }

    pub fn find_session_id_by_leg_id(&self, leg_id: &LegId) -> Option<SessionId> {
        self.sessions_by_leg_id.get(leg_id).map(|e| e.value().clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// All session IDs currently indexed, regardless of status. Used by
    /// the facade's shutdown sequence to end every active session
    /// without reaching into the engine's private maps, the same
    /// enumeration role `DialogRegistry::list_dialogs` plays for C3.
    pub fn active_session_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    fn index_session(&self, session: &B2BUASession) {
        self.sessions_by_call_id.insert(session.caller_leg.call_id.clone(), session.id.clone());
        for leg_id in session.leg_ids() {
            self.sessions_by_leg_id.insert(leg_id, session.id.clone());
        }
    }

    fn index_leg(&self, session_id: &SessionId, call_id: &str, leg_id: &LegId) {
        self.sessions_by_call_id.insert(call_id.to_string(), session_id.clone());
        self.sessions_by_leg_id.insert(leg_id.clone(), session_id.clone());
    }

    fn deindex_leg(&self, call_id: &str, leg_id: &LegId) {
        self.sessions_by_call_id.remove(call_id);
        self.sessions_by_leg_id.remove(leg_id);
    }

    fn deindex_session(&self, session: &B2BUASession) {
        self.sessions_by_call_id.remove(&session.caller_leg.call_id);
        if let Some(callee) = &session.callee_leg {
            self.sessions_by_call_id.remove(&callee.call_id);
        }
        for leg in session.pending_legs.values() {
            self.sessions_by_call_id.remove(&leg.call_id);
        }
        for leg_id in session.leg_ids() {
            self.sessions_by_leg_id.remove(&leg_id);
        }
    }

    async fn send_request(&self, request: &Request, destination: Option<SocketAddr>) -> B2buaResult<()> {
        let destination = destination.ok_or_else(|| B2buaError::ExternalFailure("no resolvable destination for outbound request".to_string()))?;
        emit_request(self.parser.as_ref(), self.transport.as_ref(), request, destination).await.map_err(|e| B2buaError::ExternalFailure(e.to_string()))
    }

    async fn send_response(&self, response: &Response, destination: Option<SocketAddr>) -> B2buaResult<()> {
        let destination = destination.ok_or_else(|| B2buaError::ExternalFailure("no resolvable destination for outbound response".to_string()))?;
        emit_response(self.parser.as_ref(), self.transport.as_ref(), response, destination).await.map_err(|e| B2buaError::ExternalFailure(e.to_string()))
    }

    // -- Session creation ----------------------------------------------

    /// `CreateSession(callerINVITE, calleeURI)`: builds both legs,
    /// creates both dialogs, then immediately forwards the INVITE onto
    /// the callee leg so a single call covers the whole of "caller dials
    /// a direct destination".
    pub async fn create_session(&self, caller_invite: &Request, callee_uri: &str) -> B2buaResult<SessionId> {
        let now = Utc::now();

        let call_id = caller_invite.call_id().ok_or_else(|| B2buaError::InvalidInput("INVITE missing Call-ID".to_string()))?.to_string();
        let from = caller_invite.header(HeaderName::FROM).ok_or_else(|| B2buaError::InvalidInput("INVITE missing From".to_string()))?;
        let to = caller_invite.header(HeaderName::TO).ok_or_else(|| B2buaError::InvalidInput("INVITE missing To".to_string()))?;

        let caller_from_uri = extract_uri(from);
        let caller_from_tag = extract_tag(from).unwrap_or_default();
        let caller_to_uri = extract_uri(to);
        let local_tag = extract_tag(to).unwrap_or_else(generate_tag);
        let caller_contact = caller_invite.header(HeaderName::CONTACT).map(extract_uri).unwrap_or_else(|| caller_from_uri.clone());

        // Caller dialog: the server is UAS, so "local" is the To side.
        let caller_dialog_id = self.dialogs.create_dialog(&call_id, &caller_to_uri, &caller_from_uri, &local_tag, &caller_from_tag);

        let mut caller_leg = CallLeg::new(call_id.clone(), caller_from_uri.clone(), caller_from_tag, caller_to_uri, local_tag, caller_contact);
        caller_leg.dialog_id = Some(caller_dialog_id);
        caller_leg.remote_addr = caller_invite.source_addr;
        caller_leg.remote_sdp = sdp_text(&caller_invite.body);
        let (cseq_number, _) = parse_cseq(caller_invite.header(HeaderName::CSEQ).unwrap_or_default());
        if cseq_number > 0 {
            caller_leg.last_cseq = cseq_number;
        }
        caller_leg.status = LegStatus::Proceeding;

        // The inbound INVITE gets its own transaction handle before
        // anything is forwarded, per §6's transaction collaborator.
        let caller_txn = self.transactions.create_transaction(&Message::Request(caller_invite.clone())).await;
        caller_leg.txn_id = Some(caller_txn.id().to_string());

        // Callee dialog: the server is UAC on a fresh Call-ID.
        let callee_call_id = format!("{call_id}-b2b-{}", uuid::Uuid::new_v4());
        let callee_from_tag = generate_tag();
        let callee_dialog_id = self.dialogs.create_dialog(&callee_call_id, &self.config.contact, callee_uri, &callee_from_tag, "");

        let mangled_offer = mangle_sdp(&caller_invite.body, &self.config.server_host);
        let mut callee_leg = CallLeg::new(callee_call_id.clone(), self.config.contact.clone(), callee_from_tag.clone(), callee_uri.to_string(), String::new(), self.config.contact.clone());
        callee_leg.dialog_id = Some(callee_dialog_id);
        callee_leg.local_sdp = sdp_text(&mangled_offer);
        callee_leg.status = LegStatus::Initiating;

        let callee_invite = adapt_request_for_leg(caller_invite, callee_uri, &callee_call_id, &self.config.contact, &callee_from_tag, callee_uri, None, &self.config.contact, 1, &self.config.server_host);
        let mut callee_invite = callee_invite;
        callee_invite.body = mangled_offer;
        callee_invite.headers.set(HeaderName::CONTENT_LENGTH, callee_invite.body.len().to_string());

        // The outbound INVITE gets its own transaction before it is sent;
        // the A-leg/B-leg pairing is keyed on the two transaction ids
        // (not the Call-IDs) per §3's `TransactionCorrelation` shape.
        let callee_txn = self.transactions.create_transaction(&Message::Request(callee_invite.clone())).await;
        callee_leg.txn_id = Some(callee_txn.id().to_string());
        self.dialogs.create_correlation(caller_txn.id(), callee_txn.id(), Method::Invite);

        let destination = resolve_destination(None, callee_uri);

        // Negotiated Session-Expires starts from whatever the caller's
        // INVITE requested; §4.6.7 asks `bridge()` to create the
        // Session-Timer entry "with the negotiated expiry", and C4's own
        // contract (§4.4) falls back to `default_expires` when a request
        // omits the header. The callee's final 2xx may override this
        // below (`handle_callee_response`) before bridging reads it back.
        let requested_expires = caller_invite
            .header(HeaderName::SESSION_EXPIRES)
            .and_then(callcore_headers::parse_session_expires)
            .map(|(seconds, _)| seconds)
            .unwrap_or(self.timers.config().default_expires);

        let mut session = B2BUASession::new(caller_leg, sdp_text(&caller_invite.body), now);
        session.callee_leg = Some(callee_leg);
        session.status = SessionStatus::Initiating;
        session.session_expires_secs = requested_expires;
        let session_id = session.id.clone();

        self.sessions.insert(session_id.clone(), Arc::new(RwLock::new(session)));
        if let Some(entry) = self.sessions.get(&session_id) {
            let guard = entry.value().read().await;
            self.index_session(&guard);
        }

        self.stats.start(session_id.clone(), caller_from_uri_placeholder(caller_invite), callee_uri.to_string(), None, now).await;

        self.send_request(&callee_invite, destination).await?;
        Ok(session_id)
    }

    // -- Hunt-group forking ---------------------------------------------

    pub async fn create_hunt_group_session(self: &Arc<Self>, caller_invite: &Request, hunt_group: &HuntGroup) -> B2buaResult<SessionId> {
        let now = Utc::now();
        let call_id = caller_invite.call_id().ok_or_else(|| B2buaError::InvalidInput("INVITE missing Call-ID".to_string()))?.to_string();
        let from = caller_invite.header(HeaderName::FROM).ok_or_else(|| B2buaError::InvalidInput("INVITE missing From".to_string()))?;
        let to = caller_invite.header(HeaderName::TO).ok_or_else(|| B2buaError::InvalidInput("INVITE missing To".to_string()))?;

        let caller_from_uri = extract_uri(from);
        let caller_from_tag = extract_tag(from).unwrap_or_default();
        let caller_to_uri = extract_uri(to);
        let local_tag = extract_tag(to).unwrap_or_else(generate_tag);
        let caller_contact = caller_invite.header(HeaderName::CONTACT).map(extract_uri).unwrap_or_else(|| caller_from_uri.clone());

        let caller_dialog_id = self.dialogs.create_dialog(&call_id, &caller_to_uri, &caller_from_uri, &local_tag, &caller_from_tag);
        let mut caller_leg = CallLeg::new(call_id.clone(), caller_from_uri.clone(), caller_from_tag, caller_to_uri, local_tag, caller_contact);
        caller_leg.dialog_id = Some(caller_dialog_id);
        caller_leg.remote_addr = caller_invite.source_addr;
        caller_leg.remote_sdp = sdp_text(&caller_invite.body);
        caller_leg.status = LegStatus::Proceeding;

        let caller_txn = self.transactions.create_transaction(&Message::Request(caller_invite.clone())).await;
        caller_leg.txn_id = Some(caller_txn.id().to_string());

        let requested_expires = caller_invite
            .header(HeaderName::SESSION_EXPIRES)
            .and_then(callcore_headers::parse_session_expires)
            .map(|(seconds, _)| seconds)
            .unwrap_or(self.timers.config().default_expires);

        let mut session = B2BUASession::new(caller_leg, sdp_text(&caller_invite.body), now);
        session.hunt_group_id = Some(hunt_group.id.clone());
        session.status = SessionStatus::Initiating;
        session.session_expires_secs = requested_expires;
        let session_id = session.id.clone();

        self.sessions.insert(session_id.clone(), Arc::new(RwLock::new(session)));
        if let Some(entry) = self.sessions.get(&session_id) {
            let guard = entry.value().read().await;
            self.index_session(&guard);
        }
        self.stats.start(session_id.clone(), caller_from_uri_placeholder(caller_invite), hunt_group.extension.clone(), Some(hunt_group.id.clone()), now).await;

        let members = hunt_group.ordered_enabled_members();
        self.aggregators.insert(session_id.clone(), Arc::new(RwLock::new(ErrorAggregator::new(members.len()))));

        if hunt_group.strategy.is_simultaneous() {
            for member in &members {
                self.add_pending_leg_and_invite(&session_id, member).await?;
            }
        } else {
            let mut queue: VecDeque<Member> = members.into_iter().cloned().collect();
            if let Some(first) = queue.pop_front() {
                self.add_pending_leg_and_invite(&session_id, &first).await?;
            }
            self.sequential_remaining.insert(session_id.clone(), queue);
        }

        if hunt_group.ring_timeout_secs > 0 {
            self.arm_ring_timeout(session_id.clone(), hunt_group.ring_timeout_secs).await;
        }

        Ok(session_id)
    }

    /// Allocate a new pending leg for one hunt-group member, carrying
    /// the session's SDP offer as its local SDP, and send the INVITE.
    async fn add_pending_leg_and_invite(&self, session_id: &SessionId, member: &Member) -> B2buaResult<LegId> {
        let entry = self.sessions.get(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?.value().clone();
        let mut session = entry.write().await;

        let member_call_id = format!("{}-hunt-{}", session.caller_leg.call_id, uuid::Uuid::new_v4());
        let from_tag = generate_tag();
        let member_uri = format!("sip:{}", member.extension);

        let mut leg = CallLeg::new(member_call_id.clone(), self.config.contact.clone(), from_tag.clone(), member_uri.clone(), String::new(), self.config.contact.clone());
        leg.local_sdp = session.sdp_offer.clone();
        leg.status = LegStatus::Initiating;
        let leg_id = leg.id.clone();

        let member_dialog_id = self.dialogs.create_dialog(&member_call_id, &self.config.contact, &member_uri, &from_tag, "");
        leg.dialog_id = Some(member_dialog_id);

        session.pending_legs.insert(leg_id.clone(), leg);
        session.touch(Utc::now());
        self.index_leg(session_id, &member_call_id, &leg_id);
        drop(session);

        let mut invite = Request::new(Method::Invite, &member_uri);
        invite.headers.set(HeaderName::CALL_ID, &member_call_id);
        invite.headers.set(HeaderName::FROM, callcore_headers::build_address(&self.config.contact, None, Some(&from_tag)));
        invite.headers.set(HeaderName::TO, callcore_headers::build_address(&member_uri, None, None));
        invite.headers.set(HeaderName::CONTACT, callcore_headers::build_address(&self.config.contact, None, None));
        invite.headers.set(HeaderName::CSEQ, "1 INVITE");
        invite.headers.set(HeaderName::VIA, crate::adapt::via_header(&self.config.server_host));
        invite.headers.set(HeaderName::MAX_FORWARDS, "70");
        if let Some(sdp) = entry.read().await.sdp_offer.clone() {
            invite = invite.with_body(sdp.into_bytes());
        }

        let member_txn = self.transactions.create_transaction(&Message::Request(invite.clone())).await;
        if let Some(pending) = entry.write().await.pending_legs.get_mut(&leg_id) {
            pending.txn_id = Some(member_txn.id().to_string());
        }

        let destination = resolve_destination(None, &member_uri);
        self.send_request(&invite, destination).await?;
        Ok(leg_id)
    }

    pub async fn handle_member_response(&self, session_id: &SessionId, leg_id: &LegId, response: &Response) -> B2buaResult<()> {
        if let Some(txn) = self.transactions.find_transaction(&Message::Response(response.clone())).await {
            debug!(session_id = %session_id, leg_id = %leg_id, txn_id = %txn.id(), "matched member response to transaction");
        }
        if response.is_provisional() {
            return self.handle_member_provisional(session_id, leg_id, response).await;
        }
        if response.is_success() {
            return self.handle_member_success(session_id, leg_id, response).await;
        }
        self.handle_member_failure(session_id, leg_id, response.status).await
    }

    async fn handle_member_provisional(&self, session_id: &SessionId, leg_id: &LegId, response: &Response) -> B2buaResult<()> {
        let entry = self.sessions.get(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?.value().clone();
        let mut session = entry.write().await;
        if let Some(leg) = session.pending_legs.get_mut(leg_id) {
            leg.remote_addr = response.source_addr;
            if response.status == 180 {
                leg.status = LegStatus::Ringing;
                if session.status == SessionStatus::Initiating {
                    session.status = SessionStatus::Ringing;
                }
            }
        }
        Ok(())
    }

    /// First 2xx wins: promote the leg, cancel the rest, bridge. A 2xx
    /// arriving after an answer was already chosen is a cancellation
    /// race — it must BYE the late winner rather than promote it.
    async fn handle_member_success(&self, session_id: &SessionId, leg_id: &LegId, response: &Response) -> B2buaResult<()> {
        let entry = self.sessions.get(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?.value().clone();

        let already_answered = {
            let session = entry.read().await;
            session.answered_leg_id.is_some()
        };

        if already_answered {
            self.bye_stray_leg(session_id, leg_id, response).await?;
            return Ok(());
        }

        {
            let mut session = entry.write().await;
            if let Some(leg) = session.pending_legs.get_mut(leg_id) {
                leg.remote_addr = response.source_addr;
                if let Some(to) = response.header(HeaderName::TO) {
                    if let Some(tag) = extract_tag(to) {
                        leg.to_tag = tag;
                    }
                }
                if let Some(dialog_id) = leg.dialog_id.clone() {
                    if let Some(to) = response.header(HeaderName::TO) {
                        if let Some(tag) = extract_tag(to) {
                            let _ = self.dialogs.latch_remote_tag(&dialog_id, &tag).await;
                        }
                    }
                    if let Some(contact) = response.header(HeaderName::CONTACT).map(extract_uri) {
                        let _ = self.dialogs.set_remote_target(&dialog_id, &contact).await;
                    }
                    let _ = self.dialogs.confirm(&dialog_id).await;
                }
                leg.remote_sdp = sdp_text(&response.body);
            }
            session.set_answered_leg(leg_id, Utc::now())?;
            if let Some(seconds) = response.header(HeaderName::SESSION_EXPIRES).and_then(callcore_headers::parse_session_expires).map(|(seconds, _)| seconds) {
                session.session_expires_secs = seconds;
            }
        }

        self.cancel_pending_legs(session_id, Some(leg_id)).await?;
        self.bridge(session_id).await?;
        Ok(())
    }

    /// A 200 arriving on a leg that was already CANCELed: acknowledge it
    /// honestly with a BYE so the stray leg tears down, without
    /// disturbing the already-answered `callee_leg`.
    async fn bye_stray_leg(&self, session_id: &SessionId, leg_id: &LegId, response: &Response) -> B2buaResult<()> {
        warn!(session_id = %session_id, leg_id = %leg_id, "late 2xx after hunt-group answer; sending BYE to close stray leg");
        let entry = self.sessions.get(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?.value().clone();
        let session = entry.read().await;
        let Some(leg) = session.pending_legs.get(leg_id).cloned() else {
            return Ok(());
        };
        drop(session);

        let to_tag = response.header(HeaderName::TO).and_then(extract_tag);
        let request_uri = response.header(HeaderName::CONTACT).map(|c| extract_uri(c)).unwrap_or_else(|| leg.to_uri.clone());
        let bye = adapt_request_for_leg(&Request::new(Method::Bye, &request_uri), &request_uri, &leg.call_id, &leg.from_uri, &leg.from_tag, &leg.to_uri, to_tag.as_deref(), &self.config.contact, leg.last_cseq + 1, &self.config.server_host);
        let destination = resolve_destination(response.source_addr, &leg.to_uri);
        self.send_request(&bye, destination).await?;

        let mut session = entry.write().await;
        session.pending_legs.remove(leg_id);
        if let Some(dialog_id) = &leg.dialog_id {
            self.dialogs.terminate(dialog_id).await;
        }
        self.deindex_leg(&leg.call_id, leg_id);
        Ok(())
    }

    async fn handle_member_failure(&self, session_id: &SessionId, leg_id: &LegId, status: u16) -> B2buaResult<()> {
        let entry = self.sessions.get(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?.value().clone();
        {
            let mut session = entry.write().await;
            if let Some(leg) = session.pending_legs.remove(leg_id) {
                if let Some(dialog_id) = &leg.dialog_id {
                    self.dialogs.terminate(dialog_id).await;
                }
                self.deindex_leg(&leg.call_id, leg_id);
            }
        }

        if let Some(aggregator) = self.aggregators.get(session_id).map(|e| e.value().clone()) {
            let mut guard = aggregator.write().await;
            guard.record(status);
        }

        // Sequential walk: advance to the next member on a non-success
        // final response.
        if self.sequential_remaining.contains_key(session_id) {
            self.fork_next_sequential(session_id).await?;
        }

        self.maybe_conclude_hunt(session_id).await?;
        Ok(())
    }

    async fn fork_next_sequential(&self, session_id: &SessionId) -> B2buaResult<()> {
        let next = {
            let mut queue = self.sequential_remaining.get_mut(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?;
            queue.pop_front()
        };
        if let Some(member) = next {
            self.add_pending_leg_and_invite(session_id, &member).await?;
        }
        Ok(())
    }

    /// Once every initial member has reported (and no sequential member
    /// remains to try), build the aggregator's verdict and fail the
    /// session.
    async fn maybe_conclude_hunt(&self, session_id: &SessionId) -> B2buaResult<()> {
        let remaining_sequential = self.sequential_remaining.get(session_id).map(|q| !q.is_empty()).unwrap_or(false);
        if remaining_sequential {
            return Ok(());
        }
        let still_pending = self.get_session(session_id).map(|s| {
            let session = s.try_read().ok();
            session.map(|s| !s.pending_legs.is_empty()).unwrap_or(true)
        });
        if still_pending.unwrap_or(true) {
            return Ok(());
        }

        let Some(aggregator) = self.aggregators.get(session_id).map(|e| e.value().clone()) else {
            return Ok(());
        };
        let complete = aggregator.read().await.is_complete();
        if !complete {
            return Ok(());
        }

        let (code, reason) = aggregator.read().await.best_error_response();
        self.respond_to_caller_with_failure(session_id, code, reason).await?;
        self.end_session(session_id, EndReason::Error, EndedBy::System).await?;
        Ok(())
    }

    async fn respond_to_caller_with_failure(&self, session_id: &SessionId, code: u16, reason: &str) -> B2buaResult<()> {
        let entry = self.sessions.get(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?.value().clone();
        let session = entry.read().await;
        let response = self.build_caller_response(&session, code, reason);
        let destination = session.caller_leg.remote_addr;
        drop(session);
        self.send_response(&response, destination).await
    }

    fn build_caller_response(&self, session: &B2BUASession, code: u16, reason: &str) -> Response {
        let mut response = Response::new(code, reason);
        response.headers.set(HeaderName::CALL_ID, &session.caller_leg.call_id);
        response.headers.set(HeaderName::FROM, callcore_headers::build_address(&session.caller_leg.from_uri, None, Some(&session.caller_leg.from_tag)));
        response.headers.set(HeaderName::TO, callcore_headers::build_address(&session.caller_leg.to_uri, None, Some(&session.caller_leg.to_tag)));
        response.headers.set(HeaderName::CONTACT, callcore_headers::build_address(&self.config.contact, None, None));
        response.headers.set(HeaderName::CONTENT_LENGTH, "0");
        response
    }

    /// CANCEL every pending leg other than `except`, removing each from
    /// the session and its indexes.
    async fn cancel_pending_legs(&self, session_id: &SessionId, except: Option<&LegId>) -> B2buaResult<()> {
        let entry = self.sessions.get(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?.value().clone();

        let to_cancel: Vec<CallLeg> = {
            let session = entry.read().await;
            session.pending_legs.values().filter(|leg| Some(&leg.id) != except).cloned().collect()
        };

        for leg in &to_cancel {
            let cancel = build_cancel(&leg.to_uri, &leg.call_id, &leg.from_uri, &leg.from_tag, &leg.to_uri, None, leg.last_cseq, &self.config.server_host);
            let destination = resolve_destination(leg.remote_addr, &leg.to_uri);
            if let Err(err) = self.send_request(&cancel, destination).await {
                warn!(%err, leg_id = %leg.id, "failed to send CANCEL to pending leg");
            }
            if let Some(dialog_id) = &leg.dialog_id {
                self.dialogs.terminate(dialog_id).await;
            }
        }

        let mut session = entry.write().await;
        for leg in &to_cancel {
            session.pending_legs.remove(&leg.id);
        }
        session.touch(Utc::now());
        drop(session);

        for leg in &to_cancel {
            self.deindex_leg(&leg.call_id, &leg.id);
        }
        Ok(())
    }

    // -- Bridging --------------------------------------------------------

    pub async fn bridge(&self, session_id: &SessionId) -> B2buaResult<()> {
        let entry = self.sessions.get(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?.value().clone();

        let (call_id, expires) = {
            let mut session = entry.write().await;
            session.bridge(Utc::now())?;
            if let Some(dialog_id) = session.caller_leg.dialog_id.clone() {
                self.dialogs.confirm(&dialog_id).await.ok();
            }
            (session.caller_leg.call_id.clone(), session.session_expires_secs)
        };

        self.cancel_hunt_group_timeout(session_id);
        self.timers.create(&call_id, expires).await;
        self.stats.connect(session_id, self.answering_member_extension(session_id).await, Utc::now()).await;
        Ok(())
    }

    async fn answering_member_extension(&self, session_id: &SessionId) -> Option<String> {
        let session = self.get_session(session_id)?;
        let session = session.read().await;
        session.callee_leg.as_ref().map(|leg| leg.to_uri.clone())
    }

    // -- Caller-originated in-dialog requests ---------------------------

    pub async fn handle_caller_bye(&self, session_id: &SessionId, request: &Request) -> B2buaResult<()> {
        let entry = self.sessions.get(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?.value().clone();
        let session = entry.read().await;
        let caller_dialog_id = session.caller_leg.dialog_id.clone();
        let callee_leg = session.callee_leg.clone();
        let caller_destination = session.caller_leg.remote_addr;
        drop(session);

        let (bye_cseq, _) = parse_cseq(request.header(HeaderName::CSEQ).unwrap_or_default());
        if let Some(dialog_id) = &caller_dialog_id {
            self.dialogs.update_remote_cseq(dialog_id, bye_cseq).await?;
        }

        if let Some(callee) = &callee_leg {
            if let Some(callee_dialog_id) = &callee.dialog_id {
                let next_cseq = self.dialogs.next_local_cseq(callee_dialog_id).await?;
                let dialog_handle = self.dialogs.find(callee_dialog_id);
                let (to_tag, request_uri) = if let Some(handle) = dialog_handle {
                    let dialog = handle.read().await;
                    let request_uri = dialog.remote_target().map(str::to_string).unwrap_or_else(|| callee.to_uri.clone());
                    (Some(dialog.remote_tag().to_string()).filter(|t| !t.is_empty()), request_uri)
                } else {
                    (None, callee.to_uri.clone())
                };
                let callee_bye = adapt_request_for_leg(request, &request_uri, &callee.call_id, &callee.from_uri, &callee.from_tag, &callee.to_uri, to_tag.as_deref(), &self.config.contact, next_cseq, &self.config.server_host);
                self.transactions.create_transaction(&Message::Request(callee_bye.clone())).await;
                let destination = resolve_destination(callee.remote_addr, &request_uri);
                self.send_request(&callee_bye, destination).await?;
            }
        }

        // 200 OK to the caller: Via/From/To/CSeq copied, Content-Length 0.
        let mut ok = Response::new(200, "OK");
        for name in [HeaderName::VIA, HeaderName::FROM, HeaderName::TO, HeaderName::CALL_ID, HeaderName::CSEQ] {
            for value in request.headers.get_all(name) {
                ok.headers.append(name, value);
            }
        }
        ok.headers.set(HeaderName::CONTENT_LENGTH, "0");
        self.send_response(&ok, caller_destination).await?;

        if let Some(dialog_id) = &caller_dialog_id {
            self.dialogs.terminate(dialog_id).await;
        }
        if let Some(callee) = &callee_leg {
            if let Some(dialog_id) = &callee.dialog_id {
                self.dialogs.terminate(dialog_id).await;
            }
        }

        self.end_session(session_id, EndReason::Bye, EndedBy::Caller).await?;
        Ok(())
    }

    pub async fn handle_caller_cancel(&self, session_id: &SessionId, request: &Request) -> B2buaResult<()> {
        let entry = self.sessions.get(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?.value().clone();
        let session = entry.read().await;
        let callee_leg = session.callee_leg.clone();
        let caller_destination = session.caller_leg.remote_addr;
        drop(session);

        if let Some(callee) = &callee_leg {
            let cancel = build_cancel(&callee.to_uri, &callee.call_id, &callee.from_uri, &callee.from_tag, &callee.to_uri, None, callee.last_cseq, &self.config.server_host);
            let destination = resolve_destination(callee.remote_addr, &callee.to_uri);
            self.send_request(&cancel, destination).await?;
        }

        let mut ok = Response::new(200, "OK");
        for name in [HeaderName::VIA, HeaderName::FROM, HeaderName::TO, HeaderName::CALL_ID, HeaderName::CSEQ] {
            for value in request.headers.get_all(name) {
                ok.headers.append(name, value);
            }
        }
        ok.headers.set(HeaderName::CONTENT_LENGTH, "0");
        self.send_response(&ok, caller_destination).await?;
        Ok(())
    }

    pub async fn handle_caller_ack(&self, session_id: &SessionId, request: &Request) -> B2buaResult<()> {
        let entry = self.sessions.get(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?.value().clone();
        let session = entry.read().await;
        let Some(callee) = session.callee_leg.clone() else {
            return Ok(());
        };
        drop(session);

        // ACK echoes the INVITE's CSeq number rather than advancing it,
        // per RFC 3261 Section 17.1.1.3.
        let (cseq_number, _) = parse_cseq(request.header(HeaderName::CSEQ).unwrap_or_default());
        let to_tag = Some(callee.to_tag.clone()).filter(|t| !t.is_empty());
        let request_uri = callee.to_uri.clone();
        let ack = adapt_request_for_leg(request, &request_uri, &callee.call_id, &callee.from_uri, &callee.from_tag, &callee.to_uri, to_tag.as_deref(), &self.config.contact, cseq_number, &self.config.server_host);
        let destination = resolve_destination(callee.remote_addr, &request_uri);
        self.send_request(&ack, destination).await
    }

    /// Any caller-originated method other than INVITE/ACK/BYE/CANCEL:
    /// clone, rewrite Call-ID and To, forward onto the callee leg using
    /// the callee dialog's next CSeq.
    pub async fn handle_caller_other(&self, session_id: &SessionId, request: &Request) -> B2buaResult<()> {
        let entry = self.sessions.get(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?.value().clone();
        let session = entry.read().await;
        let Some(callee) = session.callee_leg.clone() else {
            return Ok(());
        };
        drop(session);

        let next_cseq = if let Some(dialog_id) = &callee.dialog_id {
            self.dialogs.next_local_cseq(dialog_id).await?
        } else {
            callee.last_cseq + 1
        };
        let to_tag = Some(callee.to_tag.clone()).filter(|t| !t.is_empty());
        let request_uri = callee.to_uri.clone();
        let adapted = adapt_request_for_leg(request, &request_uri, &callee.call_id, &callee.from_uri, &callee.from_tag, &callee.to_uri, to_tag.as_deref(), &self.config.contact, next_cseq, &self.config.server_host);
        let destination = resolve_destination(callee.remote_addr, &request_uri);
        self.send_request(&adapted, destination).await
    }

    // -- Callee-originated requests --------------------------------------

    /// Callee-originated BYE (or any other in-dialog request) translated
    /// symmetrically onto the caller leg, mirroring the adaptation
    /// rules used in the opposite direction.
    pub async fn handle_callee_request(&self, session_id: &SessionId, request: &Request) -> B2buaResult<()> {
        let entry = self.sessions.get(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?.value().clone();
        let session = entry.read().await;
        let caller_leg = session.caller_leg.clone();
        drop(session);

        let next_cseq = if let Some(dialog_id) = &caller_leg.dialog_id {
            self.dialogs.next_local_cseq(dialog_id).await?
        } else {
            caller_leg.last_cseq + 1
        };
        let to_tag = Some(caller_leg.to_tag.clone()).filter(|t| !t.is_empty());
        let request_uri = caller_leg.to_uri.clone();
        let adapted = adapt_request_for_leg(request, &request_uri, &caller_leg.call_id, &caller_leg.from_uri, &caller_leg.from_tag, &caller_leg.to_uri, to_tag.as_deref(), &self.config.contact, next_cseq, &self.config.server_host);
        let destination = resolve_destination(caller_leg.remote_addr, &request_uri);
        self.send_request(&adapted, destination).await?;

        if request.method == Method::Bye {
            if let Some(dialog_id) = &caller_leg.dialog_id {
                self.dialogs.terminate(dialog_id).await;
            }
            let session = entry.read().await;
            let callee_dialog_id = session.callee_leg.as_ref().and_then(|l| l.dialog_id.clone());
            drop(session);
            if let Some(dialog_id) = &callee_dialog_id {
                self.dialogs.terminate(dialog_id).await;
            }
            self.end_session(session_id, EndReason::Bye, EndedBy::Callee).await?;
        }
        Ok(())
    }

    // -- Callee-originated responses -------------------------------------

    pub async fn handle_callee_response(&self, session_id: &SessionId, response: &Response) -> B2buaResult<()> {
        let entry = self.sessions.get(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?.value().clone();

        if let Some(txn) = self.transactions.find_transaction(&Message::Response(response.clone())).await {
            debug!(session_id = %session_id, txn_id = %txn.id(), "matched callee response to transaction");
        }

        let (callee_dialog_id, caller) = {
            let mut session = entry.write().await;
            session.touch(Utc::now());
            let callee_dialog_id = session.callee_leg.as_ref().and_then(|l| l.dialog_id.clone());
            if let Some(callee) = session.callee_leg.as_mut() {
                callee.remote_addr = response.source_addr;
                if let Some(to) = response.header(HeaderName::TO) {
                    if let Some(tag) = extract_tag(to) {
                        callee.to_tag = tag;
                    }
                }
                if response.status == 180 {
                    callee.status = LegStatus::Ringing;
                } else if response.is_success() {
                    callee.set_connected(Utc::now());
                } else if response.is_failure() {
                    callee.status = LegStatus::Failed;
                }
            }
            if response.is_success() {
                if let Some(seconds) = response.header(HeaderName::SESSION_EXPIRES).and_then(callcore_headers::parse_session_expires).map(|(seconds, _)| seconds) {
                    session.session_expires_secs = seconds;
                }
            }
            (callee_dialog_id, (session.caller_leg.clone(), session.status))
        };

        if let Some(dialog_id) = &callee_dialog_id {
            if let Some(to) = response.header(HeaderName::TO) {
                if let Some(tag) = extract_tag(to) {
                    let _ = self.dialogs.latch_remote_tag(dialog_id, &tag).await;
                }
            }
            if let Some(contact) = response.header(HeaderName::CONTACT).map(extract_uri) {
                let _ = self.dialogs.set_remote_target(dialog_id, &contact).await;
            }
            if response.is_success() {
                self.dialogs.confirm(dialog_id).await?;
            } else if response.is_failure() {
                self.dialogs.terminate(dialog_id).await;
            }
        }

        let (caller_leg, _prior_status) = caller;
        let translated = self.translate_response_to_caller(&caller_leg, response);
        let destination = caller_leg.remote_addr;

        {
            let mut session = entry.write().await;
            if response.is_success() {
                if let Some(dialog_id) = session.caller_leg.dialog_id.clone() {
                    self.dialogs.confirm(&dialog_id).await?;
                }
            } else if response.is_failure() {
                if let Some(dialog_id) = session.caller_leg.dialog_id.clone() {
                    self.dialogs.terminate(&dialog_id).await;
                }
                session.fail(Utc::now());
            } else if response.status == 180 {
                session.status = SessionStatus::Ringing;
            } else if response.is_provisional() {
                session.status = SessionStatus::Proceeding;
            }
        }

        self.send_response(&translated, destination).await?;

        if response.is_success() {
            self.bridge(session_id).await?;
        } else if response.is_failure() {
            self.end_session(session_id, EndReason::Error, EndedBy::Callee).await?;
        }
        Ok(())
    }

    fn translate_response_to_caller(&self, caller_leg: &CallLeg, response: &Response) -> Response {
        let mut translated = Response::new(response.status, response.reason.clone());
        translated.body = response.body.clone();
        translated.headers.set(HeaderName::CALL_ID, &caller_leg.call_id);
        translated.headers.set(HeaderName::FROM, callcore_headers::build_address(&caller_leg.from_uri, None, Some(&caller_leg.from_tag)));
        translated.headers.set(HeaderName::TO, callcore_headers::build_address(&caller_leg.to_uri, None, Some(&caller_leg.to_tag)));
        translated.headers.set(HeaderName::CONTACT, callcore_headers::build_address(&self.config.contact, None, None));
        if let Some(cseq) = response.header(HeaderName::CSEQ) {
            translated.headers.set(HeaderName::CSEQ, cseq);
        }
        translated.headers.set(HeaderName::CONTENT_LENGTH, translated.body.len().to_string());
        translated
    }

    // -- Termination sources ---------------------------------------------

    pub async fn end_session(&self, session_id: &SessionId, reason: EndReason, ended_by: EndedBy) -> B2buaResult<()> {
        let entry = self.sessions.get(session_id).ok_or_else(|| B2buaError::SessionNotFound(session_id.to_string()))?.value().clone();
        let now = Utc::now();

        let already_ended = {
            let session = entry.read().await;
            session.status.is_terminal()
        };
        if already_ended {
            return Ok(());
        }

        {
            let mut session = entry.write().await;
            match reason {
                EndReason::Bye | EndReason::Cancel => session.end(now),
                EndReason::Timeout | EndReason::Error => session.fail(now),
            }
        }

        self.cancel_hunt_group_timeout(session_id);

        let call_id = {
            let session = entry.read().await;
            session.caller_leg.call_id.clone()
        };
        self.timers.remove(&call_id).await;
        self.stats.end(session_id, reason, ended_by, now).await;
        Ok(())
    }

    // -- Hunt-group ring timeout ------------------------------------------

    pub async fn arm_ring_timeout(self: &Arc<Self>, session_id: SessionId, ring_timeout_secs: u32) {
        if ring_timeout_secs == 0 {
            return;
        }
        let stop = Arc::new(AtomicBool::new(false));
        self.ring_timeout_stop.insert(session_id.clone(), stop.clone());

        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(ring_timeout_secs as u64)).await;
            if stop.load(Ordering::SeqCst) {
                return;
            }
            engine.fire_ring_timeout(&session_id).await;
        });
    }

    async fn fire_ring_timeout(&self, session_id: &SessionId) {
        let Some(handle) = self.get_session(session_id) else {
            return;
        };
        let already_connected = {
            let session = handle.read().await;
            session.status == SessionStatus::Connected
        };
        if already_connected {
            return;
        }

        info!(session_id = %session_id, "hunt-group ring timeout fired");
        {
            let mut session = handle.write().await;
            session.fail(Utc::now());
        }
        if let Err(err) = self.respond_to_caller_with_failure(session_id, 408, "Request Timeout").await {
            warn!(%err, "failed to send 408 on ring timeout");
        }
        if let Err(err) = self.cancel_pending_legs(session_id, None).await {
            warn!(%err, "failed to cancel pending legs on ring timeout");
        }
        let _ = self.end_session(session_id, EndReason::Timeout, EndedBy::System).await;
    }

    /// Fires at most once; bridging and explicit end both cancel it.
    pub fn cancel_hunt_group_timeout(&self, session_id: &SessionId) {
        if let Some((_, stop)) = self.ring_timeout_stop.remove(session_id) {
            stop.store(true, Ordering::SeqCst);
        }
    }

    // -- Periodic cleanup --------------------------------------------------

    pub async fn start_cleanup_task(self: &Arc<Self>) {
        if self.cleanup_running.swap(true, Ordering::SeqCst) {
            return;
        }
        let engine = self.clone();
        let running = self.cleanup_running.clone();
        let cleanup_interval = self.config.cleanup_interval;
        let session_timeout = self.config.session_timeout;

        tokio::spawn(async move {
            let mut ticker = interval(cleanup_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                engine.run_cleanup_sweep(session_timeout).await;
            }
            info!("b2bua cleanup task stopped");
        });
    }

    pub async fn stop_cleanup_task(&self) {
        self.cleanup_running.store(false, Ordering::SeqCst);
    }

    async fn run_cleanup_sweep(&self, session_timeout: std::time::Duration) {
        self.transactions.cleanup_expired().await;

        let now = Utc::now();
        let threshold = ChronoDuration::from_std(session_timeout).unwrap_or(ChronoDuration::seconds(1800));

        let mut stale: Vec<SessionId> = Vec::new();
        for entry in self.sessions.iter() {
            let session = entry.value().read().await;
            let idle_too_long = !session.status.is_terminal() && (now - session.last_activity) > threshold;
            if session.status.is_terminal() || idle_too_long {
                stale.push(session.id.clone());
            }
        }

        let mut removed = 0usize;
        for session_id in stale {
            if let Some((_, handle)) = self.sessions.remove(&session_id) {
                let session = handle.read().await;
                self.deindex_session(&session);
                removed += 1;
            }
            self.aggregators.remove(&session_id);
            self.sequential_remaining.remove(&session_id);
            self.cancel_hunt_group_timeout(&session_id);
        }
        if removed > 0 {
            debug!(count = removed, "b2bua cleanup swept stale sessions");
        }
    }
}

fn sdp_text(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        None
    } else {
        std::str::from_utf8(body).ok().map(str::to_string)
    }
}

fn caller_from_uri_placeholder(caller_invite: &Request) -> String {
    caller_invite.header(HeaderName::FROM).map(extract_uri).unwrap_or_default()
}
