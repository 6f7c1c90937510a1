use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{B2buaError, B2buaResult};
use crate::ids::{HuntGroupId, LegId, SessionId};
use crate::leg::CallLeg;

/// A session's lifecycle status. Monotonic along the
/// non-terminal path `Initial -> Initiating -> Proceeding -> Ringing ->
/// Connected -> Ending -> Ended`; `Failed` and `Cancelled` are terminal
/// and reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Initial,
    Initiating,
    Proceeding,
    Ringing,
    Connected,
    Ending,
    Ended,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Ended | SessionStatus::Failed | SessionStatus::Cancelled)
    }
}

/// The bridge: a caller leg, at most one callee leg, and (while a
/// hunt-group fork is in flight) a set of pending legs racing to
/// answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct B2BUASession {
    pub id: SessionId,
    pub caller_leg: CallLeg,
    pub callee_leg: Option<CallLeg>,
    pub pending_legs: HashMap<LegId, CallLeg>,
    pub answered_leg_id: Option<LegId>,
    pub status: SessionStatus,
    pub hunt_group_id: Option<HuntGroupId>,
    pub start_time: DateTime<Utc>,
    pub connect_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub sdp_offer: Option<String>,
    pub sdp_answer: Option<String>,
    /// The Session-Expires value (seconds) negotiated for this call:
    /// the caller's requested value, overridden by the callee's if its
    /// final 2xx carries its own `Session-Expires`. Fed to the
    /// Session-Timer Manager's `create` (which clamps it) on bridging.
    pub session_expires_secs: u32,
}

impl B2BUASession {
    pub fn new(caller_leg: CallLeg, sdp_offer: Option<String>, now: DateTime<Utc>) -> Self {
        B2BUASession {
            id: SessionId::new(),
            caller_leg,
            callee_leg: None,
            pending_legs: HashMap::new(),
            answered_leg_id: None,
            status: SessionStatus::Initial,
            hunt_group_id: None,
            start_time: now,
            connect_time: None,
            end_time: None,
            last_activity: now,
            sdp_offer,
            sdp_answer: None,
            session_expires_secs: 0,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// Every leg ID reachable from this session: caller, callee (if
    /// answered), and every pending leg.
    pub fn leg_ids(&self) -> Vec<LegId> {
        let mut ids = vec![self.caller_leg.id.clone()];
        if let Some(callee) = &self.callee_leg {
            ids.push(callee.id.clone());
        }
        ids.extend(self.pending_legs.keys().cloned());
        ids
    }

    /// Move the member that answered out of `pending_legs` and into
    /// `callee_leg`, stamping `connect_time` and capturing its SDP
    /// answer.
    pub fn set_answered_leg(&mut self, leg_id: &LegId, now: DateTime<Utc>) -> B2buaResult<()> {
        let mut leg = self.pending_legs.remove(leg_id).ok_or_else(|| B2buaError::LegNotFound(leg_id.to_string()))?;
        leg.set_connected(now);
        self.sdp_answer = leg.remote_sdp.clone();
        self.answered_leg_id = Some(leg_id.clone());
        self.callee_leg = Some(leg);
        self.last_activity = now;
        Ok(())
    }

    /// Precondition: status must be `Initiating` or `Ringing`.
    pub fn bridge(&mut self, now: DateTime<Utc>) -> B2buaResult<()> {
        if !matches!(self.status, SessionStatus::Initiating | SessionStatus::Ringing) {
            return Err(B2buaError::BadState(self.id.to_string()));
        }
        self.status = SessionStatus::Connected;
        self.connect_time = Some(now);
        self.caller_leg.set_connected(now);
        if let Some(callee) = self.callee_leg.as_mut() {
            callee.set_connected(now);
        }
        self.last_activity = now;
        Ok(())
    }

    pub fn end(&mut self, now: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = SessionStatus::Ended;
        self.end_time = Some(now);
        self.last_activity = now;
        if !self.caller_leg.status.is_terminal() {
            self.caller_leg.status = crate::leg::LegStatus::Ended;
        }
        if let Some(callee) = self.callee_leg.as_mut() {
            if !callee.status.is_terminal() {
                callee.status = crate::leg::LegStatus::Ended;
            }
        }
    }

    pub fn fail(&mut self, now: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = SessionStatus::Failed;
        self.end_time = Some(now);
        self.last_activity = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> B2BUASession {
        let leg = CallLeg::new("cid", "sip:a@x", "tag-a", "sip:b@x", "", "sip:server@x");
        B2BUASession::new(leg, Some("v=0".to_string()), Utc::now())
    }

    #[test]
    fn bridge_requires_initiating_or_ringing() {
        let mut s = session();
        assert!(s.bridge(Utc::now()).is_err());
        s.status = SessionStatus::Ringing;
        assert!(s.bridge(Utc::now()).is_ok());
        assert_eq!(s.status, SessionStatus::Connected);
        assert!(s.connect_time.is_some());
    }

    #[test]
    fn end_is_idempotent_and_absorbing() {
        let mut s = session();
        let t1 = Utc::now();
        s.end(t1);
        let t2 = t1 + chrono::Duration::seconds(10);
        s.end(t2);
        assert_eq!(s.end_time, Some(t1));
    }

    #[test]
    fn set_answered_leg_moves_pending_to_callee() {
        let mut s = session();
        s.status = SessionStatus::Initiating;
        let mut member = CallLeg::new("cid2", "sip:server@x", "tag-s", "sip:member@x", "", "sip:server@x");
        member.remote_sdp = Some("v=0\r\n".to_string());
        let member_id = member.id.clone();
        s.pending_legs.insert(member_id.clone(), member);
        s.set_answered_leg(&member_id, Utc::now()).unwrap();
        assert!(s.pending_legs.is_empty());
        assert_eq!(s.callee_leg.as_ref().unwrap().id, member_id);
        assert_eq!(s.sdp_answer, Some("v=0\r\n".to_string()));
    }
}
