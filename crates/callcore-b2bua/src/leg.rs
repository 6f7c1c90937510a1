use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use callcore_dialog::DialogId;

use crate::ids::LegId;

/// One signaling peer's status. Parallels `SessionStatus`
/// field-for-field; kept as a distinct type rather than reused because a
/// leg and its owning session can be in different states mid-transition
/// (a pending hunt-group leg is `Proceeding` while the session itself is
/// still `Initiating`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegStatus {
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

impl LegStatus {
    /// Terminal states are absorbing: once a leg reaches
    /// one, no further status transition should be applied to it.
    pub fn is_terminal(self) -> bool {
        matches!(self, LegStatus::Ended | LegStatus::Failed | LegStatus::Cancelled)
    }
}

/// One signaling peer of a B2BUA session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLeg {
    pub id: LegId,
    pub call_id: String,
    pub from_uri: String,
    pub from_tag: String,
    pub to_uri: String,
    pub to_tag: String,
    pub contact: String,
    #[serde(skip)]
    pub remote_addr: Option<SocketAddr>,
    pub last_cseq: u32,
    pub dialog_id: Option<DialogId>,
    pub status: LegStatus,
    pub local_sdp: Option<String>,
    pub remote_sdp: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
    /// Opaque handle into the transaction collaborator; the core never
    /// inspects it beyond passing it back to that collaborator.
    pub txn_id: Option<String>,
}

impl CallLeg {
    pub fn new(call_id: impl Into<String>, from_uri: impl Into<String>, from_tag: impl Into<String>, to_uri: impl Into<String>, to_tag: impl Into<String>, contact: impl Into<String>) -> Self {
        CallLeg {
            id: LegId::new(),
            call_id: call_id.into(),
            from_uri: from_uri.into(),
            from_tag: from_tag.into(),
            to_uri: to_uri.into(),
            to_tag: to_tag.into(),
            contact: contact.into(),
            remote_addr: None,
            last_cseq: 1,
            dialog_id: None,
            status: LegStatus::Initial,
            local_sdp: None,
            remote_sdp: None,
            connected_at: None,
            txn_id: None,
        }
    }

    /// Move to `Connected`, stamping `connected_at` exactly once — a
    /// repeated transition (e.g. a retransmitted 200) must not move the
    /// timestamp.
    pub fn set_connected(&mut self, now: DateTime<Utc>) {
        if self.connected_at.is_none() {
            self.connected_at = Some(now);
        }
        self.status = LegStatus::Connected;
    }
}
