use chrono::{DateTime, Utc};

use crate::error::{DialogError, DialogResult};
use crate::id::DialogId;

/// A dialog's lifecycle state. Transitions only move forward;
/// `Terminated` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DialogState {
    Early,
    Confirmed,
    Terminated,
}

/// A SIP dialog: the three-tuple identity plus the mutable state a B2BUA
/// leg needs to keep building in-dialog requests.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Dialog {
    id: DialogId,
    call_id: String,
    local_uri: String,
    remote_uri: String,
    local_tag: String,
    remote_tag: String,
    remote_target: Option<String>,
    route_set: Vec<String>,
    local_cseq: u32,
    remote_cseq: u32,
    state: DialogState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Dialog {
    pub(crate) fn new(call_id: String, local_uri: String, remote_uri: String, local_tag: String, remote_tag: String, now: DateTime<Utc>) -> Self {
        let id = DialogId::new(&call_id, &local_tag, &remote_tag);
        Dialog {
            id,
            call_id,
            local_uri,
            remote_uri,
            local_tag,
            remote_tag,
            remote_target: None,
            route_set: Vec::new(),
            local_cseq: 1,
            remote_cseq: 0,
            state: DialogState::Early,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &DialogId {
        &self.id
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn local_uri(&self) -> &str {
        &self.local_uri
    }

    pub fn remote_uri(&self) -> &str {
        &self.remote_uri
    }

    pub fn local_tag(&self) -> &str {
        &self.local_tag
    }

    pub fn remote_tag(&self) -> &str {
        &self.remote_tag
    }

    pub fn remote_target(&self) -> Option<&str> {
        self.remote_target.as_deref()
    }

    pub fn route_set(&self) -> &[String] {
        &self.route_set
    }

    pub fn local_cseq(&self) -> u32 {
        self.local_cseq
    }

    pub fn remote_cseq(&self) -> u32 {
        self.remote_cseq
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// First-wins tag latch, used once the peer's 2xx/18x supplies a tag
    /// this dialog was created without.
    pub(crate) fn latch_remote_tag(&mut self, tag: &str, now: DateTime<Utc>) {
        if self.remote_tag.is_empty() && !tag.is_empty() {
            self.remote_tag = tag.to_string();
            self.id = DialogId::new(&self.call_id, &self.local_tag, &self.remote_tag);
            self.updated_at = now;
        }
    }

    pub(crate) fn confirm(&mut self, now: DateTime<Utc>) -> DialogResult<()> {
        match self.state {
            DialogState::Early => {
                self.state = DialogState::Confirmed;
                self.updated_at = now;
                Ok(())
            }
            DialogState::Confirmed => Ok(()),
            DialogState::Terminated => Err(DialogError::Terminated(self.id.to_string())),
        }
    }

    pub(crate) fn terminate(&mut self, now: DateTime<Utc>) {
        if self.state != DialogState::Terminated {
            self.state = DialogState::Terminated;
            self.updated_at = now;
        }
    }

    pub(crate) fn next_local_cseq(&mut self, now: DateTime<Utc>) -> DialogResult<u32> {
        let next = self.local_cseq.checked_add(1).ok_or_else(|| DialogError::CSeqOverflow(self.id.to_string()))?;
        self.local_cseq = next;
        self.updated_at = now;
        Ok(next)
    }

    pub(crate) fn update_remote_cseq(&mut self, n: u32, now: DateTime<Utc>) {
        if n > self.remote_cseq {
            self.remote_cseq = n;
            self.updated_at = now;
        }
    }

    pub(crate) fn set_remote_target(&mut self, target: &str, now: DateTime<Utc>) {
        self.remote_target = Some(target.to_string());
        self.updated_at = now;
    }

    pub(crate) fn set_route_set(&mut self, route_set: Vec<String>, now: DateTime<Utc>) {
        self.route_set = route_set;
        self.updated_at = now;
    }
}
