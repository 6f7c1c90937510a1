use chrono::{DateTime, Utc};

/// Which side is responsible for sending the next session refresh,
/// per RFC 4028 Section 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Refresher {
    Uac,
    Uas,
}

/// The timer manager's view of one dialog's session timer, keyed
/// externally by Call-ID.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Session {
    pub(crate) call_id: String,
    pub(crate) expiry: DateTime<Utc>,
    pub(crate) refresher: Refresher,
    pub(crate) min_se: u32,
}

impl Session {
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    pub fn refresher(&self) -> Refresher {
        self.refresher
    }

    pub fn min_se(&self) -> u32 {
        self.min_se
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry
    }
}
