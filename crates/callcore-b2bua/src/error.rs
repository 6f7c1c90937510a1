use thiserror::Error;

use callcore_dialog::DialogError;

/// Error taxonomy for the B2BUA & hunt engine, the widest of the
/// core's per-crate enums since the engine is where every other
/// category surfaces: a missing session is `NotFound`, bridging a
/// session that isn't `Ringing` is `BadState`, a dialog CSeq wrap
/// bubbles up as `Fatal`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum B2buaError {
    #[error("no session with id {0}")]
    SessionNotFound(String),

    #[error("no leg with id {0}")]
    LegNotFound(String),

    #[error("no hunt group with id {0}")]
    HuntGroupNotFound(String),

    #[error("operation not valid for session {0} in its current state")]
    BadState(String),

    #[error("malformed input: {0}")]
    InvalidInput(String),

    #[error("transport send failed: {0}")]
    ExternalFailure(String),

    #[error("invariant violation: {0}")]
    Fatal(String),

    #[error(transparent)]
    Dialog(#[from] DialogError),
}

impl B2buaError {
    /// `Fatal` is the one variant the facade's dispatch loop must never
    /// silently swallow: it escalates to `abort_on_fatal`.
    pub fn is_fatal(&self) -> bool {
        matches!(self, B2buaError::Fatal(_)) || matches!(self, B2buaError::Dialog(DialogError::CSeqOverflow(_)))
    }
}

pub type B2buaResult<T> = Result<T, B2buaError>;
