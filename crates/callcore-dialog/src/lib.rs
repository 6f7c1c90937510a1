//! Dialog registry and transaction correlation (C3).
//!
//! Owns dialog identity, CSeq ordering, and the pairing of A-leg/B-leg
//! transactions a B2BUA needs while a request is in flight. Does not
//! parse or serialize SIP messages; callers pass in the header values
//! they already extracted with `callcore-headers`.

mod correlation;
mod dialog;
mod error;
mod id;
mod registry;

pub use correlation::{CorrelationId, CorrelationState, TransactionCorrelation};
pub use dialog::{Dialog, DialogState};
pub use error::{DialogError, DialogResult};
pub use id::DialogId;
pub use registry::DialogRegistry;
