use tracing::error;

use crate::error::CoreError;

/// The one place the `Fatal` taxonomy entry gets acted on.
/// Every other error category propagates back to the caller; `Fatal`
/// never does — it flushes the current `tracing` subscriber and aborts
/// the process. No call site in this workspace implements this policy
/// itself, so a runaway CSeq wrap or an invariant violation can't be
/// accidentally swallowed by a `match` that forgot the `Fatal` arm.
pub fn abort_on_fatal(err: &CoreError) {
    if err.is_fatal() {
        error!(error = %err, "fatal error, aborting process");
        std::process::abort();
    }
}
