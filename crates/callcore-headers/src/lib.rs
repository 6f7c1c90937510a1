//! Pure functions over SIP header text.
//!
//! Every function here takes header text in and returns either a parsed
//! value or an "absent" result (`None`, `0`, an empty string) — none of
//! them raise an error. Whether an absent result is fatal is a decision
//! for the caller (the validation pipeline, the B2BUA), not this crate.
//! This mirrors how the reference stack's header builders and parsers
//! stay agnostic about what a missing value *means* to the caller.

mod address;
mod branch;
mod cseq;
mod digest;
mod param;
mod session_expires;

pub use address::{build_address, extract_uri};
pub use branch::generate_branch;
pub use cseq::parse_cseq;
pub use digest::{format_digest_challenge, parse_digest};
pub(crate) use param::extract_param_segment;
pub use param::extract_param;
pub use session_expires::parse_session_expires;

/// Extract the value of the first `tag=` parameter in a header, or `None`
/// if there isn't one.
pub fn extract_tag(header: &str) -> Option<String> {
    extract_param(header, "tag")
}
