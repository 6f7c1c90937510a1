//! Line-oriented SDP parsing, generation, and B2BUA address mangling.
//!
//! This is deliberately not a full RFC 4566 implementation: it tracks a
//! session-level scope and a per-media scope that rebinds on each `m=`
//! line, recognizes the commonly used fields, and skips anything else.
//! A caller that needs full SDP semantics (codec negotiation, ICE,
//! fingerprint validation) is out of scope.

mod error;
mod generate;
mod mangle;
mod model;
mod parse;
mod validate;

pub use error::{SdpError, SdpResult};
pub use generate::generate;
pub use mangle::mangle_for_b2bua;
pub use model::{Attribute, Bandwidth, Connection, MediaDescription, Origin, SessionDescription, Timing};
pub use parse::parse;
pub use validate::validate;
