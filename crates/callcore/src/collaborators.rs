//! Re-export of the collaborator traits the B2BUA engine depends on.
//!
//! The trait definitions themselves live in `callcore-b2bua::collaborators`
//! (the B2BUA engine is the only component that calls through them), but
//! callers wiring up a [`crate::Server`] reach them through this facade
//! path, since they're part of the core's public external-interface
//! surface rather than an internal detail of one crate.

pub use callcore_b2bua::collaborators::{
    emit_request, emit_response, Contact, MessageParser, ParserError, Transport, TransactionSource, TransportError, TxnHandle, User, UserStore,
};
