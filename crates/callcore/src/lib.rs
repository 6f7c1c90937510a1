//! Facade crate: wires the header codec (C1), SDP mangler (C2), dialog
//! registry (C3), session-timer manager (C4), validation pipeline (C5),
//! and B2BUA & hunt engine (C6) into a single [`Server`] with explicit
//! `start`/`stop` lifecycle.
//!
//! No crate this one depends on is re-implemented here; this is wiring
//! and a handful of ambient concerns (config aggregation, a combined
//! error type, the fatal-abort policy, an optional logging helper) that
//! only make sense once every component exists.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod fatal;
pub mod logging;
mod server;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use server::Server;

// Re-exported so a caller can build a `Server` without depending on the
// individual component crates directly, the way `rvoip`'s own top-level
// crate re-exports `dialog-core`/`session-core`/`call-engine` types.
pub use callcore_b2bua::{B2buaConfig, B2buaEngine, B2buaError, HuntGroup, HuntGroupStrategy, Member, SessionStatus};
pub use callcore_dialog::{Dialog, DialogError, DialogId, DialogRegistry};
pub use callcore_timer::{Config as TimerConfig, SessionTimerManager, TimerError};
pub use callcore_validate::{build_error_response, Pipeline, ValidationResult, Validator};
