//! Priority-ordered inbound request validation pipeline (C5).
//!
//! A `Pipeline` is a sorted list of [`Validator`]s; each declares its own
//! priority and an `applies_to` predicate. The chain runs in priority
//! order, stopping at the first failure (or any result that explicitly
//! asks to stop), and canonical SIP error responses are built from the
//! `ValidationResult` that caused the stop. Evaluation never mutates
//! anything outside the returned result — it is safe to run the same
//! request through the same pipeline twice.

mod auth;
mod error_response;
mod pipeline;
mod result;
mod session_timer;
mod syntax;
mod validator;

pub use auth::AuthValidator;
pub use error_response::build_error_response;
pub use pipeline::Pipeline;
pub use result::ValidationResult;
pub use session_timer::SessionTimerValidator;
pub use syntax::SyntaxValidator;
pub use validator::Validator;
