//! Session-Timer Manager (C4): RFC 4028 clamping, refresh, and an
//! asynchronous expiry sweep that hands terminations to a callback
//! rather than acting on them directly.

mod config;
mod error;
mod manager;
mod session;

pub use config::Config;
pub use error::{TimerError, TimerResult};
pub use manager::SessionTimerManager;
pub use session::{Refresher, Session};
