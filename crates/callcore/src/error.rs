use thiserror::Error;

use callcore_b2bua::B2buaError;
use callcore_dialog::DialogError;
use callcore_timer::TimerError;

/// Facade-level error that wraps every per-crate error enum, for
/// callers that only care *whether* an operation failed, not which
/// subsystem raised it. `callcore-validate` has no error type of its
/// own to wrap here: a failing validator never returns `Err`, it
/// returns a `ValidationResult` describing the rejection in-band.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error(transparent)]
    Dialog(#[from] DialogError),

    #[error(transparent)]
    Timer(#[from] TimerError),

    #[error(transparent)]
    B2bua(#[from] B2buaError),
}

impl CoreError {
    /// Whether this error belongs to the taxonomy's `Fatal` category,
    /// the one class [`crate::fatal::abort_on_fatal`] never lets a
    /// caller swallow.
    pub fn is_fatal(&self) -> bool {
        match self {
            CoreError::Dialog(DialogError::CSeqOverflow(_)) => true,
            CoreError::Timer(_) => false,
            CoreError::B2bua(e) => e.is_fatal(),
            _ => false,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
