use thiserror::Error;

/// Error taxonomy for the dialog registry, mapped onto the core's shared
/// error categories: `NotFound`, `BadState`, and `Fatal`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DialogError {
    #[error("no dialog with id {0}")]
    NotFound(String),

    #[error("dialog {0} is terminated and cannot be mutated")]
    Terminated(String),

    #[error("no transaction correlation for leg {0}")]
    CorrelationNotFound(String),

    /// Local CSeq exhausted its 32-bit range. This can only happen after
    /// roughly four billion requests on a single dialog and indicates a
    /// runaway caller; the registry reports it rather than silently
    /// wrapping so the facade's fatal-abort policy can act on it.
    #[error("local CSeq for dialog {0} would wrap past u32::MAX")]
    CSeqOverflow(String),
}

pub type DialogResult<T> = Result<T, DialogError>;
