use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("no session timer for Call-ID {0}")]
    NotFound(String),
}

pub type TimerResult<T> = Result<T, TimerError>;
