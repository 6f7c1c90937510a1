use thiserror::Error;

/// Failures recognized by the SDP mangler.
///
/// These map onto the `InvalidInput` taxonomy entry of the core's error
/// design — the caller (the B2BUA, or a validator) decides whether a
/// malformed SDP body is fatal to the request it arrived on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SdpError {
    #[error("missing or malformed origin (o=) line")]
    InvalidOrigin,
    #[error("missing or empty session name (s=) line")]
    InvalidSessionName,
    #[error("malformed connection (c=) line: {0}")]
    InvalidConnection(String),
    #[error("malformed bandwidth (b=) line: {0}")]
    InvalidBandwidth(String),
    #[error("malformed media (m=) line: {0}")]
    InvalidMedia(String),
    #[error("media description missing type or protocol")]
    MediaMissingTypeOrProtocol,
    #[error("media port must be greater than zero")]
    NonPositiveMediaPort,
    #[error("timing (t=) line is absent")]
    MissingTiming,
}

pub type SdpResult<T> = Result<T, SdpError>;
