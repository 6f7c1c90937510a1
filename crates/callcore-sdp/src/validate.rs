use crate::error::{SdpError, SdpResult};
use crate::model::SessionDescription;

/// Validate structural completeness beyond what `parse` already
/// enforces: origin is present (guaranteed once `parse` succeeds, but
/// re-checked here so `validate` stands alone for a caller that built a
/// `SessionDescription` by hand), session name non-empty, timing present,
/// and every media description has a type/protocol and a positive port.
pub fn validate(sdp: &SessionDescription) -> SdpResult<()> {
    if sdp.origin.address.is_empty() {
        return Err(SdpError::InvalidOrigin);
    }
    if sdp.session_name.is_empty() {
        return Err(SdpError::InvalidSessionName);
    }
    if sdp.timing.is_empty() {
        return Err(SdpError::MissingTiming);
    }
    for media in &sdp.media {
        if media.media.is_empty() || media.proto.is_empty() {
            return Err(SdpError::MediaMissingTypeOrProtocol);
        }
        if media.port == 0 {
            return Err(SdpError::NonPositiveMediaPort);
        }
    }
    Ok(())
}
