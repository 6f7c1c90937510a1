use crate::model::SessionDescription;

/// Rewrite an SDP session for B2BUA address substitution.
///
/// Rewrites the session-level `c=` address, the origin address, and each
/// media-level `c=` address to `new_address`. If `new_port` is `Some` and
/// greater than zero, the port of every `audio` media description is
/// substituted. The origin session-version is incremented by one — it is
/// carried as ASCII decimal text, not a numeric field, because RFC 4566
/// allows it to exceed a `u64` in principle; we still require it to parse
/// as one here since nothing produced by this mangler ever will.
pub fn mangle_for_b2bua(sdp: &SessionDescription, new_address: &str, new_port: Option<u32>) -> SessionDescription {
    let mut out = sdp.clone();

    out.origin.address = new_address.to_string();
    out.origin.sess_version = bump_version(&out.origin.sess_version);

    if let Some(connection) = out.connection.as_mut() {
        connection.address = new_address.to_string();
    }

    for media in out.media.iter_mut() {
        if let Some(connection) = media.connection.as_mut() {
            connection.address = new_address.to_string();
        }
        if media.media == "audio" {
            if let Some(port) = new_port.filter(|p| *p > 0) {
                media.port = port;
            }
        }
    }

    out
}

fn bump_version(version: &str) -> String {
    match version.parse::<u64>() {
        Ok(n) => (n + 1).to_string(),
        Err(_) => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    const SAMPLE: &str = "v=0\r\no=alice 2890844526 2890844526 IN IP4 10.0.0.1\r\ns=Call\r\nc=IN IP4 10.0.0.1\r\nt=0 0\r\nm=audio 49170 RTP/AVP 0\r\nm=video 51372 RTP/AVP 31\r\n";

    #[test]
    fn rewrites_session_and_origin_and_media_addresses() {
        let sdp = parse(SAMPLE).unwrap();
        let mangled = mangle_for_b2bua(&sdp, "203.0.113.9", None);
        assert_eq!(mangled.origin.address, "203.0.113.9");
        assert_eq!(mangled.connection.unwrap().address, "203.0.113.9");
        for media in &mangled.media {
            // Media descriptions here have no c= of their own; address stays at session scope.
            assert!(media.connection.is_none());
        }
    }

    #[test]
    fn rewrites_media_level_connection_when_present() {
        let sdp = parse(
            "v=0\r\no=alice 1 1 IN IP4 10.0.0.1\r\ns=Call\r\nt=0 0\r\nm=audio 49170 RTP/AVP 0\r\nc=IN IP4 10.0.0.1\r\n",
        )
        .unwrap();
        let mangled = mangle_for_b2bua(&sdp, "203.0.113.9", None);
        assert_eq!(mangled.media[0].connection.as_ref().unwrap().address, "203.0.113.9");
    }

    #[test]
    fn substitutes_audio_port_only() {
        let sdp = parse(SAMPLE).unwrap();
        let mangled = mangle_for_b2bua(&sdp, "203.0.113.9", Some(30000));
        assert_eq!(mangled.media[0].port, 30000); // audio
        assert_eq!(mangled.media[1].port, 51372); // video untouched
    }

    #[test]
    fn zero_new_port_leaves_port_untouched() {
        let sdp = parse(SAMPLE).unwrap();
        let mangled = mangle_for_b2bua(&sdp, "203.0.113.9", Some(0));
        assert_eq!(mangled.media[0].port, 49170);
    }

    #[test]
    fn session_version_is_incremented() {
        let sdp = parse(SAMPLE).unwrap();
        let mangled = mangle_for_b2bua(&sdp, "203.0.113.9", None);
        assert_eq!(mangled.origin.sess_version, "2890844527");
    }
}
