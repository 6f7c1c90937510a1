use crate::error::{SdpError, SdpResult};
use crate::model::{Attribute, Bandwidth, Connection, MediaDescription, Origin, SessionDescription, Timing};

/// Parse an SDP body into a structured session description.
///
/// Lines outside the recognized set (`v o s i u e p c b t m a`) are
/// skipped rather than rejected — SDP deployments routinely carry
/// extension lines this parser has never heard of.
pub fn parse(sdp: &str) -> SdpResult<SessionDescription> {
    let mut version = String::new();
    let mut origin: Option<Origin> = None;
    let mut session_name = String::new();
    let mut info = None;
    let mut uri = None;
    let mut email = None;
    let mut phone = None;
    let mut connection = None;
    let mut bandwidth = Vec::new();
    let mut timing = Vec::new();
    let mut attributes = Vec::new();
    let mut media: Vec<MediaDescription> = Vec::new();

    for raw_line in sdp.lines() {
        let line = raw_line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            continue;
        }
        let Some((tag, value)) = line.split_once('=') else {
            continue;
        };

        if tag.len() != 1 {
            continue;
        }

        // Once we've seen an `m=` line, `c=`/`b=`/`a=` rebind to the
        // current media description's scope instead of the session's.
        if let Some(current_media) = media.last_mut() {
            match tag {
                "c" => {
                    current_media.connection = Some(parse_connection(value)?);
                    continue;
                }
                "b" => {
                    current_media.bandwidth.push(parse_bandwidth(value)?);
                    continue;
                }
                "a" => {
                    current_media.attributes.push(parse_attribute(value));
                    continue;
                }
                "m" => {
                    media.push(parse_media(value)?);
                    continue;
                }
                _ => {}
            }
        }

        match tag {
            "v" => version = value.to_string(),
            "o" => origin = Some(parse_origin(value)?),
            "s" => session_name = value.to_string(),
            "i" => info = Some(value.to_string()),
            "u" => uri = Some(value.to_string()),
            "e" => email = Some(value.to_string()),
            "p" => phone = Some(value.to_string()),
            "c" => connection = Some(parse_connection(value)?),
            "b" => bandwidth.push(parse_bandwidth(value)?),
            "t" => timing.push(parse_timing(value)?),
            "m" => media.push(parse_media(value)?),
            "a" => attributes.push(parse_attribute(value)),
            _ => {}
        }
    }

    Ok(SessionDescription {
        version,
        origin: origin.ok_or(SdpError::InvalidOrigin)?,
        session_name,
        info,
        uri,
        email,
        phone,
        connection,
        bandwidth,
        timing,
        attributes,
        media,
    })
}

fn parse_origin(value: &str) -> SdpResult<Origin> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    let [username, sess_id, sess_version, nettype, addrtype, address] = fields[..] else {
        return Err(SdpError::InvalidOrigin);
    };
    Ok(Origin {
        username: username.to_string(),
        sess_id: sess_id.to_string(),
        sess_version: sess_version.to_string(),
        nettype: nettype.to_string(),
        addrtype: addrtype.to_string(),
        address: address.to_string(),
    })
}

fn parse_connection(value: &str) -> SdpResult<Connection> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    let [nettype, addrtype, address] = fields[..] else {
        return Err(SdpError::InvalidConnection(value.to_string()));
    };
    Ok(Connection {
        nettype: nettype.to_string(),
        addrtype: addrtype.to_string(),
        address: address.to_string(),
    })
}

fn parse_bandwidth(value: &str) -> SdpResult<Bandwidth> {
    let (bwtype, amount) = value
        .split_once(':')
        .ok_or_else(|| SdpError::InvalidBandwidth(value.to_string()))?;
    let value = amount
        .trim()
        .parse()
        .map_err(|_| SdpError::InvalidBandwidth(value.to_string()))?;
    Ok(Bandwidth { bwtype: bwtype.to_string(), value })
}

fn parse_timing(value: &str) -> SdpResult<Timing> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    let [start, stop] = fields[..] else {
        return Err(SdpError::InvalidMedia(format!("malformed timing: {value}")));
    };
    Ok(Timing {
        start: start.parse().unwrap_or(0),
        stop: stop.parse().unwrap_or(0),
    })
}

fn parse_media(value: &str) -> SdpResult<MediaDescription> {
    let mut fields = value.split_whitespace();
    let (Some(media), Some(port_spec), Some(proto), Some(first_format)) = (fields.next(), fields.next(), fields.next(), fields.next()) else {
        return Err(SdpError::InvalidMedia(value.to_string()));
    };
    let formats: Vec<String> = std::iter::once(first_format.to_string()).chain(fields.map(str::to_string)).collect();

    let (port, port_count) = match port_spec.split_once('/') {
        Some((port, count)) => (
            port.parse().map_err(|_| SdpError::InvalidMedia(value.to_string()))?,
            Some(count.parse().map_err(|_| SdpError::InvalidMedia(value.to_string()))?),
        ),
        None => (
            port_spec.parse().map_err(|_| SdpError::InvalidMedia(value.to_string()))?,
            None,
        ),
    };

    Ok(MediaDescription {
        media: media.to_string(),
        port,
        port_count,
        proto: proto.to_string(),
        formats,
        connection: None,
        bandwidth: Vec::new(),
        attributes: Vec::new(),
    })
}

fn parse_attribute(value: &str) -> Attribute {
    match value.split_once(':') {
        Some((name, val)) => Attribute::with_value(name, val),
        None => Attribute::flag(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "v=0\r\n\
o=alice 2890844526 2890844526 IN IP4 10.0.0.1\r\n\
s=Call\r\n\
c=IN IP4 10.0.0.1\r\n\
t=0 0\r\n\
m=audio 49170 RTP/AVP 0\r\n\
a=rtpmap:0 PCMU/8000\r\n\
a=sendrecv\r\n";

    #[test]
    fn parses_session_and_media_fields() {
        let sdp = parse(SAMPLE).unwrap();
        assert_eq!(sdp.origin.address, "10.0.0.1");
        assert_eq!(sdp.session_name, "Call");
        assert_eq!(sdp.timing, vec![Timing { start: 0, stop: 0 }]);
        assert_eq!(sdp.media.len(), 1);
        assert_eq!(sdp.media[0].media, "audio");
        assert_eq!(sdp.media[0].port, 49170);
        assert_eq!(sdp.media[0].direction(), Some("sendrecv"));
    }

    #[test]
    fn c_b_a_rebind_to_media_scope_after_m_line() {
        let sdp = "v=0\r\no=a 1 1 IN IP4 1.1.1.1\r\ns=-\r\nt=0 0\r\nm=audio 1000 RTP/AVP 0\r\nc=IN IP4 2.2.2.2\r\na=ptime:20\r\n";
        let parsed = parse(sdp).unwrap();
        assert!(parsed.connection.is_none());
        assert_eq!(parsed.media[0].connection.as_ref().unwrap().address, "2.2.2.2");
        assert_eq!(parsed.media[0].attributes[0], Attribute::with_value("ptime", "20"));
    }

    #[test]
    fn missing_origin_is_an_error() {
        let sdp = "v=0\r\ns=Call\r\nt=0 0\r\n";
        assert_eq!(parse(sdp), Err(SdpError::InvalidOrigin));
    }

    #[test]
    fn malformed_origin_field_count_is_an_error() {
        let sdp = "v=0\r\no=alice 1 1 IN IP4\r\ns=Call\r\n";
        assert_eq!(parse(sdp), Err(SdpError::InvalidOrigin));
    }

    #[test]
    fn media_with_port_and_count_parses() {
        let sdp = "v=0\r\no=a 1 1 IN IP4 1.1.1.1\r\ns=-\r\nt=0 0\r\nm=audio 49170/2 RTP/AVP 0\r\n";
        let parsed = parse(sdp).unwrap();
        assert_eq!(parsed.media[0].port, 49170);
        assert_eq!(parsed.media[0].port_count, Some(2));
    }

    #[test]
    fn unknown_lines_are_skipped() {
        let sdp = "v=0\r\no=a 1 1 IN IP4 1.1.1.1\r\ns=-\r\nz=unknown-extension\r\nt=0 0\r\n";
        assert!(parse(sdp).is_ok());
    }

    #[test]
    fn media_with_no_format_is_an_error() {
        let sdp = "v=0\r\no=a 1 1 IN IP4 1.1.1.1\r\ns=-\r\nt=0 0\r\nm=audio 49170 RTP/AVP\r\n";
        assert_eq!(parse(sdp), Err(SdpError::InvalidMedia("audio 49170 RTP/AVP".to_string())));
    }
}
