use crate::model::{Attribute, Bandwidth, Connection, MediaDescription, SessionDescription};

/// Serialize a session description back to SDP text, CRLF-terminated,
/// fields in canonical order: `v o s i? u? e? p? c? b? t* session-a*`,
/// then each media block (`m c? b? media-a*`).
///
/// `u=`, `e=`, `p=` are emitted alongside the more commonly used `i=`
/// so that every recognized field survives a Parse/Generate cycle.
pub fn generate(sdp: &SessionDescription) -> String {
    let mut out = String::new();
    push_line(&mut out, 'v', &sdp.version);
    push_line(&mut out, 'o', &format_origin(&sdp.origin));
    push_line(&mut out, 's', &sdp.session_name);
    if let Some(info) = &sdp.info {
        push_line(&mut out, 'i', info);
    }
    if let Some(uri) = &sdp.uri {
        push_line(&mut out, 'u', uri);
    }
    if let Some(email) = &sdp.email {
        push_line(&mut out, 'e', email);
    }
    if let Some(phone) = &sdp.phone {
        push_line(&mut out, 'p', phone);
    }
    if let Some(connection) = &sdp.connection {
        push_line(&mut out, 'c', &format_connection(connection));
    }
    for bw in &sdp.bandwidth {
        push_line(&mut out, 'b', &format_bandwidth(bw));
    }
    for timing in &sdp.timing {
        push_line(&mut out, 't', &format!("{} {}", timing.start, timing.stop));
    }
    for attr in &sdp.attributes {
        push_line(&mut out, 'a', &format_attribute(attr));
    }
    for media in &sdp.media {
        push_media(&mut out, media);
    }
    out
}

fn push_line(out: &mut String, tag: char, value: &str) {
    out.push(tag);
    out.push('=');
    out.push_str(value);
    out.push_str("\r\n");
}

fn push_media(out: &mut String, media: &MediaDescription) {
    let port_spec = match media.port_count {
        Some(count) => format!("{}/{}", media.port, count),
        None => media.port.to_string(),
    };
    let formats = media.formats.join(" ");
    let value = if formats.is_empty() {
        format!("{} {} {}", media.media, port_spec, media.proto)
    } else {
        format!("{} {} {} {}", media.media, port_spec, media.proto, formats)
    };
    push_line(out, 'm', &value);

    if let Some(connection) = &media.connection {
        push_line(out, 'c', &format_connection(connection));
    }
    for bw in &media.bandwidth {
        push_line(out, 'b', &format_bandwidth(bw));
    }
    for attr in &media.attributes {
        push_line(out, 'a', &format_attribute(attr));
    }
}

fn format_origin(o: &crate::model::Origin) -> String {
    format!(
        "{} {} {} {} {} {}",
        o.username, o.sess_id, o.sess_version, o.nettype, o.addrtype, o.address
    )
}

fn format_connection(c: &Connection) -> String {
    format!("{} {} {}", c.nettype, c.addrtype, c.address)
}

fn format_bandwidth(b: &Bandwidth) -> String {
    format!("{}:{}", b.bwtype, b.value)
}

fn format_attribute(a: &Attribute) -> String {
    match &a.value {
        Some(v) => format!("{}:{}", a.name, v),
        None => a.name.clone(),
    }
}
