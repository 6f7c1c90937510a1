use std::net::SocketAddr;

/// Resolve an outbound destination address for a request: in-dialog
/// requests prefer the leg's learned remote address, out-of-dialog
/// requests resolve from the request URI.
///
/// In-dialog requests always prefer `leg_remote_addr`, learned from the
/// peer's prior message. Out-of-dialog requests (a fresh hunt-group
/// member INVITE) fall back to parsing a `sip:user@host:port` URI
/// directly — real hostname resolution belongs to the transport
/// collaborator, which is out of scope here, so this only handles
/// literal IP addresses, which is what the unit and integration tests
/// in this crate exercise.
pub fn resolve_destination(leg_remote_addr: Option<SocketAddr>, uri: &str) -> Option<SocketAddr> {
    if let Some(addr) = leg_remote_addr {
        return Some(addr);
    }
    socket_addr_from_uri(uri)
}

/// Parse `sip:user@host:port` (or `sip:host:port`) into a `SocketAddr`,
/// defaulting to port 5060 when absent. Returns `None` for anything that
/// isn't already a literal IP (no DNS resolution here).
pub fn socket_addr_from_uri(uri: &str) -> Option<SocketAddr> {
    let without_scheme = uri.strip_prefix("sip:").or_else(|| uri.strip_prefix("sips:")).unwrap_or(uri);
    let without_params = without_scheme.split(';').next().unwrap_or(without_scheme);
    let host_port = match without_params.rsplit_once('@') {
        Some((_, rest)) => rest,
        None => without_params,
    };
    if host_port.contains(':') {
        host_port.parse().ok()
    } else {
        format!("{host_port}:5060").parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leg_remote_addr_takes_priority() {
        let addr: SocketAddr = "203.0.113.5:6000".parse().unwrap();
        assert_eq!(resolve_destination(Some(addr), "sip:bob@192.0.2.1:5060"), Some(addr));
    }

    #[test]
    fn parses_literal_ip_with_explicit_port() {
        assert_eq!(socket_addr_from_uri("sip:bob@192.0.2.1:5070"), Some("192.0.2.1:5070".parse().unwrap()));
    }

    #[test]
    fn defaults_to_port_5060() {
        assert_eq!(socket_addr_from_uri("sip:bob@192.0.2.1"), Some("192.0.2.1:5060".parse().unwrap()));
    }

    #[test]
    fn hostnames_without_dns_resolution_are_unresolved() {
        assert_eq!(socket_addr_from_uri("sip:bob@example.com"), None);
    }
}
