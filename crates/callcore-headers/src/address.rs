/// Extract the URI out of an address-type header (`From`, `To`, `Contact`).
///
/// If the header wraps the URI in angle brackets, returns the interior;
/// otherwise takes the first whitespace-delimited token and strips any
/// trailing `;params`.
pub fn extract_uri(header: &str) -> String {
    let header = header.trim();
    if let Some(start) = header.find('<') {
        if let Some(end) = header[start + 1..].find('>') {
            return header[start + 1..start + 1 + end].to_string();
        }
    }
    let token = header.split_whitespace().next().unwrap_or("");
    token.split(';').next().unwrap_or("").to_string()
}

/// Build an address header value: `"display" <uri>;tag=...`.
///
/// Quotes around the display name only appear when `display` is
/// non-empty; the `;tag=` suffix only appears when `tag` is non-empty.
pub fn build_address(uri: &str, display: Option<&str>, tag: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(display) = display.filter(|d| !d.is_empty()) {
        out.push('"');
        out.push_str(display);
        out.push_str("\" ");
    }
    out.push('<');
    out.push_str(uri);
    out.push('>');
    if let Some(tag) = tag.filter(|t| !t.is_empty()) {
        out.push_str(";tag=");
        out.push_str(tag);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_uri_from_angle_brackets() {
        assert_eq!(
            extract_uri("\"Alice\" <sip:alice@example.com>;tag=abc"),
            "sip:alice@example.com"
        );
    }

    #[test]
    fn extracts_bare_uri_without_brackets() {
        assert_eq!(extract_uri("sip:bob@example.com;tag=xyz"), "sip:bob@example.com");
    }

    #[test]
    fn extracts_bare_uri_trims_leading_whitespace() {
        assert_eq!(extract_uri("  sip:bob@example.com "), "sip:bob@example.com");
    }

    #[test]
    fn build_address_omits_quotes_and_tag_when_absent() {
        assert_eq!(build_address("sip:bob@example.com", None, None), "<sip:bob@example.com>");
    }

    #[test]
    fn build_address_includes_display_and_tag() {
        assert_eq!(
            build_address("sip:bob@example.com", Some("Bob"), Some("abc123")),
            "\"Bob\" <sip:bob@example.com>;tag=abc123"
        );
    }

    #[test]
    fn build_address_empty_display_is_treated_as_absent() {
        assert_eq!(build_address("sip:bob@example.com", Some(""), Some("t1")), "<sip:bob@example.com>;tag=t1");
    }

    #[test]
    fn round_trip_uri_and_tag_through_build_address() {
        let header = "\"Alice\" <sip:alice@example.com>;tag=1928301774";
        let uri = extract_uri(header);
        let tag = crate::extract_tag(header);
        let rebuilt = build_address(&uri, None, tag.as_deref());
        assert_eq!(crate::extract_uri(&rebuilt), uri);
        assert_eq!(crate::extract_tag(&rebuilt), tag);
    }
}
