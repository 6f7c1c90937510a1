use callcore_headers::{build_address, generate_branch};
use callcore_message::{HeaderName, Method, Request};

/// Re-originate `source` onto the opposite leg.
///
/// Builds a fresh request carrying `source`'s body and method, with:
/// - Call-ID replaced with the target leg's Call-ID.
/// - From replaced with the target leg's From (including tag).
/// - To replaced with the target leg's To (including the remote tag once
///   known — `to_tag` is `None` until the peer's response supplies one).
/// - Contact replaced with the server's own Contact.
/// - CSeq replaced with `cseq_number` paired with the request's method.
/// - All existing Via headers dropped and replaced with a single Via
///   pointing at `server_host` with a fresh `z9hG4bK` branch.
/// - `Max-Forwards: 70`.
///
/// The caller resolves `request_uri` and `cseq_number` before calling
/// this (ACK echoes the INVITE's CSeq number rather than advancing it;
/// BYE's Request-URI prefers the dialog's learned remote target) — this
/// function applies the adaptation mechanically once those are decided.
#[allow(clippy::too_many_arguments)]
pub fn adapt_request_for_leg(
    source: &Request,
    request_uri: &str,
    call_id: &str,
    from_uri: &str,
    from_tag: &str,
    to_uri: &str,
    to_tag: Option<&str>,
    contact: &str,
    cseq_number: u32,
    server_host: &str,
) -> Request {
    let mut adapted = Request::new(source.method.clone(), request_uri);
    adapted.body = source.body.clone();

    adapted.headers.set(HeaderName::CALL_ID, call_id);
    adapted.headers.set(HeaderName::FROM, build_address(from_uri, None, Some(from_tag)));
    adapted.headers.set(HeaderName::TO, build_address(to_uri, None, to_tag));
    adapted.headers.set(HeaderName::CONTACT, build_address(contact, None, None));
    adapted.headers.set(HeaderName::CSEQ, format!("{cseq_number} {}", source.method));
    adapted.headers.set(HeaderName::VIA, via_header(server_host));
    adapted.headers.set(HeaderName::MAX_FORWARDS, "70");

    if let Some(content_type) = source.header(HeaderName::CONTENT_TYPE) {
        adapted.headers.set(HeaderName::CONTENT_TYPE, content_type);
    }
    adapted.headers.set(HeaderName::CONTENT_LENGTH, adapted.body.len().to_string());

    adapted
}

/// A fresh Via pointing at the server with a `z9hG4bK`-prefixed branch,
/// per RFC 3261 Section 8.1.1.7.
pub fn via_header(server_host: &str) -> String {
    format!("SIP/2.0/UDP {server_host};branch={}", generate_branch())
}

/// Build a CANCEL for a pending leg from its own state: method CANCEL,
/// Call-ID, From, To, CSeq = `last_cseq`, Max-Forwards 70, empty body.
pub fn build_cancel(request_uri: &str, call_id: &str, from_uri: &str, from_tag: &str, to_uri: &str, to_tag: Option<&str>, last_cseq: u32, server_host: &str) -> Request {
    let mut cancel = Request::new(Method::Cancel, request_uri);
    cancel.headers.set(HeaderName::CALL_ID, call_id);
    cancel.headers.set(HeaderName::FROM, build_address(from_uri, None, Some(from_tag)));
    cancel.headers.set(HeaderName::TO, build_address(to_uri, None, to_tag));
    cancel.headers.set(HeaderName::CSEQ, format!("{last_cseq} CANCEL"));
    cancel.headers.set(HeaderName::VIA, via_header(server_host));
    cancel.headers.set(HeaderName::MAX_FORWARDS, "70");
    cancel.headers.set(HeaderName::CONTENT_LENGTH, "0");
    cancel
}
