use callcore_message::{HeaderName, Request, Response};
use callcore_headers::{extract_tag, generate_branch, format_digest_challenge};

use crate::result::ValidationResult;

/// Build the canonical error response for a failing [`ValidationResult`]:
/// copy Via/From/Call-ID/CSeq verbatim, copy To with a generated tag if
/// it has none, attach code-specific headers, and attach `details` as
/// a `text/plain` body when present.
pub fn build_error_response(request: &Request, result: &ValidationResult, realm: &str) -> Response {
    let mut response = Response::new(result.error_code, result.error_reason.clone());

    for name in [HeaderName::VIA, HeaderName::FROM, HeaderName::CALL_ID, HeaderName::CSEQ] {
        for value in request.headers.get_all(name) {
            response.headers.append(name, value);
        }
    }

    if let Some(to) = request.headers.get(HeaderName::TO) {
        let to = if extract_tag(to).is_some() {
            to.to_string()
        } else {
            format!("{to};tag={}", generate_branch_tag())
        };
        response.headers.set(HeaderName::TO, to);
    }

    match result.error_code {
        401 => {
            let nonce = generate_branch_tag();
            response.headers.set(HeaderName::WWW_AUTHENTICATE, format_digest_challenge(realm, &nonce, "MD5"));
        }
        421 => {
            let feature = result.context.get("feature").map(String::as_str).unwrap_or("timer");
            response.headers.set(HeaderName::REQUIRE, feature);
        }
        422 => {
            if let Some(min_se) = result.context.get("min_se") {
                response.headers.set(HeaderName::MIN_SE, min_se.clone());
            }
        }
        _ => {}
    }

    if !result.details.is_empty() {
        response.headers.set(HeaderName::CONTENT_TYPE, "text/plain");
        response = response.with_body(result.details.clone().into_bytes());
    }

    response
}

/// A unique-enough token for a generated tag or digest nonce. Branch
/// generation already produces exactly this shape (random, collision
/// resistant within a process), so it is reused rather than duplicated.
fn generate_branch_tag() -> String {
    generate_branch().trim_start_matches("z9hG4bK").to_string()
}
