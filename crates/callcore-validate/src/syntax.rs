use callcore_message::{HeaderName, Request};

use crate::result::ValidationResult;
use crate::validator::Validator;

/// Priority 1: rejects structurally broken requests before anything
/// downstream has to reason about them.
pub struct SyntaxValidator;

impl Validator for SyntaxValidator {
    fn priority(&self) -> i32 {
        1
    }

    fn name(&self) -> &str {
        "syntax"
    }

    fn applies_to(&self, _request: &Request) -> bool {
        true
    }

    fn validate(&self, request: &Request) -> ValidationResult {
        let method = request.method.as_str();
        if method.is_empty() || method.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return ValidationResult::reject(400, "Bad Request").with_details("empty or malformed method");
        }
        if request.uri.is_empty() {
            return ValidationResult::reject(400, "Bad Request").with_details("empty Request-URI");
        }
        for required in [HeaderName::VIA, HeaderName::FROM, HeaderName::TO, HeaderName::CALL_ID, HeaderName::CSEQ] {
            if !request.headers.contains(required) {
                return ValidationResult::reject(400, "Bad Request").with_details(format!("missing {required} header"));
            }
        }
        let cseq = request.headers.get(HeaderName::CSEQ).unwrap_or_default();
        if cseq.split_whitespace().count() != 2 {
            return ValidationResult::reject(400, "Bad Request").with_details("malformed CSeq");
        }
        if let Some(content_length) = request.headers.get(HeaderName::CONTENT_LENGTH) {
            if content_length.trim().parse::<u64>().is_err() {
                return ValidationResult::reject(400, "Bad Request").with_details("non-numeric Content-Length");
            }
        }
        ValidationResult::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callcore_message::Method;

    fn valid_request() -> Request {
        let mut req = Request::new(Method::Invite, "sip:bob@example.com");
        req.headers.append(HeaderName::VIA, "SIP/2.0/UDP a.example:5060;branch=z9hG4bK1");
        req.headers.append(HeaderName::FROM, "<sip:alice@example.com>;tag=abc");
        req.headers.append(HeaderName::TO, "<sip:bob@example.com>");
        req.headers.append(HeaderName::CALL_ID, "a@c");
        req.headers.append(HeaderName::CSEQ, "1 INVITE");
        req
    }

    #[test]
    fn well_formed_request_is_valid() {
        assert!(SyntaxValidator.validate(&valid_request()).valid);
    }

    #[test]
    fn empty_request_uri_is_rejected() {
        let mut req = valid_request();
        req.uri = String::new();
        let result = SyntaxValidator.validate(&req);
        assert!(!result.valid);
        assert_eq!(result.error_code, 400);
    }

    #[test]
    fn missing_call_id_is_rejected() {
        let mut req = valid_request();
        req.headers.remove(HeaderName::CALL_ID);
        assert!(!SyntaxValidator.validate(&req).valid);
    }

    #[test]
    fn cseq_with_one_token_is_rejected() {
        let mut req = valid_request();
        req.headers.set(HeaderName::CSEQ, "1");
        assert!(!SyntaxValidator.validate(&req).valid);
    }

    #[test]
    fn non_numeric_content_length_is_rejected() {
        let mut req = valid_request();
        req.headers.set(HeaderName::CONTENT_LENGTH, "abc");
        assert!(!SyntaxValidator.validate(&req).valid);
    }

    #[test]
    fn numeric_content_length_is_accepted() {
        let mut req = valid_request();
        req.headers.set(HeaderName::CONTENT_LENGTH, "42");
        assert!(SyntaxValidator.validate(&req).valid);
    }
}
