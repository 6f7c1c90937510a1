use callcore_headers::parse_digest;
use callcore_message::{HeaderName, Method, Request};

use crate::result::ValidationResult;
use crate::validator::Validator;

/// Priority 20. Applies to INVITE and REGISTER when
/// `require_auth` is set. Only checks parameter shape and realm match;
/// actual credential verification is a collaborator's job.
pub struct AuthValidator {
    pub require_auth: bool,
    pub realm: String,
}

impl Validator for AuthValidator {
    fn priority(&self) -> i32 {
        20
    }

    fn name(&self) -> &str {
        "auth"
    }

    fn applies_to(&self, request: &Request) -> bool {
        self.require_auth && matches!(request.method, Method::Invite | Method::Register)
    }

    fn validate(&self, request: &Request) -> ValidationResult {
        let Some(authorization) = request.headers.get(HeaderName::AUTHORIZATION) else {
            return ValidationResult::reject(401, "Unauthorized");
        };

        let Some(params) = parse_digest(authorization) else {
            return ValidationResult::reject(400, "Bad Request").with_details("Authorization is not a Digest credential");
        };

        for required in ["username", "realm", "nonce", "uri", "response"] {
            if !params.contains_key(required) {
                return ValidationResult::reject(400, "Bad Request").with_details(format!("missing {required} in Authorization"));
            }
        }

        if params.get("realm").map(String::as_str) != Some(self.realm.as_str()) {
            return ValidationResult::reject(401, "Unauthorized").with_details("realm mismatch");
        }

        ValidationResult::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callcore_message::Method;

    fn base_register() -> Request {
        let mut req = Request::new(Method::Register, "sip:example.com");
        req.headers.append(HeaderName::VIA, "SIP/2.0/UDP a.example:5060");
        req.headers.append(HeaderName::FROM, "<sip:alice@example.com>;tag=abc");
        req.headers.append(HeaderName::TO, "<sip:alice@example.com>");
        req.headers.append(HeaderName::CALL_ID, "a@c");
        req.headers.append(HeaderName::CSEQ, "1 REGISTER");
        req
    }

    fn validator() -> AuthValidator {
        AuthValidator { require_auth: true, realm: "example.com".to_string() }
    }

    #[test]
    fn missing_authorization_is_401() {
        assert_eq!(validator().validate(&base_register()).error_code, 401);
    }

    #[test]
    fn non_digest_prefix_is_400() {
        let mut req = base_register();
        req.headers.append(HeaderName::AUTHORIZATION, "Basic dXNlcjpwYXNz");
        assert_eq!(validator().validate(&req).error_code, 400);
    }

    #[test]
    fn missing_required_param_is_400() {
        let mut req = base_register();
        req.headers.append(HeaderName::AUTHORIZATION, "Digest username=\"alice\", realm=\"example.com\"");
        assert_eq!(validator().validate(&req).error_code, 400);
    }

    #[test]
    fn realm_mismatch_is_401() {
        let mut req = base_register();
        req.headers.append(
            HeaderName::AUTHORIZATION,
            "Digest username=\"alice\", realm=\"other.com\", nonce=\"n\", uri=\"sip:example.com\", response=\"r\"",
        );
        assert_eq!(validator().validate(&req).error_code, 401);
    }

    #[test]
    fn well_formed_matching_realm_is_valid() {
        let mut req = base_register();
        req.headers.append(
            HeaderName::AUTHORIZATION,
            "Digest username=\"alice\", realm=\"example.com\", nonce=\"n\", uri=\"sip:example.com\", response=\"r\"",
        );
        assert!(validator().validate(&req).valid);
    }

    #[test]
    fn does_not_apply_when_require_auth_is_false() {
        let v = AuthValidator { require_auth: false, realm: "example.com".to_string() };
        assert!(!v.applies_to(&base_register()));
    }

    #[test]
    fn applies_to_invite_and_register_only() {
        let v = validator();
        let mut bye = base_register();
        bye.method = Method::Bye;
        assert!(!v.applies_to(&bye));
    }
}
