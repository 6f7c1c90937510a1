use callcore_headers::parse_session_expires;
use callcore_message::{HeaderName, Method, Request};

use crate::result::ValidationResult;
use crate::validator::Validator;

/// Priority 10, INVITE-only: enforces RFC 4028 support and the
/// Min-SE floor ahead of authentication.
pub struct SessionTimerValidator {
    pub require_support: bool,
    pub min_se: u32,
}

impl Validator for SessionTimerValidator {
    fn priority(&self) -> i32 {
        10
    }

    fn name(&self) -> &str {
        "session-timer"
    }

    fn applies_to(&self, request: &Request) -> bool {
        request.method == Method::Invite
    }

    fn validate(&self, request: &Request) -> ValidationResult {
        let session_expires = request.headers.get(HeaderName::SESSION_EXPIRES);
        let supports_timer = request.headers.get(HeaderName::SUPPORTED).map(|v| v.split(',').any(|tok| tok.trim().eq_ignore_ascii_case("timer"))).unwrap_or(false);

        if self.require_support && session_expires.is_none() && !supports_timer {
            return ValidationResult::reject(421, "Extension Required").with_context("feature", "timer");
        }

        let Some(session_expires) = session_expires else {
            return ValidationResult::ok();
        };

        // `parse_session_expires` already rejects any refresher other
        // than `uac`/`uas` by returning `None`.
        let Some((expires, _refresher)) = parse_session_expires(session_expires) else {
            return ValidationResult::reject(400, "Bad Request").with_details("malformed Session-Expires or refresher");
        };

        if expires < self.min_se {
            return ValidationResult::reject(422, "Session Interval Too Small").with_context("min_se", self.min_se.to_string());
        }

        if let Some(min_se_header) = request.headers.get(HeaderName::MIN_SE) {
            let Ok(min_se_value) = min_se_header.trim().parse::<u32>() else {
                return ValidationResult::reject(400, "Bad Request").with_details("non-numeric Min-SE");
            };
            if min_se_value > expires {
                return ValidationResult::reject(400, "Bad Request").with_details("Min-SE exceeds Session-Expires");
            }
        }

        ValidationResult::ok()
    }
}
