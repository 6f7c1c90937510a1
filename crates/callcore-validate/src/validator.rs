use callcore_message::Request;

use crate::result::ValidationResult;

/// One check in the validation chain.
pub trait Validator: Send + Sync {
    /// Lower runs first.
    fn priority(&self) -> i32;

    /// Stable identifier, used as the removal key in [`crate::Pipeline`].
    fn name(&self) -> &str;

    /// Whether this validator has anything to say about `request`.
    fn applies_to(&self, request: &Request) -> bool;

    fn validate(&self, request: &Request) -> ValidationResult;
}
