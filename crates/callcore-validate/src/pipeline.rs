use callcore_message::Request;

use crate::result::ValidationResult;
use crate::validator::Validator;

/// The priority-ordered validator chain.
///
/// Evaluation is side-effect free apart from building the `ValidationResult`:
/// validators are pure functions of the request. The chain iterates in
/// ascending priority order, skips validators whose `applies_to` is false,
/// and returns the first result that is invalid or asks to stop; otherwise
/// it reports success.
pub struct Pipeline {
    validators: Vec<Box<dyn Validator>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline { validators: Vec::new() }
    }

    /// Insert a validator, keeping the chain sorted by priority. If a
    /// validator with the same `name()` is already present, it is
    /// replaced — re-registering under the same name is how a caller
    /// updates one in place.
    pub fn insert(&mut self, validator: Box<dyn Validator>) {
        self.remove(validator.name());
        self.validators.push(validator);
        self.validators.sort_by_key(|v| v.priority());
    }

    /// Remove the validator registered under `name`, if any. Matches the
    /// spec's own phrasing of `Name` as "a stable identifier for removal".
    pub fn remove(&mut self, name: &str) {
        self.validators.retain(|v| v.name() != name);
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Run the chain against `request`, in priority order.
    pub fn evaluate(&self, request: &Request) -> ValidationResult {
        for validator in &self.validators {
            if !validator.applies_to(request) {
                continue;
            }
            let result = validator.validate(request);
            if !result.valid || result.should_stop {
                return result;
            }
        }
        ValidationResult::ok()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
