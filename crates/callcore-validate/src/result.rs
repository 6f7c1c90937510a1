use std::collections::HashMap;

/// Outcome of one validator's check against a request.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub error_code: u16,
    pub error_reason: String,
    pub details: String,
    /// Stop the chain even on a `valid` result. No built-in validator
    /// sets this on success today, but the shape is part of the
    /// contract so a future validator can short-circuit later ones.
    pub should_stop: bool,
    pub context: HashMap<String, String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        ValidationResult { valid: true, ..Default::default() }
    }

    pub fn reject(error_code: u16, error_reason: impl Into<String>) -> Self {
        ValidationResult { valid: false, error_code, error_reason: error_reason.into(), should_stop: true, ..Default::default() }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}
