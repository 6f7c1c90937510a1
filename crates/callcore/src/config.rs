use callcore_b2bua::B2buaConfig;
use callcore_timer::Config as TimerConfig;
use callcore_validate::{AuthValidator, Pipeline, SessionTimerValidator, SyntaxValidator};

/// Aggregates the per-crate config structs into the one object a caller
/// builds to stand up a [`crate::Server`]. There is no file/env loader
/// here — that belongs to the embedding process — but every field can
/// be set in code or in a test without one.
#[derive(Debug, Clone)]
pub struct Config {
    pub timer: TimerConfig,
    pub b2bua: B2buaConfig,
    /// Reject INVITEs lacking RFC 4028 support.
    pub require_support: bool,
    /// Reject INVITE/REGISTER lacking a valid Authorization.
    pub require_auth: bool,
    pub realm: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timer: TimerConfig::default(),
            b2bua: B2buaConfig::default(),
            require_support: true,
            require_auth: false,
            realm: "sip.local".to_string(),
        }
    }
}

impl Config {
    /// Build the validation pipeline this configuration describes, in
    /// priority order (syntax, then session-timer, then auth).
    pub fn build_pipeline(&self) -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline.insert(Box::new(SyntaxValidator));
        pipeline.insert(Box::new(SessionTimerValidator { require_support: self.require_support, min_se: self.timer.min_se }));
        pipeline.insert(Box::new(AuthValidator { require_auth: self.require_auth, realm: self.realm.clone() }));
        pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pipeline_has_all_three_validators() {
        let pipeline = Config::default().build_pipeline();
        assert_eq!(pipeline.len(), 3);
    }
}
