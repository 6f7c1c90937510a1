use std::time::Duration;

/// Knobs the B2BUA & hunt engine needs (`session_timeout`,
/// `cleanup_interval`) plus the identity the server presents on the
/// wire (`server_host`, `contact`).
#[derive(Debug, Clone)]
pub struct B2buaConfig {
    /// What this server calls itself in Via/Contact/From when
    /// originating the callee leg.
    pub server_host: String,
    pub contact: String,
    /// A session idle longer than this (with no terminal status) is
    /// swept by the periodic cleanup task. Default 30 min.
    pub session_timeout: Duration,
    /// How often the cleanup task runs. Default 5 min.
    pub cleanup_interval: Duration,
}

impl Default for B2buaConfig {
    fn default() -> Self {
        B2buaConfig {
            server_host: "sip.local:5060".to_string(),
            contact: "sip:server@sip.local:5060".to_string(),
            session_timeout: Duration::from_secs(30 * 60),
            cleanup_interval: Duration::from_secs(5 * 60),
        }
    }
}
