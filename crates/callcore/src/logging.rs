use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

/// Logging knobs, mirroring `infra-common::logging::setup::LoggingConfig`
/// from the reference stack. No crate in this workspace installs a
/// global subscriber on its own (spec's ambient-stack note: "that
/// belongs to the process embedding the core") — this is strictly an
/// opt-in helper for standalone binaries and examples.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub json: bool,
    pub file_info: bool,
    pub log_spans: bool,
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: Level::INFO, json: false, file_info: false, log_spans: false, app_name: "callcore".to_string() }
    }
}

impl LoggingConfig {
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig { level, app_name: app_name.into(), ..Default::default() }
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }
}

/// Install a process-wide `tracing` subscriber built from `config`.
/// Returns an error string rather than panicking if a subscriber is
/// already installed, since that is a caller mistake, not a `CoreError`
/// condition any subsystem here can raise.
pub fn install_default_subscriber(config: LoggingConfig) -> Result<(), String> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let span_events = if config.log_spans { FmtSpan::ACTIVE } else { FmtSpan::NONE };

    let mut subscriber = fmt::Subscriber::builder().with_env_filter(filter).with_span_events(span_events);

    if config.file_info {
        subscriber = subscriber.with_file(true).with_line_number(true);
    }

    let result = if config.json {
        subscriber.with_writer(std::io::stdout).json().try_init()
    } else {
        subscriber.try_init()
    };

    result.map_err(|e| e.to_string())
}

pub fn parse_log_level(level: &str) -> Result<Level, String> {
    Level::from_str(level).map_err(|_| format!("invalid log level: {level}"))
}

pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!("starting {} v{}", app_name, version);
}
