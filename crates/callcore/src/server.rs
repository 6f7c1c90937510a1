use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use callcore_b2bua::collaborators::{MessageParser, Transport, TransactionSource, UserStore};
use callcore_b2bua::{B2buaEngine, EndReason, EndedBy};
use callcore_dialog::DialogRegistry;
use callcore_message::Request;
use callcore_timer::SessionTimerManager;
use callcore_validate::{Pipeline, ValidationResult};

use crate::config::Config;

/// Wires one `DialogRegistry`, one `SessionTimerManager`, one
/// `Pipeline`, and one `B2buaEngine` into the single process-wide
/// set of global singletons and sequences their `start`/`stop`
/// lifecycle. No individual component reaches into another's
/// shutdown — this is the only place that does.
pub struct Server {
    config: Config,
    dialogs: Arc<DialogRegistry>,
    timers: Arc<SessionTimerManager>,
    pipeline: RwLock<Pipeline>,
    engine: Arc<B2buaEngine>,
}

impl Server {
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        parser: Arc<dyn MessageParser>,
        transactions: Arc<dyn TransactionSource>,
        user_store: Arc<dyn UserStore>,
    ) -> Arc<Self> {
        let dialogs = Arc::new(DialogRegistry::new());
        let timers = Arc::new(SessionTimerManager::new(config.timer.clone()));
        let pipeline = RwLock::new(config.build_pipeline());
        let engine = B2buaEngine::new(config.b2bua.clone(), dialogs.clone(), timers.clone(), transport, parser, transactions, user_store);

        Arc::new(Server { config, dialogs, timers, pipeline, engine })
    }

    pub fn dialogs(&self) -> &Arc<DialogRegistry> {
        &self.dialogs
    }

    pub fn timers(&self) -> &Arc<SessionTimerManager> {
        &self.timers
    }

    pub fn engine(&self) -> &Arc<B2buaEngine> {
        &self.engine
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run `request` through the validation pipeline. Does not consult
    /// the engine or dialog registry; the caller decides what to do
    /// with a rejecting `ValidationResult`, building the canonical
    /// error response via `callcore_validate::build_error_response`.
    pub async fn validate(&self, request: &Request) -> ValidationResult {
        self.pipeline.read().await.evaluate(request)
    }

    /// Re-register a validator under its own name, replacing any
    /// existing one with the same name.
    pub async fn insert_validator(&self, validator: Box<dyn callcore_validate::Validator>) {
        self.pipeline.write().await.insert(validator);
    }

    pub async fn remove_validator(&self, name: &str) {
        self.pipeline.write().await.remove(name);
    }

    /// Start every background task the core owns: the Session-Timer
    /// sweep, the termination-callback bridge from timer expiry to
    /// session teardown, and the B2BUA idle-session sweep.
    pub async fn start(self: &Arc<Self>) {
        self.engine.install_termination_callback().await;
        self.timers.start_cleanup_timer().await;
        self.engine.start_cleanup_task().await;
        info!("callcore server started");
    }

    /// Shutdown order: stop accepting new messages, stop
    /// the Session-Timer cleanup sweep, end every active session, stop
    /// the B2BUA cleanup task, then flush statistics. "Stop accepting
    /// new messages" is the embedding process's dispatch loop, not this
    /// core's concern — nothing to do here but document the ordering
    /// constraint it implies (every session end below must happen
    /// before the caller actually releases its transport).
    pub async fn stop(&self) {
        self.timers.stop_cleanup_timer().await;

        for session_id in self.engine.active_session_ids() {
            let _ = self.engine.end_session(&session_id, EndReason::Error, EndedBy::System).await;
        }

        self.engine.stop_cleanup_task().await;

        let summary = self.engine.stats().summary().await;
        info!(active = summary.active_count, completed = summary.completed_count, "callcore server stopped, statistics flushed");
    }
}
