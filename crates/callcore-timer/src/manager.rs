use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::{Notify, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use callcore_message::{Method, Request};

use crate::config::Config;
use crate::error::{TimerError, TimerResult};
use crate::session::{Refresher, Session};

type TerminationCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Process-wide `Call-ID -> Session` table with a background expiry
/// sweep. The table sits behind a single `RwLock` rather than the
/// per-object locks the dialog registry uses — session timers are a
/// much smaller, flatter data set that doesn't need per-entry locking.
pub struct SessionTimerManager {
    config: Config,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    callback: Arc<RwLock<Option<TerminationCallback>>>,
    running: Arc<RwLock<bool>>,
    stop_notify: Arc<Notify>,
}

impl SessionTimerManager {
    pub fn new(config: Config) -> Self {
        SessionTimerManager {
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            callback: Arc::new(RwLock::new(None)),
            running: Arc::new(RwLock::new(false)),
            stop_notify: Arc::new(Notify::new()),
        }
    }

    /// True only for INVITE requests: a session timer is only ever
    /// negotiated on the request that establishes the dialog.
    pub fn is_required(request: &Request) -> bool {
        request.method == Method::Invite
    }

    /// The clamp/default configuration this manager enforces, so a
    /// caller that negotiated a Session-Expires value up front (e.g.
    /// the B2BUA falling back to `default_expires` when a request
    /// omitted the header) can read the same numbers back without
    /// duplicating them.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn create(&self, call_id: &str, requested: u32) -> Session {
        let clamped = self.config.clamp(requested);
        let session = Session {
            call_id: call_id.to_string(),
            expiry: Utc::now() + ChronoDuration::seconds(clamped as i64),
            refresher: Refresher::Uac,
            min_se: self.config.min_se,
        };
        self.sessions.write().await.insert(call_id.to_string(), session.clone());
        session
    }

    pub async fn refresh(&self, call_id: &str) -> TimerResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(call_id).ok_or_else(|| TimerError::NotFound(call_id.to_string()))?;
        session.expiry = Utc::now() + ChronoDuration::seconds(self.config.default_expires as i64);
        Ok(())
    }

    /// Idempotent delete. A re-entrant call from the termination
    /// callback after the sweep already removed the entry is a no-op,
    /// not an error.
    pub async fn remove(&self, call_id: &str) {
        self.sessions.write().await.remove(call_id);
    }

    pub async fn get(&self, call_id: &str) -> Option<Session> {
        self.sessions.read().await.get(call_id).cloned()
    }

    pub async fn set_termination_callback<F>(&self, callback: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        *self.callback.write().await = Some(Arc::new(callback));
    }

    pub async fn start_cleanup_timer(&self) {
        let mut running = self.running.write().await;
        if *running {
            return;
        }
        *running = true;

        let sessions = self.sessions.clone();
        let callback = self.callback.clone();
        let running_flag = self.running.clone();
        let stop_notify = self.stop_notify.clone();
        let cleanup_interval = self.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = interval(cleanup_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            while *running_flag.read().await {
                // Race the tick against the stop signal so `stop_cleanup_timer`
                // wakes this task immediately instead of waiting out the rest
                // of the current interval.
                tokio::select! {
                    _ = ticker.tick() => {},
                    _ = stop_notify.notified() => break,
                }
                if !*running_flag.read().await {
                    break;
                }

                let now = Utc::now();
                let expired: Vec<String> = {
                    let mut guard = sessions.write().await;
                    let expired_ids: Vec<String> = guard.iter().filter(|(_, s)| s.is_expired(now)).map(|(id, _)| id.clone()).collect();
                    for id in &expired_ids {
                        guard.remove(id);
                    }
                    expired_ids
                };

                if expired.is_empty() {
                    continue;
                }
                debug!(count = expired.len(), "session-timer sweep expired call legs");

                // Dispatch outside the lock: the callback may re-enter
                // the manager (e.g. to call `remove`), which must see
                // these entries already gone, not deadlock on the lock
                // this sweep just released.
                let cb = callback.read().await.clone();
                if let Some(cb) = cb {
                    for call_id in expired {
                        cb(call_id);
                    }
                }
            }
            info!("session-timer cleanup task stopped");
        });
    }

    pub async fn stop_cleanup_timer(&self) {
        *self.running.write().await = false;
        self.stop_notify.notify_waiters();
    }
}
