use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::ids::{HuntGroupId, SessionId};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    Bye,
    Cancel,
    Timeout,
    Error,
}

/// Who ended it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndedBy {
    Caller,
    Callee,
    System,
}

/// One session's statistics record, built up across `start`/`connect`/
/// `end` calls rather than all at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallStatsRecord {
    pub session_id: SessionId,
    pub caller_uri: String,
    pub callee_uri: String,
    pub hunt_group_id: Option<HuntGroupId>,
    pub start_time: DateTime<Utc>,
    pub connect_time: Option<DateTime<Utc>>,
    pub answering_member: Option<String>,
    pub end_time: Option<DateTime<Utc>>,
    pub end_reason: Option<EndReason>,
    pub ended_by: Option<EndedBy>,
}

impl CallStatsRecord {
    /// `connect - start`, once connected.
    pub fn setup_duration(&self) -> Option<ChronoDuration> {
        self.connect_time.map(|c| c - self.start_time)
    }

    /// `end - connect`, only meaningful once the call was ever
    /// connected.
    pub fn talk_duration(&self) -> Option<ChronoDuration> {
        match (self.connect_time, self.end_time) {
            (Some(connect), Some(end)) => Some(end - connect),
            _ => None,
        }
    }

    pub fn duration(&self) -> Option<ChronoDuration> {
        self.end_time.map(|end| end - self.start_time)
    }

    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Aggregate counters exposed alongside the per-session records:
/// active/completed counts and average setup/talk durations over
/// every completed record currently retained.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatsSummary {
    pub active_count: usize,
    pub completed_count: usize,
    pub average_setup_secs: f64,
    pub average_talk_secs: f64,
}

/// Keyed by SessionID.
pub struct StatisticsCollector {
    records: Arc<RwLock<HashMap<SessionId, CallStatsRecord>>>,
}

impl StatisticsCollector {
    pub fn new() -> Self {
        StatisticsCollector { records: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub async fn start(&self, session_id: SessionId, caller_uri: String, callee_uri: String, hunt_group_id: Option<HuntGroupId>, now: DateTime<Utc>) {
        let record = CallStatsRecord {
            session_id: session_id.clone(),
            caller_uri,
            callee_uri,
            hunt_group_id,
            start_time: now,
            connect_time: None,
            answering_member: None,
            end_time: None,
            end_reason: None,
            ended_by: None,
        };
        self.records.write().await.insert(session_id, record);
    }

    pub async fn connect(&self, session_id: &SessionId, answering_member: Option<String>, now: DateTime<Utc>) {
        if let Some(record) = self.records.write().await.get_mut(session_id) {
            record.connect_time = Some(now);
            record.answering_member = answering_member;
        }
    }

    pub async fn end(&self, session_id: &SessionId, reason: EndReason, ended_by: EndedBy, now: DateTime<Utc>) {
        if let Some(record) = self.records.write().await.get_mut(session_id) {
            if record.end_time.is_none() {
                record.end_time = Some(now);
                record.end_reason = Some(reason);
                record.ended_by = Some(ended_by);
            }
        }
    }

    pub async fn get(&self, session_id: &SessionId) -> Option<CallStatsRecord> {
        self.records.read().await.get(session_id).cloned()
    }

    pub async fn summary(&self) -> StatsSummary {
        let records = self.records.read().await;
        let active_count = records.values().filter(|r| r.is_active()).count();
        let completed: Vec<&CallStatsRecord> = records.values().filter(|r| !r.is_active()).collect();
        let completed_count = completed.len();

        let setup_secs: Vec<f64> = completed.iter().filter_map(|r| r.setup_duration()).map(|d| d.num_milliseconds() as f64 / 1000.0).collect();
        let talk_secs: Vec<f64> = completed.iter().filter_map(|r| r.talk_duration()).map(|d| d.num_milliseconds() as f64 / 1000.0).collect();

        StatsSummary {
            active_count,
            completed_count,
            average_setup_secs: average(&setup_secs),
            average_talk_secs: average(&talk_secs),
        }
    }

    /// Remove records whose `end_time` is older than `retention` (spec
    /// §4.6.10). Active records (no `end_time`) are never removed here.
    pub async fn cleanup(&self, retention: ChronoDuration, now: DateTime<Utc>) -> usize {
        let cutoff = now - retention;
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.end_time.map(|end| end >= cutoff).unwrap_or(true));
        before - records.len()
    }
}

impl Default for StatisticsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_connect_end_lifecycle_computes_durations() {
        let collector = StatisticsCollector::new();
        let id = SessionId::new();
        let t0 = Utc::now();
        collector.start(id.clone(), "sip:a@x".into(), "sip:b@x".into(), None, t0).await;
        let t1 = t0 + ChronoDuration::seconds(3);
        collector.connect(&id, Some("2001".into()), t1).await;
        let t2 = t1 + ChronoDuration::seconds(60);
        collector.end(&id, EndReason::Bye, EndedBy::Caller, t2).await;

        let record = collector.get(&id).await.unwrap();
        assert_eq!(record.setup_duration().unwrap().num_seconds(), 3);
        assert_eq!(record.talk_duration().unwrap().num_seconds(), 60);
        assert_eq!(record.duration().unwrap().num_seconds(), 63);
        assert!(!record.is_active());
    }

    #[tokio::test]
    async fn end_is_idempotent() {
        let collector = StatisticsCollector::new();
        let id = SessionId::new();
        let t0 = Utc::now();
        collector.start(id.clone(), "a".into(), "b".into(), None, t0).await;
        collector.end(&id, EndReason::Bye, EndedBy::Caller, t0 + ChronoDuration::seconds(5)).await;
        collector.end(&id, EndReason::Timeout, EndedBy::System, t0 + ChronoDuration::seconds(50)).await;
        let record = collector.get(&id).await.unwrap();
        assert_eq!(record.end_reason, Some(EndReason::Bye));
    }

    #[tokio::test]
    async fn summary_counts_active_and_completed() {
        let collector = StatisticsCollector::new();
        let active = SessionId::new();
        let done = SessionId::new();
        let t0 = Utc::now();
        collector.start(active.clone(), "a".into(), "b".into(), None, t0).await;
        collector.start(done.clone(), "a".into(), "b".into(), None, t0).await;
        collector.end(&done, EndReason::Bye, EndedBy::Caller, t0 + ChronoDuration::seconds(10)).await;

        let summary = collector.summary().await;
        assert_eq!(summary.active_count, 1);
        assert_eq!(summary.completed_count, 1);
    }

    #[tokio::test]
    async fn cleanup_removes_only_old_completed_records() {
        let collector = StatisticsCollector::new();
        let old = SessionId::new();
        let recent = SessionId::new();
        let t0 = Utc::now();
        collector.start(old.clone(), "a".into(), "b".into(), None, t0).await;
        collector.end(&old, EndReason::Bye, EndedBy::Caller, t0).await;
        collector.start(recent.clone(), "a".into(), "b".into(), None, t0).await;
        collector.end(&recent, EndReason::Bye, EndedBy::Caller, t0 + ChronoDuration::hours(2)).await;

        let removed = collector.cleanup(ChronoDuration::hours(1), t0 + ChronoDuration::hours(2)).await;
        assert_eq!(removed, 1);
        assert!(collector.get(&old).await.is_none());
        assert!(collector.get(&recent).await.is_some());
    }
}
