use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::RwLock;

use callcore_message::Method;

use crate::correlation::{CorrelationId, TransactionCorrelation};
use crate::dialog::Dialog;
use crate::error::{DialogError, DialogResult};
use crate::id::DialogId;

/// A registry of dialogs and transaction correlations.
///
/// Each dialog is wrapped in its own `tokio::sync::RwLock`, so a caller
/// reading or mutating one dialog never blocks on another. The
/// `DashMap`s provide the registry-wide structural lock — held only for
/// insertion and index bookkeeping, never across an await point that
/// could call back into user code.
pub struct DialogRegistry {
    dialogs: DashMap<DialogId, Arc<RwLock<Dialog>>>,
    by_call_id: DashMap<String, Vec<DialogId>>,
    correlations: DashMap<CorrelationId, Arc<RwLock<TransactionCorrelation>>>,
    correlations_by_aleg: DashMap<String, CorrelationId>,
    correlations_by_bleg: DashMap<String, CorrelationId>,
}

impl DialogRegistry {
    pub fn new() -> Self {
        DialogRegistry {
            dialogs: DashMap::new(),
            by_call_id: DashMap::new(),
            correlations: DashMap::new(),
            correlations_by_aleg: DashMap::new(),
            correlations_by_bleg: DashMap::new(),
        }
    }

    pub fn create_dialog(&self, call_id: &str, local_uri: &str, remote_uri: &str, local_tag: &str, remote_tag: &str) -> DialogId {
        let now = Utc::now();
        let dialog = Dialog::new(call_id.to_string(), local_uri.to_string(), remote_uri.to_string(), local_tag.to_string(), remote_tag.to_string(), now);
        let id = dialog.id().clone();
        self.dialogs.insert(id.clone(), Arc::new(RwLock::new(dialog)));
        self.by_call_id.entry(call_id.to_string()).or_default().push(id.clone());
        id
    }

    /// O(1) primary lookup.
    pub fn find(&self, id: &DialogId) -> Option<Arc<RwLock<Dialog>>> {
        self.dialogs.get(id).map(|entry| entry.value().clone())
    }

    /// O(k) scan of the Call-ID bucket; matches `(local, remote)` in
    /// either order so the caller does not need to know its own role.
    pub async fn find_by_tags(&self, call_id: &str, tag_a: &str, tag_b: &str) -> Option<Arc<RwLock<Dialog>>> {
        let bucket = self.by_call_id.get(call_id)?.clone();
        for id in bucket {
            if let Some(handle) = self.dialogs.get(&id).map(|e| e.value().clone()) {
                let dialog = handle.read().await;
                let tags_match = (dialog.local_tag() == tag_a && dialog.remote_tag() == tag_b) || (dialog.local_tag() == tag_b && dialog.remote_tag() == tag_a);
                if tags_match {
                    drop(dialog);
                    return Some(handle);
                }
            }
        }
        None
    }

    pub async fn confirm(&self, id: &DialogId) -> DialogResult<()> {
        let handle = self.find(id).ok_or_else(|| DialogError::NotFound(id.to_string()))?;
        let mut dialog = handle.write().await;
        dialog.confirm(Utc::now())
    }

    /// Idempotent: terminating an already-terminated or
    /// unknown dialog is not an error — the caller may race a cleanup
    /// path against a peer's own BYE.
    pub async fn terminate(&self, id: &DialogId) {
        if let Some(handle) = self.find(id) {
            let mut dialog = handle.write().await;
            dialog.terminate(Utc::now());
        }
    }

    /// Atomic pre-increment. Wrap is reported as
    /// `DialogError::CSeqOverflow`, a fatal invariant violation the
    /// caller is expected to escalate rather than swallow.
    pub async fn next_local_cseq(&self, id: &DialogId) -> DialogResult<u32> {
        let handle = self.find(id).ok_or_else(|| DialogError::NotFound(id.to_string()))?;
        let mut dialog = handle.write().await;
        dialog.next_local_cseq(Utc::now())
    }

    /// Monotonic max per RFC 3261 Section 12.2.1.1: smaller-or-equal values are silently
    /// ignored, never rejected.
    pub async fn update_remote_cseq(&self, id: &DialogId, n: u32) -> DialogResult<()> {
        let handle = self.find(id).ok_or_else(|| DialogError::NotFound(id.to_string()))?;
        let mut dialog = handle.write().await;
        dialog.update_remote_cseq(n, Utc::now());
        Ok(())
    }

    pub async fn set_remote_target(&self, id: &DialogId, target: &str) -> DialogResult<()> {
        let handle = self.find(id).ok_or_else(|| DialogError::NotFound(id.to_string()))?;
        let mut dialog = handle.write().await;
        dialog.set_remote_target(target, Utc::now());
        Ok(())
    }

    pub async fn set_route_set(&self, id: &DialogId, route_set: Vec<String>) -> DialogResult<()> {
        let handle = self.find(id).ok_or_else(|| DialogError::NotFound(id.to_string()))?;
        let mut dialog = handle.write().await;
        dialog.set_route_set(route_set, Utc::now());
        Ok(())
    }

    /// First-wins latch of the remote tag. Renames
    /// the dialog's index entry since its `DialogId` is derived from the
    /// tag pair.
    pub async fn latch_remote_tag(&self, id: &DialogId, tag: &str) -> DialogResult<()> {
        let handle = self.find(id).ok_or_else(|| DialogError::NotFound(id.to_string()))?;
        let mut dialog = handle.write().await;
        let call_id = dialog.call_id().to_string();
        dialog.latch_remote_tag(tag, Utc::now());
        let new_id = dialog.id().clone();
        drop(dialog);
        if &new_id != id {
            self.dialogs.remove(id);
            self.dialogs.insert(new_id.clone(), handle);
            let mut bucket = self.by_call_id.entry(call_id).or_default();
            bucket.retain(|existing| existing != id);
            bucket.push(new_id);
        }
        Ok(())
    }

    pub fn list_dialogs(&self) -> Vec<DialogId> {
        self.dialogs.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn dialog_count(&self) -> usize {
        self.dialogs.len()
    }

    pub fn has_dialog(&self, id: &DialogId) -> bool {
        self.dialogs.contains_key(id)
    }

    // -- Transaction correlation -------------------------------------

    pub fn create_correlation(&self, a_leg_txn: &str, b_leg_txn: &str, method: Method) -> CorrelationId {
        let correlation = TransactionCorrelation::new(a_leg_txn.to_string(), b_leg_txn.to_string(), method);
        let id = correlation.id().clone();
        self.correlations.insert(id.clone(), Arc::new(RwLock::new(correlation)));
        self.correlations_by_aleg.insert(a_leg_txn.to_string(), id.clone());
        self.correlations_by_bleg.insert(b_leg_txn.to_string(), id.clone());
        id
    }

    pub fn find_by_aleg(&self, a_leg_txn: &str) -> Option<Arc<RwLock<TransactionCorrelation>>> {
        let id = self.correlations_by_aleg.get(a_leg_txn)?.clone();
        self.correlations.get(&id).map(|e| e.value().clone())
    }

    pub fn find_by_bleg(&self, b_leg_txn: &str) -> Option<Arc<RwLock<TransactionCorrelation>>> {
        let id = self.correlations_by_bleg.get(b_leg_txn)?.clone();
        self.correlations.get(&id).map(|e| e.value().clone())
    }

    pub async fn complete_correlation(&self, id: &CorrelationId) -> DialogResult<()> {
        let handle = self.correlations.get(id).map(|e| e.value().clone()).ok_or_else(|| DialogError::CorrelationNotFound(id.to_string()))?;
        let mut correlation = handle.write().await;
        correlation.complete();
        Ok(())
    }

    pub async fn terminate_correlation(&self, id: &CorrelationId) {
        if let Some(handle) = self.correlations.get(id).map(|e| e.value().clone()) {
            let mut correlation = handle.write().await;
            correlation.terminate();
        }
    }
}

impl Default for DialogRegistry {
    fn default() -> Self {
        Self::new()
    }
}
