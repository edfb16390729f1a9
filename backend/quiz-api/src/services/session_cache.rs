use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::metrics::SESSIONS_CACHED;
use crate::models::CandidateSession;

type Slot = Arc<Mutex<Option<CandidateSession>>>;

/// Exclusive access to one candidate's cached session.
///
/// `None` means the candidate has not been loaded into this process yet.
pub type SessionGuard = OwnedMutexGuard<Option<CandidateSession>>;

/// Process-wide candidate -> session map with per-candidate locking.
///
/// Entries are never evicted; a candidate takes the quiz once. The cache has
/// no store access: loading a missing session is the caller's job.
#[derive(Default)]
pub struct SessionCache {
    entries: DashMap<String, Slot>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to the candidate's slot.
    ///
    /// Requests for the same candidate are serialized through this guard;
    /// requests for different candidates never contend.
    pub async fn lock(&self, candidate_id: &str) -> SessionGuard {
        let slot = Arc::clone(&self.entries.entry(candidate_id.to_string()).or_default());
        slot.lock_owned().await
    }

    pub async fn get(&self, candidate_id: &str) -> Option<CandidateSession> {
        let slot = self.entries.get(candidate_id).map(|entry| Arc::clone(&entry))?;
        let guard = slot.lock().await;
        guard.clone()
    }

    pub async fn put(&self, candidate_id: &str, session: CandidateSession) {
        let mut guard = self.lock(candidate_id).await;
        *guard = Some(session);
        drop(guard);
        self.record_size();
    }

    pub(crate) fn record_size(&self) {
        SESSIONS_CACHED.set(self.entries.len() as i64);
    }
}
