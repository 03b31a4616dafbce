//! In-process guard set enforcing at most one handler invocation per session
//! at a time. Distinct sessions run fully in parallel.

use std::collections::HashSet;
use std::sync::Arc;

use mozi_core::SessionKey;
use tokio::sync::Mutex;

/// Tracks which sessions currently have a claimed item running.
#[derive(Clone, Default)]
pub struct ActiveSessions(Arc<Mutex<HashSet<SessionKey>>>);

impl ActiveSessions {
    /// Build an empty guard set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to mark `key` active. Returns `false` if it was already active.
    pub async fn try_acquire(&self, key: &SessionKey) -> bool {
        let mut active = self.0.lock().await;
        if active.contains(key) {
            false
        } else {
            active.insert(key.clone());
            true
        }
    }

    /// Release `key`, allowing its next queue item to be claimed.
    pub async fn release(&self, key: &SessionKey) {
        self.0.lock().await.remove(key);
    }

    /// Whether `key` currently has a handler running.
    pub async fn contains(&self, key: &SessionKey) -> bool {
        self.0.lock().await.contains(key)
    }
}
