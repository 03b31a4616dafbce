//! Mozi Continuations — the in-memory Continuation Registry (C5).
//!
//! Purely in-process: nothing here touches the durable queue or session
//! store. A continuation request queued for a session is consumed, in full,
//! by the kernel's post-handler processing step and turned into fresh
//! `enqueueInbound` calls; this registry only tracks the FIFO list and the
//! per-session cancellation tombstone that governs it.

#![deny(unsafe_code)]
#![warn(clippy::all)]

use std::collections::HashMap;
use std::sync::Arc;

use mozi_core::SessionKey;
use tokio::sync::RwLock;

/// One queued follow-up turn.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ContinuationRequest {
    /// The prompt text to synthesize into a follow-up inbound envelope.
    pub prompt: String,
    /// Optional delay before the follow-up becomes runnable.
    pub delay_ms: Option<u64>,
    /// Optional human-readable reason, surfaced in logs.
    pub reason: Option<String>,
    /// Opaque caller context carried through to the synthesized envelope.
    #[serde(default)]
    pub context: serde_json::Value,
}

#[derive(Default)]
struct SessionState {
    queue: Vec<ContinuationRequest>,
    cancelled: bool,
}

/// Per-session FIFO continuation queues plus cancellation tombstones.
///
/// Cloning a [`ContinuationRegistry`] creates a new handle to the same
/// underlying state (via `Arc`), matching the shared-handle pattern used
/// elsewhere for in-process registries.
#[derive(Clone, Default)]
pub struct ContinuationRegistry {
    sessions: Arc<RwLock<HashMap<SessionKey, SessionState>>>,
}

impl ContinuationRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `request` for `session_key`. Returns `false` without queuing if
    /// the session is currently tombstoned.
    pub async fn schedule(&self, session_key: &SessionKey, request: ContinuationRequest) -> bool {
        let mut sessions = self.sessions.write().await;
        let state = sessions.entry(session_key.clone()).or_default();
        if state.cancelled {
            return false;
        }
        state.queue.push(request);
        true
    }

    /// Atomically return and clear the queue for `session_key`. Returns an
    /// empty vec if the session is tombstoned, clearing any stray entries
    /// left behind by a schedule that raced the cancellation.
    pub async fn consume(&self, session_key: &SessionKey) -> Vec<ContinuationRequest> {
        let mut sessions = self.sessions.write().await;
        let Some(state) = sessions.get_mut(session_key) else {
            return Vec::new();
        };
        if state.cancelled {
            state.queue.clear();
            return Vec::new();
        }
        std::mem::take(&mut state.queue)
    }

    /// Turn the tombstone on and drop every queued request for
    /// `session_key`. Called by `/stop` and interrupt-mode preemption.
    pub async fn cancel_session(&self, session_key: &SessionKey) {
        let mut sessions = self.sessions.write().await;
        let state = sessions.entry(session_key.clone()).or_default();
        state.cancelled = true;
        state.queue.clear();
    }

    /// Turn the tombstone off for `session_key`. Called at the start of
    /// every handler run, before the continuation queue is consumed again.
    pub async fn resume_session(&self, session_key: &SessionKey) {
        let mut sessions = self.sessions.write().await;
        if let Some(state) = sessions.get_mut(session_key) {
            state.cancelled = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(peer: &str) -> SessionKey {
        SessionKey::new("mozi", "telegram", mozi_core::PeerType::Dm, peer)
    }

    fn request(prompt: &str) -> ContinuationRequest {
        ContinuationRequest { prompt: prompt.to_owned(), delay_ms: None, reason: None, context: serde_json::Value::Null }
    }

    #[tokio::test]
    async fn schedule_then_consume_returns_fifo_order() {
        let registry = ContinuationRegistry::new();
        let session = key("p1");
        assert!(registry.schedule(&session, request("first")).await);
        assert!(registry.schedule(&session, request("second")).await);
        let drained = registry.consume(&session).await;
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].prompt, "first");
        assert_eq!(drained[1].prompt, "second");
    }

    #[tokio::test]
    async fn consume_clears_the_queue() {
        let registry = ContinuationRegistry::new();
        let session = key("p1");
        registry.schedule(&session, request("only")).await;
        assert_eq!(registry.consume(&session).await.len(), 1);
        assert!(registry.consume(&session).await.is_empty());
    }

    #[tokio::test]
    async fn cancelled_session_rejects_schedule_and_drains_queue() {
        let registry = ContinuationRegistry::new();
        let session = key("p1");
        registry.schedule(&session, request("before cancel")).await;
        registry.cancel_session(&session).await;
        assert!(!registry.schedule(&session, request("after cancel")).await);
        assert!(registry.consume(&session).await.is_empty());
    }

    #[tokio::test]
    async fn resume_clears_tombstone_and_allows_scheduling_again() {
        let registry = ContinuationRegistry::new();
        let session = key("p1");
        registry.cancel_session(&session).await;
        registry.resume_session(&session).await;
        assert!(registry.schedule(&session, request("after resume")).await);
        assert_eq!(registry.consume(&session).await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_session_consume_is_empty() {
        let registry = ContinuationRegistry::new();
        assert!(registry.consume(&key("never-seen")).await.is_empty());
    }
}
