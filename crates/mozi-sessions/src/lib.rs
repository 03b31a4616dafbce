//! Mozi Sessions — the Session Manager (C4): a thin write-through cache in
//! front of the durable [`SessionRepository`].
//!
//! Reads are served from the in-memory map; every write lands in the
//! repository before the cache is updated, so a crash between the two never
//! leaves the durable row stale relative to what callers observed.

#![deny(unsafe_code)]
#![warn(clippy::all)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use mozi_core::{PeerType, Session, SessionKey, SessionStatus};
use mozi_storage::SessionRepository;
use tokio::sync::{RwLock, broadcast};

/// Lifecycle events broadcast as sessions are created or updated.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A session row did not exist and was just created.
    Created(Session),
    /// An existing session was updated.
    Updated(Session),
}

/// Default broadcast channel capacity for session lifecycle events.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Fields a caller may change via [`SessionManager::update`]. Absent fields
/// are left untouched; `last_active_at` always advances.
#[derive(Debug, Clone, Default)]
pub struct SessionChanges {
    /// New status, if changing.
    pub status: Option<SessionStatus>,
    /// New metadata, if changing. Replaces the whole map.
    pub metadata: Option<serde_json::Value>,
}

/// Write-through session cache backed by a [`SessionRepository`].
#[derive(Clone)]
pub struct SessionManager {
    repository: Arc<dyn SessionRepository>,
    cache: Arc<RwLock<HashMap<SessionKey, Session>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    /// Build a manager over `repository` with an empty cache.
    #[must_use]
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self { repository, cache: Arc::new(RwLock::new(HashMap::new())), events }
    }

    /// Subscribe to session lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Fetch `key`, creating it with `defaults` if absent. Broadcasts
    /// [`SessionEvent::Created`] exactly once per session, the first time
    /// it's seen.
    ///
    /// # Errors
    ///
    /// Returns the repository's error if the insert or read fails.
    pub async fn get_or_create(
        &self,
        key: &SessionKey,
        agent_id: &str,
        channel: &str,
        peer_id: &str,
        peer_type: PeerType,
    ) -> mozi_storage::StorageResult<Session> {
        if let Some(session) = self.cache.read().await.get(key).cloned() {
            return Ok(session);
        }

        let now = Utc::now();
        let session = Session {
            key: key.clone(),
            agent_id: agent_id.to_owned(),
            channel: channel.to_owned(),
            peer_id: peer_id.to_owned(),
            peer_type,
            status: SessionStatus::Idle,
            parent_key: None,
            metadata: serde_json::json!({}),
            created_at: now,
            last_active_at: now,
        };

        let inserted = self.repository.insert_if_absent(&session).await?;
        let resolved = if inserted {
            session
        } else {
            self.repository.get(key).await?.unwrap_or(session)
        };

        self.cache.write().await.insert(key.clone(), resolved.clone());
        if inserted {
            let _ = self.events.send(SessionEvent::Created(resolved.clone()));
        }
        Ok(resolved)
    }

    /// Merge `changes` into the session at `key`, advance `last_active_at`,
    /// persist, refresh the cache, and broadcast [`SessionEvent::Updated`].
    /// Unknown status values never reach here: [`SessionStatus`] is a closed
    /// enum, so "enforcing the vocabulary" happens at the type level.
    ///
    /// # Errors
    ///
    /// Returns the repository's error if the session is unknown or the
    /// persist fails.
    pub async fn update(&self, key: &SessionKey, changes: SessionChanges) -> mozi_storage::StorageResult<Session> {
        let mut sessions = self.cache.write().await;
        let mut session = match sessions.get(key).cloned() {
            Some(session) => session,
            None => self
                .repository
                .get(key)
                .await?
                .ok_or_else(|| mozi_storage::StorageError::NotFound(key.as_str().to_owned()))?,
        };

        if let Some(status) = changes.status {
            session.status = status;
        }
        if let Some(metadata) = changes.metadata {
            session.metadata = metadata;
        }
        session.last_active_at = Utc::now();

        self.repository.upsert(&session).await?;
        sessions.insert(key.clone(), session.clone());
        drop(sessions);

        let _ = self.events.send(SessionEvent::Updated(session.clone()));
        Ok(session)
    }

    /// Read a cached session without touching the repository, if present.
    pub async fn peek(&self, key: &SessionKey) -> Option<Session> {
        self.cache.read().await.get(key).cloned()
    }
}
