//! Session Repository (C2): the persistent half of the Session Manager's
//! write-through cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mozi_core::{PeerType, Session, SessionKey, SessionStatus};
use rusqlite::{OptionalExtension, Row, params};

use crate::db::Database;
use crate::error::{StorageError, StorageResult};

/// Durable session row operations.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert `session` if `session.key` is absent. Returns `true` iff a row
    /// was created.
    async fn insert_if_absent(&self, session: &Session) -> StorageResult<bool>;

    /// Fetch a session row by key.
    async fn get(&self, key: &SessionKey) -> StorageResult<Option<Session>>;

    /// Overwrite every mutable column and stamp `last_active_at`.
    async fn upsert(&self, session: &Session) -> StorageResult<()>;
}

/// SQLite-backed [`SessionRepository`].
pub struct SqliteSessionRepository {
    db: Database,
}

impl SqliteSessionRepository {
    /// Wrap an open [`Database`].
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let peer_type_raw: String = row.get("peer_type")?;
    let status_raw: String = row.get("status")?;
    let metadata_raw: String = row.get("metadata")?;
    let parent_raw: Option<String> = row.get("parent_key")?;
    Ok(Session {
        key: SessionKey::from(row.get::<_, String>("session_key")?),
        agent_id: row.get("agent_id")?,
        channel: row.get("channel")?,
        peer_id: row.get("peer_id")?,
        peer_type: peer_type_raw.parse().unwrap_or_default(),
        status: SessionStatus::from_stored(&status_raw),
        parent_key: parent_raw.map(SessionKey::from),
        metadata: serde_json::from_str(&metadata_raw).unwrap_or(serde_json::Value::Null),
        created_at: row.get("created_at")?,
        last_active_at: row.get("last_active_at")?,
    })
}

const SELECT_COLUMNS: &str =
    "session_key, agent_id, channel, peer_id, peer_type, status, parent_key, metadata, created_at, last_active_at";

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn insert_if_absent(&self, session: &Session) -> StorageResult<bool> {
        let session = session.clone();
        self.db
            .call(move |conn| {
                let metadata_raw = serde_json::to_string(&session.metadata)
                    .map_err(|source| StorageError::Corrupt { table: "sessions", source })?;
                let changed = conn.execute(
                    "INSERT OR IGNORE INTO sessions \
                     (session_key, agent_id, channel, peer_id, peer_type, status, parent_key, metadata, \
                      created_at, last_active_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        session.key.as_str(),
                        session.agent_id,
                        session.channel,
                        session.peer_id,
                        session.peer_type.to_string(),
                        session.status.as_str(),
                        session.parent_key.as_ref().map(SessionKey::as_str),
                        metadata_raw,
                        session.created_at,
                        session.last_active_at,
                    ],
                )?;
                Ok(changed == 1)
            })
            .await
    }

    async fn get(&self, key: &SessionKey) -> StorageResult<Option<Session>> {
        let key = key.as_str().to_owned();
        self.db
            .call(move |conn| {
                let sql = format!("SELECT {SELECT_COLUMNS} FROM sessions WHERE session_key = ?1");
                conn.query_row(&sql, params![key], row_to_session).optional().map_err(StorageError::from)
            })
            .await
    }

    async fn upsert(&self, session: &Session) -> StorageResult<()> {
        let session = session.clone();
        self.db
            .call(move |conn| {
                let metadata_raw = serde_json::to_string(&session.metadata)
                    .map_err(|source| StorageError::Corrupt { table: "sessions", source })?;
                conn.execute(
                    "INSERT INTO sessions \
                     (session_key, agent_id, channel, peer_id, peer_type, status, parent_key, metadata, \
                      created_at, last_active_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                     ON CONFLICT(session_key) DO UPDATE SET \
                       status = excluded.status, \
                       parent_key = excluded.parent_key, \
                       metadata = excluded.metadata, \
                       last_active_at = excluded.last_active_at",
                    params![
                        session.key.as_str(),
                        session.agent_id,
                        session.channel,
                        session.peer_id,
                        session.peer_type.to_string(),
                        session.status.as_str(),
                        session.parent_key.as_ref().map(SessionKey::as_str),
                        metadata_raw,
                        session.created_at,
                        session.last_active_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }
}
