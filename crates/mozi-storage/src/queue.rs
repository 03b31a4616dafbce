//! Queue Repository (C1): the durable row store the pump claims against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mozi_core::{PeerType, QueueItem, QueueItemStatus, SessionKey};
use rusqlite::{OptionalExtension, Row, params};

use crate::db::Database;
use crate::error::{StorageError, StorageResult};

/// Durable queue row operations.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Insert `item`, ignoring the insert if `item.dedup_key` already exists.
    /// Returns `true` iff a new row was inserted.
    async fn enqueue(&self, item: &QueueItem) -> StorageResult<bool>;

    /// Rows with `status ∈ {queued, retrying}` and `available_at ≤ now`,
    /// oldest-enqueued first.
    async fn list_runnable(&self, now: DateTime<Utc>, limit: u32) -> StorageResult<Vec<QueueItem>>;

    /// Conditionally transition `queued|retrying → running`, stamping
    /// `started_at`. Returns `true` iff this call won the race.
    async fn claim(&self, id: &str, now: DateTime<Utc>) -> StorageResult<bool>;

    /// Conditional `running → completed`. `false` means the row was no
    /// longer `running` when the update ran.
    async fn mark_completed_if_running(&self, id: &str, now: DateTime<Utc>) -> StorageResult<bool>;

    /// Conditional `running → failed`, recording `error`.
    async fn mark_failed_if_running(&self, id: &str, error: &str, now: DateTime<Utc>) -> StorageResult<bool>;

    /// Conditional `running → retrying`, recording `error` and postponing
    /// `available_at`.
    async fn mark_retrying_if_running(
        &self,
        id: &str,
        error: &str,
        next_available_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Mass-transition every non-terminal row in `session_key` to
    /// `interrupted`. Returns the number of rows changed.
    async fn mark_interrupted_by_session(
        &self,
        session_key: &SessionKey,
        reason: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<u64>;

    /// Mass-transition the given ids to `interrupted`.
    async fn mark_interrupted_by_ids(&self, ids: &[String], reason: &str, now: DateTime<Utc>) -> StorageResult<u64>;

    /// Crash-recovery hook: every row left `running` becomes `interrupted`.
    /// Called exactly once at kernel start.
    async fn mark_interrupted_from_running(&self, reason: &str, now: DateTime<Utc>) -> StorageResult<u64>;

    /// Most recent `queued` row in `session_key` enqueued at or after
    /// `since`, if any. Used by collect-mode admission.
    async fn find_latest_queued_by_session_since(
        &self,
        session_key: &SessionKey,
        since: DateTime<Utc>,
    ) -> StorageResult<Option<QueueItem>>;

    /// Conditional update requiring `status = queued`: replace
    /// `inbound_json` and postpone `available_at`. Returns `true` iff it won.
    async fn merge_queued_inbound(
        &self,
        id: &str,
        new_inbound: serde_json::Value,
        new_available_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// `{queued, retrying}` rows in `session_key`, oldest-first.
    async fn list_pending_by_session(&self, session_key: &SessionKey) -> StorageResult<Vec<QueueItem>>;

    /// Raw row read by id.
    async fn get_by_id(&self, id: &str) -> StorageResult<Option<QueueItem>>;
}

/// SQLite-backed [`QueueRepository`].
pub struct SqliteQueueRepository {
    db: Database,
}

impl SqliteQueueRepository {
    /// Wrap an open [`Database`].
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    let inbound_raw: String = row.get("inbound_json")?;
    let status_raw: String = row.get("status")?;
    let peer_type_raw: String = row.get("peer_type")?;
    let inbound_json = serde_json::from_str(&inbound_raw).unwrap_or(serde_json::Value::Null);
    Ok(QueueItem {
        id: row.get("id")?,
        dedup_key: row.get("dedup_key")?,
        session_key: SessionKey::from(row.get::<_, String>("session_key")?),
        channel_id: row.get("channel_id")?,
        peer_id: row.get("peer_id")?,
        peer_type: peer_type_raw.parse().unwrap_or_default(),
        inbound_json,
        status: status_raw.parse().unwrap_or(QueueItemStatus::Queued),
        attempts: row.get::<_, i64>("attempts")?.try_into().unwrap_or(0),
        error: row.get("error")?,
        enqueued_at: row.get("enqueued_at")?,
        available_at: row.get("available_at")?,
        started_at: row.get("started_at")?,
        finished_at: row.get("finished_at")?,
        updated_at: row.get("updated_at")?,
    })
}

const SELECT_COLUMNS: &str = "id, dedup_key, session_key, channel_id, peer_id, peer_type, inbound_json, \
     status, attempts, error, enqueued_at, available_at, started_at, finished_at, updated_at";

#[async_trait]
impl QueueRepository for SqliteQueueRepository {
    async fn enqueue(&self, item: &QueueItem) -> StorageResult<bool> {
        let item = item.clone();
        self.db
            .call(move |conn| {
                let inbound_raw = serde_json::to_string(&item.inbound_json)
                    .map_err(|source| StorageError::Corrupt { table: "queue_items", source })?;
                let changed = conn.execute(
                    "INSERT OR IGNORE INTO queue_items \
                     (id, dedup_key, session_key, channel_id, peer_id, peer_type, inbound_json, status, \
                      attempts, error, enqueued_at, available_at, started_at, finished_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    params![
                        item.id,
                        item.dedup_key,
                        item.session_key.as_str(),
                        item.channel_id,
                        item.peer_id,
                        item.peer_type.to_string(),
                        inbound_raw,
                        item.status.as_str(),
                        i64::from(item.attempts),
                        item.error,
                        item.enqueued_at,
                        item.available_at,
                        item.started_at,
                        item.finished_at,
                        item.updated_at,
                    ],
                )?;
                Ok(changed == 1)
            })
            .await
    }

    async fn list_runnable(&self, now: DateTime<Utc>, limit: u32) -> StorageResult<Vec<QueueItem>> {
        self.db
            .call(move |conn| {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM queue_items \
                     WHERE status IN ('queued', 'retrying') AND available_at <= ?1 \
                     ORDER BY enqueued_at ASC LIMIT ?2"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows =
                    stmt.query_map(params![now, i64::from(limit)], row_to_item)?.collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    async fn claim(&self, id: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        let id = id.to_owned();
        self.db
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE queue_items SET status = 'running', started_at = ?1, updated_at = ?1 \
                     WHERE id = ?2 AND status IN ('queued', 'retrying')",
                    params![now, id],
                )?;
                Ok(changed == 1)
            })
            .await
    }

    async fn mark_completed_if_running(&self, id: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        let id = id.to_owned();
        self.db
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE queue_items SET status = 'completed', finished_at = ?1, updated_at = ?1 \
                     WHERE id = ?2 AND status = 'running'",
                    params![now, id],
                )?;
                Ok(changed == 1)
            })
            .await
    }

    async fn mark_failed_if_running(&self, id: &str, error: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        let id = id.to_owned();
        let error = error.to_owned();
        self.db
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE queue_items SET status = 'failed', error = ?1, finished_at = ?2, updated_at = ?2 \
                     WHERE id = ?3 AND status = 'running'",
                    params![error, now, id],
                )?;
                Ok(changed == 1)
            })
            .await
    }

    async fn mark_retrying_if_running(
        &self,
        id: &str,
        error: &str,
        next_available_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let id = id.to_owned();
        let error = error.to_owned();
        self.db
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE queue_items SET status = 'retrying', error = ?1, available_at = ?2, \
                     started_at = NULL, attempts = attempts + 1, updated_at = ?3 \
                     WHERE id = ?4 AND status = 'running'",
                    params![error, next_available_at, now, id],
                )?;
                Ok(changed == 1)
            })
            .await
    }

    async fn mark_interrupted_by_session(
        &self,
        session_key: &SessionKey,
        reason: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let session_key = session_key.as_str().to_owned();
        let reason = reason.to_owned();
        self.db
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE queue_items SET status = 'interrupted', \
                     error = COALESCE(error, ?1), finished_at = COALESCE(finished_at, ?2), updated_at = ?2 \
                     WHERE session_key = ?3 AND status IN ('queued', 'retrying', 'running')",
                    params![reason, now, session_key],
                )?;
                Ok(changed as u64)
            })
            .await
    }

    async fn mark_interrupted_by_ids(&self, ids: &[String], reason: &str, now: DateTime<Utc>) -> StorageResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = ids.to_vec();
        let reason = reason.to_owned();
        self.db
            .call(move |conn| {
                let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
                let sql = format!(
                    "UPDATE queue_items SET status = 'interrupted', \
                     error = COALESCE(error, ?), finished_at = COALESCE(finished_at, ?), updated_at = ? \
                     WHERE id IN ({placeholders}) AND status IN ('queued', 'retrying', 'running')"
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut bound: Vec<&dyn rusqlite::ToSql> = vec![&reason, &now, &now];
                for id in &ids {
                    bound.push(id);
                }
                let changed = stmt.execute(bound.as_slice())?;
                Ok(changed as u64)
            })
            .await
    }

    async fn mark_interrupted_from_running(&self, reason: &str, now: DateTime<Utc>) -> StorageResult<u64> {
        let reason = reason.to_owned();
        self.db
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE queue_items SET status = 'interrupted', error = ?1, finished_at = ?2, updated_at = ?2 \
                     WHERE status = 'running'",
                    params![reason, now],
                )?;
                Ok(changed as u64)
            })
            .await
    }

    async fn find_latest_queued_by_session_since(
        &self,
        session_key: &SessionKey,
        since: DateTime<Utc>,
    ) -> StorageResult<Option<QueueItem>> {
        let session_key = session_key.as_str().to_owned();
        self.db
            .call(move |conn| {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM queue_items \
                     WHERE session_key = ?1 AND status = 'queued' AND enqueued_at >= ?2 \
                     ORDER BY enqueued_at DESC LIMIT 1"
                );
                conn.query_row(&sql, params![session_key, since], row_to_item)
                    .optional()
                    .map_err(StorageError::from)
            })
            .await
    }

    async fn merge_queued_inbound(
        &self,
        id: &str,
        new_inbound: serde_json::Value,
        new_available_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let id = id.to_owned();
        self.db
            .call(move |conn| {
                let inbound_raw = serde_json::to_string(&new_inbound)
                    .map_err(|source| StorageError::Corrupt { table: "queue_items", source })?;
                let changed = conn.execute(
                    "UPDATE queue_items SET inbound_json = ?1, available_at = ?2, updated_at = ?3 \
                     WHERE id = ?4 AND status = 'queued'",
                    params![inbound_raw, new_available_at, now, id],
                )?;
                Ok(changed == 1)
            })
            .await
    }

    async fn list_pending_by_session(&self, session_key: &SessionKey) -> StorageResult<Vec<QueueItem>> {
        let session_key = session_key.as_str().to_owned();
        self.db
            .call(move |conn| {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM queue_items \
                     WHERE session_key = ?1 AND status IN ('queued', 'retrying') \
                     ORDER BY enqueued_at ASC"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![session_key], row_to_item)?.collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    async fn get_by_id(&self, id: &str) -> StorageResult<Option<QueueItem>> {
        let id = id.to_owned();
        self.db
            .call(move |conn| {
                let sql = format!("SELECT {SELECT_COLUMNS} FROM queue_items WHERE id = ?1");
                conn.query_row(&sql, params![id], row_to_item).optional().map_err(StorageError::from)
            })
            .await
    }
}
