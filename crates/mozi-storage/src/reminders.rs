//! Reminder Repository (C3): the durable row store the Reminder Scheduler
//! polls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mozi_core::{PeerType, Reminder, Schedule, SessionKey};
use rusqlite::{OptionalExtension, Row, params};

use crate::db::Database;
use crate::error::{StorageError, StorageResult};

/// Durable reminder row operations.
#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// Insert a new reminder row.
    async fn insert(&self, reminder: &Reminder) -> StorageResult<()>;

    /// Fetch a reminder by id.
    async fn get(&self, id: &str) -> StorageResult<Option<Reminder>>;

    /// `enabled=1 AND next_run_at ≤ now`, oldest-first, limited to `batch`.
    async fn list_due(&self, now: DateTime<Utc>, batch: u32) -> StorageResult<Vec<Reminder>>;

    /// Conditional update requiring `next_run_at = expected_next_run_at`:
    /// stamp `last_run_at`, advance `next_run_at`, and set `enabled`.
    /// Returns `true` iff this call won the race.
    async fn mark_fired(
        &self,
        id: &str,
        expected_next_run_at: Option<DateTime<Utc>>,
        fired_at: DateTime<Utc>,
        next_run_at: Option<DateTime<Utc>>,
        enabled: bool,
    ) -> StorageResult<bool>;

    /// Tombstone a reminder: `enabled = false`, `cancelled_at = now`.
    async fn cancel(&self, id: &str, now: DateTime<Utc>) -> StorageResult<bool>;

    /// Reminders owned by `session_key`, newest-first, limited to `limit`.
    async fn list_by_session(&self, session_key: &SessionKey, limit: u32) -> StorageResult<Vec<Reminder>>;

    /// Overwrite every mutable column of an existing row from `reminder`.
    async fn replace(&self, reminder: &Reminder) -> StorageResult<()>;
}

/// SQLite-backed [`ReminderRepository`].
pub struct SqliteReminderRepository {
    db: Database,
}

impl SqliteReminderRepository {
    /// Wrap an open [`Database`].
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn row_to_reminder(row: &Row<'_>) -> rusqlite::Result<Reminder> {
    let peer_type_raw: String = row.get("peer_type")?;
    let schedule_raw: String = row.get("schedule_json")?;
    let schedule: Schedule = serde_json::from_str(&schedule_raw).unwrap_or(Schedule::At { at: Utc::now() });
    Ok(Reminder {
        id: row.get("id")?,
        session_key: SessionKey::from(row.get::<_, String>("session_key")?),
        channel_id: row.get("channel_id")?,
        peer_id: row.get("peer_id")?,
        peer_type: peer_type_raw.parse().unwrap_or_default(),
        message: row.get("message")?,
        schedule,
        enabled: row.get::<_, i64>("enabled")? != 0,
        next_run_at: row.get("next_run_at")?,
        last_run_at: row.get("last_run_at")?,
        cancelled_at: row.get("cancelled_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

const SELECT_COLUMNS: &str = "id, session_key, channel_id, peer_id, peer_type, message, schedule_json, enabled, \
     next_run_at, last_run_at, cancelled_at, created_at, updated_at";

#[async_trait]
impl ReminderRepository for SqliteReminderRepository {
    async fn insert(&self, reminder: &Reminder) -> StorageResult<()> {
        let reminder = reminder.clone();
        self.db
            .call(move |conn| {
                let schedule_raw = serde_json::to_string(&reminder.schedule)
                    .map_err(|source| StorageError::Corrupt { table: "reminders", source })?;
                conn.execute(
                    "INSERT INTO reminders \
                     (id, session_key, channel_id, peer_id, peer_type, message, schedule_json, enabled, \
                      next_run_at, last_run_at, cancelled_at, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    params![
                        reminder.id,
                        reminder.session_key.as_str(),
                        reminder.channel_id,
                        reminder.peer_id,
                        reminder.peer_type.to_string(),
                        reminder.message,
                        schedule_raw,
                        i64::from(reminder.enabled),
                        reminder.next_run_at,
                        reminder.last_run_at,
                        reminder.cancelled_at,
                        reminder.created_at,
                        reminder.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    async fn get(&self, id: &str) -> StorageResult<Option<Reminder>> {
        let id = id.to_owned();
        self.db
            .call(move |conn| {
                let sql = format!("SELECT {SELECT_COLUMNS} FROM reminders WHERE id = ?1");
                conn.query_row(&sql, params![id], row_to_reminder).optional().map_err(StorageError::from)
            })
            .await
    }

    async fn list_due(&self, now: DateTime<Utc>, batch: u32) -> StorageResult<Vec<Reminder>> {
        self.db
            .call(move |conn| {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM reminders \
                     WHERE enabled = 1 AND next_run_at IS NOT NULL AND next_run_at <= ?1 \
                     ORDER BY next_run_at ASC LIMIT ?2"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![now, i64::from(batch)], row_to_reminder)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    async fn mark_fired(
        &self,
        id: &str,
        expected_next_run_at: Option<DateTime<Utc>>,
        fired_at: DateTime<Utc>,
        next_run_at: Option<DateTime<Utc>>,
        enabled: bool,
    ) -> StorageResult<bool> {
        let id = id.to_owned();
        self.db
            .call(move |conn| {
                let sql = if expected_next_run_at.is_some() {
                    "UPDATE reminders SET last_run_at = ?1, next_run_at = ?2, enabled = ?3, updated_at = ?1 \
                     WHERE id = ?4 AND next_run_at = ?5"
                } else {
                    "UPDATE reminders SET last_run_at = ?1, next_run_at = ?2, enabled = ?3, updated_at = ?1 \
                     WHERE id = ?4 AND next_run_at IS NULL"
                };
                let changed = if let Some(expected) = expected_next_run_at {
                    conn.execute(sql, params![fired_at, next_run_at, i64::from(enabled), id, expected])?
                } else {
                    conn.execute(sql, params![fired_at, next_run_at, i64::from(enabled), id])?
                };
                Ok(changed == 1)
            })
            .await
    }

    async fn cancel(&self, id: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        let id = id.to_owned();
        self.db
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE reminders SET enabled = 0, cancelled_at = ?1, updated_at = ?1 WHERE id = ?2",
                    params![now, id],
                )?;
                Ok(changed == 1)
            })
            .await
    }

    async fn list_by_session(&self, session_key: &SessionKey, limit: u32) -> StorageResult<Vec<Reminder>> {
        let session_key = session_key.as_str().to_owned();
        self.db
            .call(move |conn| {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM reminders WHERE session_key = ?1 ORDER BY created_at DESC LIMIT ?2"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![session_key, i64::from(limit)], row_to_reminder)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    async fn replace(&self, reminder: &Reminder) -> StorageResult<()> {
        let reminder = reminder.clone();
        self.db
            .call(move |conn| {
                let schedule_raw = serde_json::to_string(&reminder.schedule)
                    .map_err(|source| StorageError::Corrupt { table: "reminders", source })?;
                conn.execute(
                    "UPDATE reminders SET message = ?1, schedule_json = ?2, enabled = ?3, next_run_at = ?4, \
                     last_run_at = ?5, cancelled_at = ?6, updated_at = ?7 WHERE id = ?8",
                    params![
                        reminder.message,
                        schedule_raw,
                        i64::from(reminder.enabled),
                        reminder.next_run_at,
                        reminder.last_run_at,
                        reminder.cancelled_at,
                        reminder.updated_at,
                        reminder.id,
                    ],
                )?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, next_run_at: Option<DateTime<Utc>>) -> Reminder {
        let now = Utc::now();
        Reminder {
            id: id.to_owned(),
            session_key: SessionKey::from("mozi:telegram:dm:p1"),
            channel_id: "telegram".to_owned(),
            peer_id: "p1".to_owned(),
            peer_type: PeerType::Dm,
            message: "stand up".to_owned(),
            schedule: Schedule::Every { every_ms: 60_000, anchor: Some(now) },
            enabled: true,
            next_run_at,
            last_run_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn list_due_respects_next_run_at() {
        let repo = SqliteReminderRepository::new(Database::open_in_memory().await.unwrap());
        let future = sample("r1", Some(Utc::now() + chrono::Duration::hours(1)));
        let due = sample("r2", Some(Utc::now() - chrono::Duration::seconds(1)));
        repo.insert(&future).await.unwrap();
        repo.insert(&due).await.unwrap();
        let results = repo.list_due(Utc::now(), 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "r2");
    }

    #[tokio::test]
    async fn mark_fired_rejects_stale_expected_value() {
        let repo = SqliteReminderRepository::new(Database::open_in_memory().await.unwrap());
        let next_run = Utc::now() - chrono::Duration::seconds(1);
        let reminder = sample("r1", Some(next_run));
        repo.insert(&reminder).await.unwrap();

        let advanced = next_run + chrono::Duration::minutes(1);
        let won = repo.mark_fired("r1", Some(next_run), Utc::now(), Some(advanced), true).await.unwrap();
        assert!(won);

        let lost = repo.mark_fired("r1", Some(next_run), Utc::now(), Some(advanced), true).await.unwrap();
        assert!(!lost);
    }

    #[tokio::test]
    async fn cancel_disables_and_stamps_cancelled_at() {
        let repo = SqliteReminderRepository::new(Database::open_in_memory().await.unwrap());
        let reminder = sample("r1", Some(Utc::now()));
        repo.insert(&reminder).await.unwrap();
        assert!(repo.cancel("r1", Utc::now()).await.unwrap());
        let row = repo.get("r1").await.unwrap().unwrap();
        assert!(!row.enabled);
        assert!(row.cancelled_at.is_some());
    }

    #[tokio::test]
    async fn list_by_session_only_returns_rows_for_that_session() {
        let repo = SqliteReminderRepository::new(Database::open_in_memory().await.unwrap());
        let mine = sample("r1", Some(Utc::now()));
        let mut other = sample("r2", Some(Utc::now()));
        other.session_key = SessionKey::from("mozi:telegram:dm:someone-else");
        repo.insert(&mine).await.unwrap();
        repo.insert(&other).await.unwrap();

        let results = repo.list_by_session(&mine.session_key, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "r1");
    }

    #[tokio::test]
    async fn replace_overwrites_message_and_schedule() {
        let repo = SqliteReminderRepository::new(Database::open_in_memory().await.unwrap());
        let mut reminder = sample("r1", Some(Utc::now()));
        repo.insert(&reminder).await.unwrap();

        reminder.message = "new text".to_owned();
        reminder.enabled = false;
        reminder.next_run_at = None;
        repo.replace(&reminder).await.unwrap();

        let row = repo.get("r1").await.unwrap().unwrap();
        assert_eq!(row.message, "new text");
        assert!(!row.enabled);
        assert!(row.next_run_at.is_none());
    }
}
