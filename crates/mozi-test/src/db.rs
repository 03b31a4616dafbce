//! In-memory repository construction.
//!
//! These build the real `Sqlite*Repository` types over
//! `Database::open_in_memory()` rather than hand-rolled fakes, so tests run
//! the same SQL and schema migration production code does.

use std::sync::Arc;

use mozi_storage::{Database, SqliteQueueRepository, SqliteReminderRepository, SqliteSessionRepository, StorageResult};

/// The three repositories a test usually needs, all backed by one
/// in-memory `Database`.
pub struct TestDb {
    pub database: Database,
    pub queue: Arc<SqliteQueueRepository>,
    pub sessions: Arc<SqliteSessionRepository>,
    pub reminders: Arc<SqliteReminderRepository>,
}

/// Open a fresh in-memory database and wrap it in the three repositories.
///
/// # Errors
///
/// Returns [`mozi_storage::StorageError`] if the schema migration fails.
pub async fn open_test_db() -> StorageResult<TestDb> {
    let database = Database::open_in_memory().await?;
    Ok(TestDb {
        queue: Arc::new(SqliteQueueRepository::new(database.clone())),
        sessions: Arc::new(SqliteSessionRepository::new(database.clone())),
        reminders: Arc::new(SqliteReminderRepository::new(database.clone())),
        database,
    })
}
