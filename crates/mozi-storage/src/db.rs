//! SQLite connection handle and schema migration.
//!
//! `rusqlite::Connection` is synchronous and not `Send` across an `.await`
//! point, so [`Database`] holds it behind a blocking-friendly mutex and runs
//! every query on the blocking thread pool via [`Database::call`]. Each
//! repository builds its SQL on that thread and returns a plain owned value,
//! keeping the `async_trait` surface `Send`.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::error::{StorageError, StorageResult};

const SCHEMA: &str = include_str!("schema.sql");

/// Shared handle to the durable store.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (creating if absent) the SQLite file at `path`, apply pragmas,
    /// and run the schema migration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Sqlite`] if the file cannot be opened or the
    /// schema cannot be applied.
    pub async fn open(path: impl Into<std::path::PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        tracing::info!(path = %path.display(), "opening sqlite store");
        let conn = tokio::task::spawn_blocking(move || -> StorageResult<Connection> {
            let conn = Connection::open(&path)?;
            configure(&conn)?;
            Ok(conn)
        })
        .await??;
        Ok(Self { inner: Arc::new(Mutex::new(conn)) })
    }

    /// Open a private in-memory database, for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Sqlite`] if the schema cannot be applied.
    pub async fn open_in_memory() -> StorageResult<Self> {
        let conn = tokio::task::spawn_blocking(|| -> StorageResult<Connection> {
            let conn = Connection::open_in_memory()?;
            configure(&conn)?;
            Ok(conn)
        })
        .await??;
        Ok(Self { inner: Arc::new(Mutex::new(conn)) })
    }

    /// Run `f` against the connection on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Propagates whatever [`StorageError`] `f` returns, plus
    /// [`StorageError::TaskJoin`] if the blocking task itself panics.
    pub async fn call<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let conn = inner.lock().expect("sqlite connection mutex poisoned");
            f(&conn)
        })
        .await?
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

fn configure(conn: &Connection) -> StorageResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
