//! Mozi Storage — the durable layer behind the queue, sessions, and
//! reminders.
//!
//! Unlike the `SurrealDB`-backed store this crate's sibling ambient crates
//! descend from, the contracts here are plain SQL: an `INSERT OR IGNORE`
//! dedup insert, conditional `UPDATE ... WHERE status = ...` races, and two
//! covering indices. `rusqlite` in WAL mode is a closer idiomatic fit for
//! that vocabulary than a document/graph engine, so [`Database`] wraps a
//! single SQLite connection instead.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod db;
pub mod error;
pub mod queue;
pub mod reminders;
pub mod sessions;

pub use db::Database;
pub use error::{StorageError, StorageResult};
pub use queue::{QueueRepository, SqliteQueueRepository};
pub use reminders::{ReminderRepository, SqliteReminderRepository};
pub use sessions::{SessionRepository, SqliteSessionRepository};
