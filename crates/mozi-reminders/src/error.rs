//! Error type for reminder scheduling and the runner.

use thiserror::Error;

/// Failures specific to reminder math, scheduling, and the runner loop.
#[derive(Debug, Error)]
pub enum ReminderError {
    /// The stored or supplied cron expression doesn't parse, or has no
    /// future firings.
    #[error("invalid cron expression {expr:?}: {message}")]
    InvalidCron { expr: String, message: String },

    /// The stored or supplied IANA time zone name doesn't parse.
    #[error("invalid time zone {tz:?}")]
    InvalidTimeZone { tz: String },

    /// A mutation targeted a reminder owned by a different session.
    #[error("reminder {id} is not owned by session {session_key}")]
    WrongSession { id: String, session_key: String },

    /// The underlying durable store failed.
    #[error(transparent)]
    Storage(#[from] mozi_storage::StorageError),

    /// The kernel rejected a synthesized inbound envelope.
    #[error(transparent)]
    Kernel(#[from] mozi_kernel::KernelError),
}

pub type ReminderResult<T> = Result<T, ReminderError>;
