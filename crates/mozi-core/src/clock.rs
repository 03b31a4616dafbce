//! Injectable time source (SPEC_FULL §9 "Time source").
//!
//! All scheduling math in this workspace goes through a [`Clock`] rather
//! than calling `chrono::Utc::now()` directly, so reminder/backoff/collect-
//! window tests can advance time deterministically instead of sleeping.

use chrono::{DateTime, Utc};

/// A source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// The current UTC instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock, backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
