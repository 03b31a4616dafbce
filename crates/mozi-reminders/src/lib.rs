//! Durable reminder scheduling (C8): schedule-kind math (`at`/`every`/
//! `cron`), the periodic single-flight runner that feeds fired reminders
//! back into the kernel, and the session-scoped CRUD surface tool code
//! drives.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod runner;
pub mod schedule;
pub mod service;

pub use error::{ReminderError, ReminderResult};
pub use runner::ReminderRunner;
pub use schedule::compute_next_run;
pub use service::ReminderService;
