//! Shared domain types and contracts for the mozi runtime kernel.
//!
//! This crate has no knowledge of SQLite, tokio tasks, or any channel
//! adapter. It defines the vocabulary every other `mozi-*` crate shares:
//! session identifiers, the inbound envelope, queue item status, the queue
//! admission modes, the handler contract a turn-runner must implement, an
//! injectable clock, and the umbrella error type.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod clock;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod queue;
pub mod reminder;
pub mod session;

pub use clock::{Clock, SystemClock};
pub use envelope::{EnqueueResult, InboundEnvelope, InboundMessage};
pub use error::{KernelError, KernelResult};
pub use handler::{AdmissionMode, MessageHandler, RuntimeChannel};
pub use queue::{QueueItem, QueueItemStatus};
pub use reminder::{Reminder, Schedule};
pub use session::{PeerType, SessionKey, SessionStatus};
