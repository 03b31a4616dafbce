//! The runtime kernel (C7): ingress (`enqueue_inbound`, all five admission
//! modes), the single-flight pump loop, per-item handler invocation with
//! interrupt-race reconciliation, continuation processing, startup crash
//! recovery, and backlog trim — plus the egress adapter (C9) and the
//! per-turn runtime channel facade (C10) it hands to handlers.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod active_sessions;
pub mod admission;
pub mod config;
pub mod egress;
pub mod error;
pub mod pump;

use std::sync::Arc;

use mozi_continuations::ContinuationRegistry;
use mozi_core::{Clock, MessageHandler};
use mozi_sessions::SessionManager;
use mozi_storage::QueueRepository;
use tokio::sync::Notify;

pub use active_sessions::ActiveSessions;
pub use config::KernelTuning;
pub use egress::{ChannelRegistry, DeliveryReceipt, DeliveryStatus, Egress, TurnChannel};
pub use error::{KernelError, KernelResult};

/// The assembled kernel: ingress, pump, and egress wired to their durable
/// and in-memory collaborators. Cheaply [`Clone`]able — every field is an
/// `Arc` or a handle over one — so each spawned handler task can hold its
/// own copy.
#[derive(Clone)]
pub struct Kernel {
    pub(crate) queue: Arc<dyn QueueRepository>,
    pub(crate) sessions: SessionManager,
    pub(crate) continuations: ContinuationRegistry,
    pub(crate) handler: Arc<dyn MessageHandler>,
    pub(crate) egress: Arc<Egress>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) tuning: KernelTuning,
    pub(crate) retry_policy: mozi_errors::Policy,
    pub(crate) active: ActiveSessions,
    pub(crate) pump_notify: Arc<Notify>,
}

impl Kernel {
    /// Assemble a kernel from its collaborators. Does not perform startup
    /// recovery or start the pump loop; call [`Kernel::startup_recovery`]
    /// once, then [`Kernel::run`].
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<dyn QueueRepository>,
        sessions: SessionManager,
        continuations: ContinuationRegistry,
        handler: Arc<dyn MessageHandler>,
        egress: Arc<Egress>,
        clock: Arc<dyn Clock>,
        tuning: KernelTuning,
        retry_policy: mozi_errors::Policy,
    ) -> Self {
        Self {
            queue,
            sessions,
            continuations,
            handler,
            egress,
            clock,
            tuning,
            retry_policy,
            active: ActiveSessions::new(),
            pump_notify: Arc::new(Notify::new()),
        }
    }

    /// Wake the pump loop immediately instead of waiting for the next poll
    /// tick. Safe to call from any task; a no-op if the pump is already
    /// awake.
    pub(crate) fn schedule_pump(&self) {
        self.pump_notify.notify_one();
    }

    /// The durable queue repository backing this kernel, for callers that
    /// need to inspect row state directly (diagnostics, tests).
    #[must_use]
    pub fn queue(&self) -> &Arc<dyn QueueRepository> {
        &self.queue
    }

    /// The continuation registry backing this kernel.
    #[must_use]
    pub fn continuations(&self) -> &ContinuationRegistry {
        &self.continuations
    }
}
