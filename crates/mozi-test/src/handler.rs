//! A recording, queue-driven stand-in for [`mozi_core::MessageHandler`].
//!
//! Follows the same builder/queue shape the source ambient test crate uses
//! for its frontend mock: `std::sync::Mutex`-backed queues so builder
//! methods work without a tokio runtime, `with_*` to seed before use,
//! `queue_*` to push more mid-test, and `get_*` readbacks to assert on
//! what the kernel actually sent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mozi_core::{InboundMessage, MessageHandler, RuntimeChannel, SessionKey};

/// One recorded `handle` invocation.
#[derive(Debug, Clone)]
pub struct RecordedTurn {
    pub inbound: InboundMessage,
}

/// A [`MessageHandler`] whose outcomes are queued up front and whose
/// invocations are recorded for later assertions.
#[derive(Clone)]
pub struct MockMessageHandler {
    agent_id: String,
    outcomes: Arc<Mutex<VecDeque<Result<(), String>>>>,
    default_outcome: Arc<Mutex<Result<(), String>>>,
    turns: Arc<Mutex<Vec<RecordedTurn>>>,
    interrupt_results: Arc<Mutex<VecDeque<bool>>>,
    steer_results: Arc<Mutex<VecDeque<bool>>>,
    active: Arc<Mutex<bool>>,
}

impl MockMessageHandler {
    /// Create a mock that succeeds by default until told otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent_id: "mozi-test".to_owned(),
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            default_outcome: Arc::new(Mutex::new(Ok(()))),
            turns: Arc::new(Mutex::new(Vec::new())),
            interrupt_results: Arc::new(Mutex::new(VecDeque::new())),
            steer_results: Arc::new(Mutex::new(VecDeque::new())),
            active: Arc::new(Mutex::new(false)),
        }
    }

    /// Use `agent_id` when resolving session context instead of the default.
    #[must_use]
    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    /// Seed one outcome to be consumed by a future `handle` call, in order.
    #[must_use]
    pub fn with_outcome(self, outcome: Result<(), String>) -> Self {
        self.queue_outcome(outcome);
        self
    }

    /// Push one more outcome onto the queue after construction.
    pub fn queue_outcome(&self, outcome: Result<(), String>) {
        self.outcomes.lock().expect("mutex poisoned").push_back(outcome);
    }

    /// Set what `handle` returns once the queue is empty. Defaults to `Ok(())`.
    pub fn set_default_outcome(&self, outcome: Result<(), String>) {
        *self.default_outcome.lock().expect("mutex poisoned") = outcome;
    }

    /// Queue the result `interrupt_session` should return next.
    pub fn queue_interrupt_result(&self, accepted: bool) {
        self.interrupt_results.lock().expect("mutex poisoned").push_back(accepted);
    }

    /// Queue the result `steer_session` should return next.
    pub fn queue_steer_result(&self, accepted: bool) {
        self.steer_results.lock().expect("mutex poisoned").push_back(accepted);
    }

    /// Report `is_session_active` as `active` until changed again.
    pub fn set_active(&self, active: bool) {
        *self.active.lock().expect("mutex poisoned") = active;
    }

    /// Every turn recorded so far, in call order.
    #[must_use]
    pub fn turns(&self) -> Vec<RecordedTurn> {
        self.turns.lock().expect("mutex poisoned").clone()
    }

    /// Number of times `handle` has been called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.turns.lock().expect("mutex poisoned").len()
    }
}

impl Default for MockMessageHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageHandler for MockMessageHandler {
    fn resolve_session_context(&self, inbound: &InboundMessage) -> (SessionKey, String) {
        (SessionKey::new(&self.agent_id, &inbound.channel, inbound.peer_type, &inbound.peer_id), self.agent_id.clone())
    }

    async fn handle(&self, inbound: InboundMessage, _channel: &dyn RuntimeChannel) -> Result<(), String> {
        self.turns.lock().expect("mutex poisoned").push(RecordedTurn { inbound });
        let next = self.outcomes.lock().expect("mutex poisoned").pop_front();
        match next {
            Some(outcome) => outcome,
            None => self.default_outcome.lock().expect("mutex poisoned").clone(),
        }
    }

    async fn interrupt_session(&self, _session_key: &SessionKey, _reason: &str) -> bool {
        self.interrupt_results.lock().expect("mutex poisoned").pop_front().unwrap_or(false)
    }

    async fn steer_session(&self, _session_key: &SessionKey, _text: &str, _mode: &str) -> bool {
        self.steer_results.lock().expect("mutex poisoned").pop_front().unwrap_or(false)
    }

    async fn is_session_active(&self, _session_key: &SessionKey) -> bool {
        *self.active.lock().expect("mutex poisoned")
    }
}
