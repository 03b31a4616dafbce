//! Egress adapter (C9) and the per-turn runtime channel facade (C10).
//!
//! Handlers never see the channel registry directly: each claimed queue item
//! gets a fresh [`TurnChannel`] that carries just enough identity to route a
//! send, and every delivery attempt is observable as a [`DeliveryReceipt`].

use std::sync::Arc;

use async_trait::async_trait;
use mozi_core::handler::RuntimeChannel;
use mozi_core::{QueueItem, SessionKey};
use tokio::sync::broadcast;

/// Default capacity of the delivery receipt broadcast channel.
pub const DEFAULT_RECEIPT_CAPACITY: usize = 256;

/// Outcome of a single egress delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// The channel registry accepted the send.
    Sent,
    /// The channel registry reported an error.
    Failed,
}

/// Observable record of one outbound send, emitted on [`Egress`]'s receipt
/// channel regardless of outcome.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    /// The queue item whose handler produced this send.
    pub queue_item_id: String,
    /// Identifier of the inbound message that started this turn.
    pub envelope_id: String,
    /// Session the send belongs to.
    pub session_key: SessionKey,
    /// Destination channel (e.g. `telegram`, `discord`).
    pub channel_id: String,
    /// Destination peer within that channel.
    pub peer_id: String,
    /// Attempt number of the queue item that produced this send.
    pub attempt: u32,
    /// Whether the registry accepted it.
    pub status: DeliveryStatus,
}

/// The real channel adapter surface the kernel forwards sends through.
/// Implemented once per concrete channel (console, Telegram, Discord, ...).
#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    /// Send `text` to `peer_id` on `channel_id`.
    async fn send(&self, channel_id: &str, peer_id: &str, text: &str) -> Result<(), String>;

    /// Best-effort typing indicator. Channels without one may ignore it.
    async fn begin_typing(&self, _channel_id: &str, _peer_id: &str) -> Result<(), String> {
        Ok(())
    }
}

/// Resolves channel sends against a [`ChannelRegistry`] and broadcasts a
/// [`DeliveryReceipt`] for every attempt.
pub struct Egress {
    registry: Arc<dyn ChannelRegistry>,
    receipts: broadcast::Sender<DeliveryReceipt>,
}

impl Egress {
    /// Build an egress adapter over `registry`.
    #[must_use]
    pub fn new(registry: Arc<dyn ChannelRegistry>) -> Self {
        let (receipts, _) = broadcast::channel(DEFAULT_RECEIPT_CAPACITY);
        Self { registry, receipts }
    }

    /// Subscribe to delivery receipts, e.g. for test assertions or metrics.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryReceipt> {
        self.receipts.subscribe()
    }

    async fn deliver(&self, channel_id: &str, peer_id: &str, text: &str, mut receipt: DeliveryReceipt) {
        receipt.status = match self.registry.send(channel_id, peer_id, text).await {
            Ok(()) => DeliveryStatus::Sent,
            Err(err) => {
                tracing::warn!(%err, channel_id, peer_id, "egress delivery failed");
                DeliveryStatus::Failed
            }
        };
        let _ = self.receipts.send(receipt);
    }

    async fn begin_typing(&self, channel_id: &str, peer_id: &str) {
        if let Err(err) = self.registry.begin_typing(channel_id, peer_id).await {
            tracing::debug!(%err, channel_id, peer_id, "egress begin_typing failed");
        }
    }
}

/// Per-turn [`RuntimeChannel`] handed to a handler while its claimed queue
/// item runs. Carries the identity needed to route sends and stamp delivery
/// receipts, and nothing else.
pub struct TurnChannel {
    egress: Arc<Egress>,
    queue_item_id: String,
    envelope_id: String,
    session_key: SessionKey,
    channel_id: String,
    peer_id: String,
    attempt: u32,
}

impl TurnChannel {
    /// Build the facade for `item`, tagging receipts with `envelope_id`
    /// (the originating inbound message's id).
    #[must_use]
    pub fn new(egress: Arc<Egress>, item: &QueueItem, envelope_id: String) -> Self {
        Self {
            egress,
            queue_item_id: item.id.clone(),
            envelope_id,
            session_key: item.session_key.clone(),
            channel_id: item.channel_id.clone(),
            peer_id: item.peer_id.clone(),
            attempt: item.attempts,
        }
    }

    fn receipt(&self, status: DeliveryStatus) -> DeliveryReceipt {
        DeliveryReceipt {
            queue_item_id: self.queue_item_id.clone(),
            envelope_id: self.envelope_id.clone(),
            session_key: self.session_key.clone(),
            channel_id: self.channel_id.clone(),
            peer_id: self.peer_id.clone(),
            attempt: self.attempt,
            status,
        }
    }
}

#[async_trait]
impl RuntimeChannel for TurnChannel {
    async fn send(&self, text: &str) {
        let receipt = self.receipt(DeliveryStatus::Failed);
        self.egress.deliver(&self.channel_id, &self.peer_id, text, receipt).await;
    }

    async fn begin_typing(&self) {
        self.egress.begin_typing(&self.channel_id, &self.peer_id).await;
    }
}
