//! Inbound envelope — the transport-level wrapper at the kernel boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{PeerType, SessionKey};

/// One inbound message as routed by a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Adapter-assigned message identifier.
    pub id: String,
    /// Channel identifier (`telegram`, `discord`, `local`, ...).
    pub channel: String,
    /// Routing identifier of the peer the message came from.
    pub peer_id: String,
    /// Kind of peer, defaulting to [`PeerType::Dm`] when absent.
    #[serde(default)]
    pub peer_type: PeerType,
    /// Identifier of the sender within the peer (may equal `peer_id` for DMs).
    pub sender_id: String,
    /// Plain text body, if any.
    #[serde(default)]
    pub text: Option<String>,
    /// Opaque media payload, if any.
    #[serde(default)]
    pub media: Option<serde_json::Value>,
    /// Wall-clock time the adapter observed the message.
    pub timestamp: DateTime<Utc>,
    /// Adapter- or kernel-supplied side-channel data (e.g. `source`,
    /// `reminderId`, `parentMessageId`).
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Envelope accepted by `Kernel::enqueue_inbound`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEnvelope {
    /// Envelope-level identifier, distinct from the inner message id.
    pub id: String,
    /// The routed message itself.
    pub inbound: InboundMessage,
    /// Explicit dedup key. Defaults to `{channel}:{inbound.id}` when absent.
    #[serde(default)]
    pub dedup_key: Option<String>,
    /// Time the envelope was received by the kernel boundary.
    pub received_at: DateTime<Utc>,
}

impl InboundEnvelope {
    /// The effective dedup key: the explicit one, or the default derived
    /// from `{channel}:{inbound.id}`.
    #[must_use]
    pub fn effective_dedup_key(&self) -> String {
        self.dedup_key
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.inbound.channel, self.inbound.id))
    }
}

/// Result of an `enqueue_inbound` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResult {
    /// Whether the envelope was admitted in some form (queued, merged, or
    /// steered). `false` only for a duplicate dedup key.
    pub accepted: bool,
    /// Whether this call was rejected solely because the dedup key already
    /// existed.
    pub deduplicated: bool,
    /// The queue item id the envelope ended up as, if any (absent for a
    /// successful in-place steer).
    pub queue_item_id: Option<String>,
    /// The resolved session key the envelope was routed to.
    pub session_key: SessionKey,
}

impl EnqueueResult {
    /// Build the canonical "rejected as duplicate" result.
    #[must_use]
    pub fn duplicate(session_key: SessionKey) -> Self {
        Self {
            accepted: false,
            deduplicated: true,
            queue_item_id: None,
            session_key,
        }
    }

    /// Build a nominal "queued as a new row" result.
    #[must_use]
    pub fn queued(session_key: SessionKey, queue_item_id: impl Into<String>) -> Self {
        Self {
            accepted: true,
            deduplicated: false,
            queue_item_id: Some(queue_item_id.into()),
            session_key,
        }
    }

    /// Build the result for a successful in-place steer: no row was created.
    #[must_use]
    pub fn steered(session_key: SessionKey) -> Self {
        Self {
            accepted: true,
            deduplicated: false,
            queue_item_id: None,
            session_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> InboundMessage {
        InboundMessage {
            id: "m1".to_owned(),
            channel: "telegram".to_owned(),
            peer_id: "p1".to_owned(),
            peer_type: PeerType::Dm,
            sender_id: "p1".to_owned(),
            text: Some("hello".to_owned()),
            media: None,
            timestamp: Utc::now(),
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn default_dedup_key_combines_channel_and_message_id() {
        let envelope = InboundEnvelope {
            id: "e1".to_owned(),
            inbound: sample_message(),
            dedup_key: None,
            received_at: Utc::now(),
        };
        assert_eq!(envelope.effective_dedup_key(), "telegram:m1");
    }

    #[test]
    fn explicit_dedup_key_wins() {
        let envelope = InboundEnvelope {
            id: "e1".to_owned(),
            inbound: sample_message(),
            dedup_key: Some("custom:key".to_owned()),
            received_at: Utc::now(),
        };
        assert_eq!(envelope.effective_dedup_key(), "custom:key");
    }
}
