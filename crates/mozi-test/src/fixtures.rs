//! Small `test_*()` factory functions producing fully-formed domain
//! objects with sensible defaults, in the style of the source ambient
//! test crate's fixture module.

use chrono::Utc;
use mozi_core::{InboundEnvelope, InboundMessage, PeerType};

/// A plain text inbound message on the `"test"` channel from `peer_id`.
#[must_use]
pub fn test_inbound_message(id: &str, peer_id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        id: id.to_owned(),
        channel: "test".to_owned(),
        peer_id: peer_id.to_owned(),
        peer_type: PeerType::Dm,
        sender_id: peer_id.to_owned(),
        text: Some(text.to_owned()),
        media: None,
        timestamp: Utc::now(),
        raw: serde_json::json!({}),
    }
}

/// An envelope wrapping [`test_inbound_message`], with no explicit dedup
/// key (so the default `{channel}:{id}` derivation applies).
#[must_use]
pub fn test_envelope(id: &str, peer_id: &str, text: &str) -> InboundEnvelope {
    InboundEnvelope {
        id: format!("env-{id}"),
        inbound: test_inbound_message(id, peer_id, text),
        dedup_key: None,
        received_at: Utc::now(),
    }
}

/// The same envelope as [`test_envelope`], but with an explicit dedup key.
#[must_use]
pub fn test_envelope_with_dedup_key(id: &str, peer_id: &str, text: &str, dedup_key: &str) -> InboundEnvelope {
    let mut envelope = test_envelope(id, peer_id, text);
    envelope.dedup_key = Some(dedup_key.to_owned());
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_derives_the_default_dedup_key_from_channel_and_id() {
        let envelope = test_envelope("m1", "p1", "hello");
        assert_eq!(envelope.effective_dedup_key(), "test:m1");
    }

    #[test]
    fn explicit_dedup_key_overrides_the_default() {
        let envelope = test_envelope_with_dedup_key("m1", "p1", "hello", "fixed");
        assert_eq!(envelope.effective_dedup_key(), "fixed");
    }
}
