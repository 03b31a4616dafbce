//! A minimal [`MessageHandler`] exercising the full kernel loop without any
//! agent/LLM orchestration, which is out of scope for this workspace. Real
//! deployments replace this with an actual turn-runner; everything from
//! admission through delivery is identical either way.

use async_trait::async_trait;
use mozi_core::{InboundMessage, MessageHandler, RuntimeChannel, SessionKey};

/// Echoes the inbound text back on the same channel. Supports none of the
/// optional hooks, so `steer`/`interrupt`/`steer-backlog` modes degrade to
/// their documented fallback behavior.
pub struct EchoHandler {
    agent_id: String,
}

impl EchoHandler {
    #[must_use]
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self { agent_id: agent_id.into() }
    }
}

#[async_trait]
impl MessageHandler for EchoHandler {
    fn resolve_session_context(&self, inbound: &InboundMessage) -> (SessionKey, String) {
        (SessionKey::new(&self.agent_id, &inbound.channel, inbound.peer_type, &inbound.peer_id), self.agent_id.clone())
    }

    async fn handle(&self, inbound: InboundMessage, channel: &dyn RuntimeChannel) -> Result<(), String> {
        let text = inbound.text.unwrap_or_default();
        channel.begin_typing().await;
        channel.send(&format!("echo: {text}")).await;
        Ok(())
    }
}
