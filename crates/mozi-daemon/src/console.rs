//! The one channel adapter this workspace ships: a local stdin/stdout
//! console, standing in for a real Telegram/Discord adapter (out of scope,
//! SPEC_FULL §1).

use async_trait::async_trait;
use chrono::Utc;
use mozi_core::{InboundEnvelope, InboundMessage, PeerType};
use mozi_kernel::{ChannelRegistry, Kernel};
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

const CHANNEL_ID: &str = "console";
const LOCAL_PEER_ID: &str = "local";

/// Delivers outbound turns by printing them to stdout.
pub struct ConsoleChannelRegistry;

#[async_trait]
impl ChannelRegistry for ConsoleChannelRegistry {
    async fn send(&self, _channel_id: &str, peer_id: &str, text: &str) -> Result<(), String> {
        println!("[{peer_id}] {text}");
        Ok(())
    }

    async fn begin_typing(&self, _channel_id: &str, _peer_id: &str) -> Result<(), String> {
        Ok(())
    }
}

/// Read lines from stdin until EOF or shutdown, feeding each as an inbound
/// envelope from the local console peer.
pub async fn run_console_ingress(kernel: Kernel, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.recv() => return,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(text)) if !text.trim().is_empty() => {
                let envelope = console_envelope(&text);
                if let Err(err) = kernel.enqueue_inbound(envelope).await {
                    tracing::error!(%err, "failed to enqueue console input");
                }
            }
            Ok(Some(_)) => {}
            Ok(None) => return,
            Err(err) => {
                tracing::error!(%err, "console stdin read failed");
                return;
            }
        }
    }
}

fn console_envelope(text: &str) -> InboundEnvelope {
    let now = Utc::now();
    let message_id = Uuid::new_v4().to_string();
    InboundEnvelope {
        id: format!("console:{message_id}"),
        inbound: InboundMessage {
            id: message_id,
            channel: CHANNEL_ID.to_owned(),
            peer_id: LOCAL_PEER_ID.to_owned(),
            peer_type: PeerType::Dm,
            sender_id: LOCAL_PEER_ID.to_owned(),
            text: Some(text.to_owned()),
            media: None,
            timestamp: now,
            raw: serde_json::json!({}),
        },
        dedup_key: None,
        received_at: now,
    }
}
