//! `enqueue_inbound`: the single entry point every admission mode funnels
//! through. One envelope in, one `EnqueueResult` out, regardless of mode.

use chrono::{DateTime, Utc};
use mozi_core::handler::AdmissionMode;
use mozi_core::{EnqueueResult, InboundEnvelope, InboundMessage, QueueItem, QueueItemStatus, SessionKey, SessionStatus};
use mozi_sessions::SessionChanges;
use uuid::Uuid;

use crate::{Kernel, KernelResult};

/// Lowercase the first whitespace-delimited token of `text` and strip an
/// `@bot-name` suffix, but only when the trimmed text starts with `/`.
/// Returns `None` for ordinary text.
fn extract_command_token(text: &str) -> Option<String> {
    let trimmed = text.trim_start();
    if !trimmed.starts_with('/') {
        return None;
    }
    let first = trimmed.split_whitespace().next()?;
    let lowered = first.to_lowercase();
    let token = lowered.split('@').next().unwrap_or(&lowered);
    Some(token.to_owned())
}

/// Merge `new_inbound` into the message already stored on a queued item:
/// text is newline-joined (empty side drops out), non-null new media
/// replaces old, timestamp advances to the newer message.
fn merge_collect_inbound(existing_json: &serde_json::Value, new_inbound: &InboundMessage) -> serde_json::Value {
    let mut merged: InboundMessage = match serde_json::from_value(existing_json.clone()) {
        Ok(inbound) => inbound,
        Err(_) => new_inbound.clone(),
    };

    let existing_text = merged.text.clone().unwrap_or_default();
    let new_text = new_inbound.text.clone().unwrap_or_default();
    let joined = match (existing_text.is_empty(), new_text.is_empty()) {
        (true, _) => new_text,
        (false, true) => existing_text,
        (false, false) => format!("{existing_text}\n{new_text}"),
    };
    merged.text = if joined.is_empty() { None } else { Some(joined) };

    if let Some(media) = &new_inbound.media {
        if !media.is_null() {
            merged.media = Some(media.clone());
        }
    }
    merged.timestamp = new_inbound.timestamp;

    serde_json::to_value(&merged).unwrap_or_else(|_| existing_json.clone())
}

impl Kernel {
    /// Admit one inbound envelope under the kernel's configured mode.
    /// Implements all seven steps shared by every mode: session resolution,
    /// `/stop` handling, steer/interrupt preemption, collect-mode merge,
    /// insertion, and backlog trim.
    ///
    /// # Errors
    ///
    /// Returns the repository's error if a durable read or write fails.
    pub async fn enqueue_inbound(&self, envelope: InboundEnvelope) -> KernelResult<EnqueueResult> {
        let (session_key, agent_id) = self.handler.resolve_session_context(&envelope.inbound);
        let now = self.clock.now();

        self.sessions
            .get_or_create(&session_key, &agent_id, &envelope.inbound.channel, &envelope.inbound.peer_id, envelope.inbound.peer_type)
            .await?;

        let text = envelope.inbound.text.as_deref().unwrap_or("");
        let command_token = extract_command_token(text);
        let is_slash_command = command_token.is_some();

        if command_token.as_deref() == Some("/stop") {
            self.preempt_session(&session_key, "stopped by /stop").await?;
            // Do not return: the `/stop` item itself still runs through the
            // ordinary enqueue path below so the handler sees one fresh turn.
        }

        if matches!(self.tuning.mode, AdmissionMode::Steer | AdmissionMode::SteerBacklog) && !text.is_empty() && !is_slash_command {
            if self.tuning.mode == AdmissionMode::SteerBacklog && self.handler.is_session_active(&session_key).await {
                self.preempt_session(&session_key, "preempted by steer-backlog").await?;
            } else if self.handler.steer_session(&session_key, text, self.tuning.mode.as_str()).await {
                self.sessions
                    .update(&session_key, SessionChanges { status: Some(SessionStatus::Running), metadata: None })
                    .await?;
                return Ok(EnqueueResult::steered(session_key));
            }
            // Steering declined (or preempted into backlog): fall through
            // to the ordinary enqueue path below, same as `followup`.
        }

        if self.tuning.mode == AdmissionMode::Interrupt {
            self.preempt_session(&session_key, "Interrupted by newer inbound message").await?;
        }

        if self.tuning.mode == AdmissionMode::Collect {
            if let Some(result) = self.try_merge_collect(&session_key, &envelope, text, now).await? {
                return Ok(result);
            }
            // Lost the merge race to a claim or a completion: fall through
            // to a fresh insert below.
        }

        let available_at = if self.tuning.mode == AdmissionMode::Collect {
            // now is bounded and collect_window_ms is small and operator-configured.
            #[allow(clippy::arithmetic_side_effects)]
            let at = now + chrono::Duration::milliseconds(self.tuning.collect_window_ms);
            at
        } else {
            now
        };

        let item = QueueItem {
            id: Uuid::new_v4().to_string(),
            dedup_key: envelope.effective_dedup_key(),
            session_key: session_key.clone(),
            channel_id: envelope.inbound.channel.clone(),
            peer_id: envelope.inbound.peer_id.clone(),
            peer_type: envelope.inbound.peer_type,
            inbound_json: serde_json::to_value(&envelope.inbound).unwrap_or(serde_json::Value::Null),
            status: QueueItemStatus::Queued,
            attempts: 0,
            error: None,
            enqueued_at: now,
            available_at,
            started_at: None,
            finished_at: None,
            updated_at: now,
        };
        let item_id = item.id.clone();

        if !self.queue.enqueue(&item).await? {
            return Ok(EnqueueResult::duplicate(session_key));
        }

        self.sessions.update(&session_key, SessionChanges { status: Some(SessionStatus::Queued), metadata: None }).await?;
        self.trim_backlog(&session_key).await?;
        self.schedule_pump();

        Ok(EnqueueResult::queued(session_key, item_id))
    }

    /// Durable mass-interrupt of every runnable row for `session_key`, plus
    /// best-effort continuation tombstoning and handler abort. Used by
    /// `/stop`, `interrupt` mode, and `steer-backlog` preemption alike.
    async fn preempt_session(&self, session_key: &SessionKey, reason: &str) -> KernelResult<()> {
        let now = self.clock.now();
        self.queue.mark_interrupted_by_session(session_key, reason, now).await?;
        self.continuations.cancel_session(session_key).await;
        self.handler.interrupt_session(session_key, reason).await;
        Ok(())
    }

    async fn try_merge_collect(
        &self,
        session_key: &SessionKey,
        envelope: &InboundEnvelope,
        text: &str,
        now: DateTime<Utc>,
    ) -> KernelResult<Option<EnqueueResult>> {
        // collect_window_ms is small and operator-configured, not derived from user input.
        #[allow(clippy::arithmetic_side_effects)]
        let since = now - chrono::Duration::milliseconds(self.tuning.collect_window_ms);
        let Some(existing) = self.queue.find_latest_queued_by_session_since(session_key, since).await? else {
            return Ok(None);
        };

        let merged = merge_collect_inbound(&existing.inbound_json, &InboundMessage { text: Some(text.to_owned()), ..envelope.inbound.clone() });
        #[allow(clippy::arithmetic_side_effects)]
        let new_available_at = now + chrono::Duration::milliseconds(self.tuning.collect_window_ms);

        if self.queue.merge_queued_inbound(&existing.id, merged, new_available_at, now).await? {
            Ok(Some(EnqueueResult::queued(session_key.clone(), existing.id)))
        } else {
            Ok(None)
        }
    }

    /// Drop the oldest pending items for `session_key` past `max_backlog`,
    /// marking them `interrupted` with a reason naming the cap.
    pub(crate) async fn trim_backlog(&self, session_key: &SessionKey) -> KernelResult<()> {
        let Some(cap) = self.tuning.max_backlog else {
            return Ok(());
        };
        let pending = self.queue.list_pending_by_session(session_key).await?;
        let cap = cap as usize;
        if pending.len() <= cap {
            return Ok(());
        }

        let excess = pending.len().saturating_sub(cap);
        let ids: Vec<String> = pending.into_iter().take(excess).map(|item| item.id).collect();
        let reason = format!("Dropped by maxBacklog={cap}");
        let now = self.clock.now();
        self.queue.mark_interrupted_by_ids(&ids, &reason, now).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_lowercased_command_token() {
        assert_eq!(extract_command_token("/Stop"), Some("/stop".to_owned()));
        assert_eq!(extract_command_token("/stop@my_bot now"), Some("/stop".to_owned()));
        assert_eq!(extract_command_token("  /reset"), Some("/reset".to_owned()));
    }

    #[test]
    fn ordinary_text_has_no_command_token() {
        assert_eq!(extract_command_token("hello there"), None);
        assert_eq!(extract_command_token(""), None);
        assert_eq!(extract_command_token("see a/b/c"), None);
    }

    fn inbound(text: &str) -> InboundMessage {
        InboundMessage {
            id: "m2".to_owned(),
            channel: "telegram".to_owned(),
            peer_id: "p1".to_owned(),
            peer_type: mozi_core::PeerType::Dm,
            sender_id: "p1".to_owned(),
            text: Some(text.to_owned()),
            media: None,
            timestamp: Utc::now(),
            raw: serde_json::json!({}),
        }
    }

    #[test]
    fn merge_joins_text_with_newline() {
        let existing = serde_json::to_value(inbound("first")).unwrap();
        let merged = merge_collect_inbound(&existing, &inbound("second"));
        let merged: InboundMessage = serde_json::from_value(merged).unwrap();
        assert_eq!(merged.text.as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn merge_preserves_media_when_new_is_absent() {
        let mut existing = inbound("first");
        existing.media = Some(serde_json::json!({"kind": "photo"}));
        let existing_json = serde_json::to_value(existing).unwrap();

        let merged = merge_collect_inbound(&existing_json, &inbound("second"));
        let merged: InboundMessage = serde_json::from_value(merged).unwrap();
        assert_eq!(merged.media, Some(serde_json::json!({"kind": "photo"})));
    }

    #[test]
    fn merge_replaces_media_when_new_is_present() {
        let mut existing = inbound("first");
        existing.media = Some(serde_json::json!({"kind": "photo"}));
        let existing_json = serde_json::to_value(existing).unwrap();

        let mut incoming = inbound("second");
        incoming.media = Some(serde_json::json!({"kind": "video"}));

        let merged = merge_collect_inbound(&existing_json, &incoming);
        let merged: InboundMessage = serde_json::from_value(merged).unwrap();
        assert_eq!(merged.media, Some(serde_json::json!({"kind": "video"})));
    }
}
