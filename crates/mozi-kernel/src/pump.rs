//! The pump loop (§4.2.4), per-item handler invocation with interrupt-race
//! reconciliation (§4.2.5), continuation fan-out (§4.2.6), and startup crash
//! recovery (§4.2.7).

use chrono::{DateTime, Utc};
use mozi_core::{InboundMessage, QueueItem, QueueItemStatus, SessionStatus};
use mozi_sessions::SessionChanges;
use uuid::Uuid;

use crate::egress::TurnChannel;
use crate::Kernel;

impl Kernel {
    /// Mark every row left `running` by a previous crash as `interrupted`.
    /// Must run once before the pump starts; queued and retrying rows are
    /// untouched.
    pub async fn startup_recovery(&self) -> crate::KernelResult<u64> {
        let now = self.clock.now();
        let count = self.queue.mark_interrupted_from_running("Runtime stopped while processing", now).await?;
        if count > 0 {
            tracing::warn!(count, "interrupted rows left running by a previous crash");
        }
        Ok(count)
    }

    /// Run the pump loop until `shutdown` fires. Wakes on whichever comes
    /// first: an explicit [`Kernel::schedule_pump`] notification, or the
    /// configured poll interval.
    pub async fn run(&self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        let mut poll = tokio::time::interval(std::time::Duration::from_millis(self.tuning.poll_interval_ms));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("pump loop shutting down");
                    return;
                }
                () = self.pump_notify.notified() => {}
                _ = poll.tick() => {}
            }
            self.pump_once().await;
        }
    }

    /// One pump pass: list runnable candidates, claim and launch every one
    /// whose session isn't already active, and keep repeating full passes
    /// until a pass claims nothing.
    async fn pump_once(&self) {
        loop {
            let candidates = match self.queue.list_runnable(self.clock.now(), 64).await {
                Ok(candidates) => candidates,
                Err(err) => {
                    tracing::error!(%err, "pump: list_runnable failed");
                    return;
                }
            };
            if candidates.is_empty() {
                return;
            }

            let mut claimed_any = false;
            for candidate in candidates {
                if self.active.contains(&candidate.session_key).await {
                    continue;
                }
                let now = self.clock.now();
                let claimed = match self.queue.claim(&candidate.id, now).await {
                    Ok(claimed) => claimed,
                    Err(err) => {
                        tracing::error!(%err, queue_item_id = %candidate.id, "pump: claim failed");
                        continue;
                    }
                };
                if !claimed {
                    continue;
                }
                if !self.active.try_acquire(&candidate.session_key).await {
                    continue;
                }

                claimed_any = true;
                let kernel = self.clone();
                let session_key = candidate.session_key.clone();
                tokio::spawn(async move {
                    kernel.run_claimed(candidate).await;
                    kernel.active.release(&session_key).await;
                    kernel.schedule_pump();
                });
            }

            if !claimed_any {
                return;
            }
        }
    }

    /// Invoke the handler for a freshly claimed item, then classify the
    /// outcome into the item's and session's terminal or transient state.
    async fn run_claimed(&self, item: QueueItem) {
        self.continuations.resume_session(&item.session_key).await;

        let inbound: InboundMessage = match serde_json::from_value(item.inbound_json.clone()) {
            Ok(inbound) => inbound,
            Err(err) => {
                tracing::error!(%err, queue_item_id = %item.id, "corrupt inbound json on claimed item");
                let now = self.clock.now();
                let _ = self.queue.mark_failed_if_running(&item.id, &format!("corrupt inbound: {err}"), now).await;
                let _ = self
                    .sessions
                    .update(&item.session_key, SessionChanges { status: Some(SessionStatus::Failed), metadata: None })
                    .await;
                return;
            }
        };

        if let Err(err) =
            self.sessions.update(&item.session_key, SessionChanges { status: Some(SessionStatus::Running), metadata: None }).await
        {
            tracing::error!(%err, queue_item_id = %item.id, "failed to mark session running");
        }

        let envelope_id = inbound.id.clone();
        let channel = TurnChannel::new(self.egress.clone(), &item, envelope_id);

        let outcome = self.handler.handle(inbound.clone(), &channel).await;
        let now = self.clock.now();

        match outcome {
            Ok(()) => match self.queue.mark_completed_if_running(&item.id, now).await {
                Ok(true) => {
                    let _ = self
                        .sessions
                        .update(&item.session_key, SessionChanges { status: Some(SessionStatus::Completed), metadata: None })
                        .await;
                    self.process_continuations(&item, &inbound).await;
                }
                Ok(false) => self.reconcile_interrupted(&item).await,
                Err(err) => tracing::error!(%err, queue_item_id = %item.id, "failed to mark completed"),
            },
            Err(message) => self.reconcile_failure(&item, &message, now).await,
        }
    }

    /// `mark_completed_if_running` (or a retry/fail equivalent) lost its
    /// conditional update; re-read the row and mirror `interrupted` onto
    /// the session if that's why, otherwise just log.
    async fn reconcile_interrupted(&self, item: &QueueItem) {
        match self.queue.get_by_id(&item.id).await {
            Ok(Some(row)) if row.status == QueueItemStatus::Interrupted => {
                let _ = self
                    .sessions
                    .update(&item.session_key, SessionChanges { status: Some(SessionStatus::Interrupted), metadata: None })
                    .await;
            }
            Ok(Some(row)) => {
                tracing::warn!(queue_item_id = %item.id, status = %row.status, "lost a conditional update to an unexpected status");
            }
            Ok(None) => tracing::warn!(queue_item_id = %item.id, "queue row vanished after handler completion"),
            Err(err) => tracing::error!(%err, queue_item_id = %item.id, "failed to re-read queue row after a lost race"),
        }
    }

    async fn reconcile_failure(&self, item: &QueueItem, message: &str, now: DateTime<Utc>) {
        match self.queue.get_by_id(&item.id).await {
            Ok(Some(row)) if row.status == QueueItemStatus::Interrupted => {
                let _ = self
                    .sessions
                    .update(&item.session_key, SessionChanges { status: Some(SessionStatus::Interrupted), metadata: None })
                    .await;
                return;
            }
            Ok(_) => {}
            Err(err) => tracing::error!(%err, queue_item_id = %item.id, "failed to re-read queue row before classifying error"),
        }

        match self.retry_policy.decide(message, item.attempts) {
            mozi_errors::Decision::Retry { delay_ms, reason } => {
                // delay_ms comes from the bounded exponential backoff policy, not user input.
                #[allow(clippy::arithmetic_side_effects)]
                let next_available_at = now + chrono::Duration::milliseconds(delay_ms as i64);
                let full_reason = format!("{reason}: {message}");
                match self.queue.mark_retrying_if_running(&item.id, &full_reason, next_available_at, now).await {
                    Ok(true) => {
                        let _ = self
                            .sessions
                            .update(&item.session_key, SessionChanges { status: Some(SessionStatus::Retrying), metadata: None })
                            .await;
                    }
                    Ok(false) => self.reconcile_interrupted(item).await,
                    Err(err) => tracing::error!(%err, queue_item_id = %item.id, "failed to mark retrying"),
                }
            }
            mozi_errors::Decision::Terminal { reason } => {
                let full_reason = format!("{reason}: {message}");
                match self.queue.mark_failed_if_running(&item.id, &full_reason, now).await {
                    Ok(true) => {
                        let _ = self
                            .sessions
                            .update(&item.session_key, SessionChanges { status: Some(SessionStatus::Failed), metadata: None })
                            .await;
                    }
                    Ok(false) => self.reconcile_interrupted(item).await,
                    Err(err) => tracing::error!(%err, queue_item_id = %item.id, "failed to mark failed"),
                }
            }
        }
    }

    /// Drain every continuation request scheduled for `item`'s session and
    /// turn each into a fresh queue item chained off the completed turn.
    async fn process_continuations(&self, item: &QueueItem, inbound: &InboundMessage) {
        let requests = self.continuations.consume(&item.session_key).await;
        if requests.is_empty() {
            return;
        }

        let now = self.clock.now();
        let mut any_enqueued = false;
        for request in requests {
            let continuation_id = Uuid::new_v4().to_string();
            let mut raw = serde_json::json!({
                "source": "continuation",
                "parentMessageId": inbound.id,
            });
            if let Some(reason) = &request.reason {
                raw["reason"] = serde_json::Value::String(reason.clone());
            }
            if !request.context.is_null() {
                raw["context"] = request.context.clone();
            }

            let continuation_inbound = InboundMessage {
                id: continuation_id.clone(),
                channel: item.channel_id.clone(),
                peer_id: item.peer_id.clone(),
                peer_type: item.peer_type,
                sender_id: item.peer_id.clone(),
                text: Some(request.prompt.clone()),
                media: None,
                timestamp: now,
                raw,
            };

            // delay_ms is an operator/handler-supplied small scheduling offset.
            #[allow(clippy::arithmetic_side_effects)]
            let available_at = now + chrono::Duration::milliseconds(request.delay_ms.unwrap_or(0) as i64);

            let queue_item = QueueItem {
                id: Uuid::new_v4().to_string(),
                dedup_key: format!("continuation:{}:{continuation_id}", item.session_key.as_str()),
                session_key: item.session_key.clone(),
                channel_id: item.channel_id.clone(),
                peer_id: item.peer_id.clone(),
                peer_type: item.peer_type,
                inbound_json: serde_json::to_value(&continuation_inbound).unwrap_or(serde_json::Value::Null),
                status: QueueItemStatus::Queued,
                attempts: 0,
                error: None,
                enqueued_at: now,
                available_at,
                started_at: None,
                finished_at: None,
                updated_at: now,
            };

            match self.queue.enqueue(&queue_item).await {
                Ok(true) => any_enqueued = true,
                Ok(false) => tracing::debug!(dedup_key = %queue_item.dedup_key, "continuation item deduplicated"),
                Err(err) => tracing::error!(%err, "failed to enqueue continuation"),
            }
        }

        if any_enqueued {
            let _ = self
                .sessions
                .update(&item.session_key, SessionChanges { status: Some(SessionStatus::Queued), metadata: None })
                .await;
            self.schedule_pump();
        }
    }
}
