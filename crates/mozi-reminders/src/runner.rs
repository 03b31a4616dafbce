//! The periodic single-flight reminder poller (SPEC_FULL §4.4 steps 1-2).
//!
//! Shaped like the kernel's own pump loop: a biased `select!` between an
//! explicit wake and a fixed-interval tick, one tick at a time.

use chrono::Utc;
use mozi_core::{InboundEnvelope, InboundMessage, Schedule};
use mozi_kernel::Kernel;
use mozi_storage::ReminderRepository;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ReminderResult;
use crate::schedule::compute_next_run;

/// How many due reminders a single tick pulls at most.
const DEFAULT_BATCH: u32 = 64;

/// Drives `listDue`/`markFired` against a [`ReminderRepository`] and feeds
/// fired reminders back into the kernel as synthesized inbound envelopes.
pub struct ReminderRunner {
    reminders: Arc<dyn ReminderRepository>,
    kernel: Kernel,
    poll_interval_ms: u64,
    batch: u32,
}

impl ReminderRunner {
    /// Build a runner polling every `poll_interval_ms` milliseconds,
    /// pulling up to [`DEFAULT_BATCH`] due reminders per tick.
    #[must_use]
    pub fn new(reminders: Arc<dyn ReminderRepository>, kernel: Kernel, poll_interval_ms: u64) -> Self {
        Self { reminders, kernel, poll_interval_ms, batch: DEFAULT_BATCH }
    }

    /// Override the per-tick batch size.
    #[must_use]
    pub fn with_batch(mut self, batch: u32) -> Self {
        self.batch = batch;
        self
    }

    /// Run until `shutdown` fires.
    pub async fn run(&self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        let mut poll = tokio::time::interval(std::time::Duration::from_millis(self.poll_interval_ms));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("reminder runner shutting down");
                    return;
                }
                _ = poll.tick() => {}
            }
            if let Err(err) = self.tick_once().await {
                tracing::error!(%err, "reminder tick failed");
            }
        }
    }

    /// One tick: list due reminders, fire each, return how many actually
    /// advanced (excludes rows another process already claimed).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ReminderError::Storage`] if `listDue` itself fails.
    pub async fn tick_once(&self) -> ReminderResult<u64> {
        let now = Utc::now();
        let due = self.reminders.list_due(now, self.batch).await?;
        let mut fired = 0;
        for reminder in due {
            match self.fire_one(&reminder, now).await {
                Ok(true) => fired += 1,
                Ok(false) => tracing::debug!(reminder_id = %reminder.id, "reminder already advanced by another tick"),
                Err(err) => tracing::error!(%err, reminder_id = %reminder.id, "failed to fire reminder"),
            }
        }
        Ok(fired)
    }

    async fn fire_one(&self, reminder: &mozi_core::Reminder, fired_at: chrono::DateTime<Utc>) -> ReminderResult<bool> {
        // firedAtMs+1 per spec, so a recurring schedule's next run is strictly after this firing.
        #[allow(clippy::arithmetic_side_effects)]
        let after = fired_at + chrono::Duration::milliseconds(1);
        let next_run_at = match &reminder.schedule {
            Schedule::At { .. } => None,
            _ => compute_next_run(&reminder.schedule, after)?,
        };
        let keep_enabled = !matches!(reminder.schedule, Schedule::At { .. }) && next_run_at.is_some();

        let advanced = self
            .reminders
            .mark_fired(&reminder.id, reminder.next_run_at, fired_at, next_run_at, keep_enabled)
            .await?;
        if !advanced {
            return Ok(false);
        }

        let envelope = synthesize_envelope(reminder, fired_at);
        self.kernel.enqueue_inbound(envelope).await?;
        Ok(true)
    }
}

fn synthesize_envelope(reminder: &mozi_core::Reminder, fired_at: chrono::DateTime<Utc>) -> InboundEnvelope {
    let message_id = Uuid::new_v4().to_string();
    InboundEnvelope {
        id: format!("reminder-envelope:{}:{}", reminder.id, fired_at.to_rfc3339()),
        inbound: InboundMessage {
            id: message_id,
            channel: reminder.channel_id.clone(),
            peer_id: reminder.peer_id.clone(),
            peer_type: reminder.peer_type,
            sender_id: "system:reminder".to_owned(),
            text: Some(reminder.message.clone()),
            media: None,
            timestamp: fired_at,
            raw: serde_json::json!({
                "source": "reminder",
                "reminderId": reminder.id,
                "scheduledAt": fired_at.to_rfc3339(),
            }),
        },
        dedup_key: Some(format!("reminder:{}:{}", reminder.id, fired_at.to_rfc3339())),
        received_at: fired_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mozi_continuations::ContinuationRegistry;
    use mozi_core::{PeerType, SessionKey, SystemClock};
    use mozi_kernel::{Egress, KernelTuning};
    use mozi_sessions::SessionManager;
    use mozi_storage::{Database, QueueRepository, SqliteQueueRepository, SqliteReminderRepository, SqliteSessionRepository};

    struct NullChannelRegistry;

    #[async_trait::async_trait]
    impl mozi_kernel::ChannelRegistry for NullChannelRegistry {
        async fn send(&self, _channel_id: &str, _peer_id: &str, _text: &str) -> Result<(), String> {
            Ok(())
        }
    }

    struct NoopHandler;

    #[async_trait::async_trait]
    impl mozi_core::MessageHandler for NoopHandler {
        fn resolve_session_context(&self, inbound: &mozi_core::InboundMessage) -> (SessionKey, String) {
            (SessionKey::new("mozi", &inbound.channel, inbound.peer_type, &inbound.peer_id), "mozi".to_owned())
        }

        async fn handle(&self, _inbound: mozi_core::InboundMessage, _channel: &dyn mozi_core::RuntimeChannel) -> Result<(), String> {
            Ok(())
        }
    }

    async fn test_kernel() -> (Kernel, Arc<dyn ReminderRepository>) {
        let db = Database::open_in_memory().await.unwrap();
        let queue: Arc<dyn mozi_storage::QueueRepository> = Arc::new(SqliteQueueRepository::new(db.clone()));
        let reminders: Arc<dyn ReminderRepository> = Arc::new(SqliteReminderRepository::new(db.clone()));
        let sessions = SessionManager::new(Arc::new(SqliteSessionRepository::new(db)));
        let egress = Arc::new(Egress::new(Arc::new(NullChannelRegistry)));
        let kernel = Kernel::new(
            queue,
            sessions,
            ContinuationRegistry::new(),
            Arc::new(NoopHandler),
            egress,
            Arc::new(SystemClock),
            KernelTuning::default(),
            mozi_errors::Policy::default(),
        );
        (kernel, reminders)
    }

    fn due_every_reminder(now: chrono::DateTime<Utc>) -> mozi_core::Reminder {
        mozi_core::Reminder {
            id: "r1".to_owned(),
            session_key: SessionKey::new("mozi", "test", PeerType::Dm, "p1"),
            channel_id: "test".to_owned(),
            peer_id: "p1".to_owned(),
            peer_type: PeerType::Dm,
            message: "stand up".to_owned(),
            schedule: Schedule::Every { every_ms: 60_000, anchor: Some(now - chrono::Duration::minutes(2)) },
            enabled: true,
            next_run_at: Some(now - chrono::Duration::seconds(1)),
            last_run_at: None,
            cancelled_at: None,
            created_at: now - chrono::Duration::minutes(2),
            updated_at: now - chrono::Duration::minutes(2),
        }
    }

    #[tokio::test]
    async fn firing_an_every_reminder_enqueues_an_inbound_and_advances_next_run() {
        let now = Utc::now();
        let (kernel, reminders) = test_kernel().await;
        let reminder = due_every_reminder(now);
        reminders.insert(&reminder).await.unwrap();

        let runner = ReminderRunner::new(reminders.clone(), kernel.clone(), 250);
        let fired = runner.tick_once().await.unwrap();
        assert_eq!(fired, 1);

        let updated = reminders.get("r1").await.unwrap().unwrap();
        assert!(updated.enabled);
        assert!(updated.last_run_at.is_some());
        assert!(updated.next_run_at.unwrap() > now);

        let row = kernel
            .queue()
            .get_by_id(kernel.queue().list_runnable(Utc::now(), 1).await.unwrap()[0].id.as_str())
            .await
            .unwrap()
            .unwrap();
        let inbound: mozi_core::InboundMessage = serde_json::from_value(row.inbound_json).unwrap();
        assert_eq!(inbound.sender_id, "system:reminder");
        assert_eq!(inbound.raw["source"], "reminder");
        assert_eq!(inbound.raw["reminderId"], "r1");
    }

    #[tokio::test]
    async fn firing_an_at_reminder_disables_it() {
        let now = Utc::now();
        let (kernel, reminders) = test_kernel().await;
        let mut reminder = due_every_reminder(now);
        reminder.schedule = Schedule::At { at: now - chrono::Duration::seconds(1) };
        reminders.insert(&reminder).await.unwrap();

        let runner = ReminderRunner::new(reminders.clone(), kernel, 250);
        let fired = runner.tick_once().await.unwrap();
        assert_eq!(fired, 1);

        let updated = reminders.get("r1").await.unwrap().unwrap();
        assert!(!updated.enabled);
        assert!(updated.next_run_at.is_none());
    }

    #[tokio::test]
    async fn a_reminder_not_yet_due_does_not_fire() {
        let now = Utc::now();
        let (kernel, reminders) = test_kernel().await;
        let mut reminder = due_every_reminder(now);
        reminder.next_run_at = Some(now + chrono::Duration::minutes(5));
        reminders.insert(&reminder).await.unwrap();

        let runner = ReminderRunner::new(reminders, kernel, 250);
        assert_eq!(runner.tick_once().await.unwrap(), 0);
    }
}
