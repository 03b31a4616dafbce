//! Integration coverage for the testable properties and mode laws the
//! kernel is required to uphold: FIFO serialization per session, full
//! parallelism across sessions, dedup-key idempotence, crash recovery,
//! collect-mode merging, and `/stop` tombstoning continuations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mozi_continuations::{ContinuationRegistry, ContinuationRequest};
use mozi_core::handler::{AdmissionMode, MessageHandler, RuntimeChannel};
use mozi_core::{InboundEnvelope, InboundMessage, PeerType, QueueItemStatus, SessionKey, SystemClock};
use mozi_kernel::{ChannelRegistry, Egress, Kernel, KernelTuning};
use mozi_sessions::SessionManager;
use mozi_storage::{Database, QueueRepository, SqliteQueueRepository, SqliteSessionRepository};
use mozi_test::MockMessageHandler;
use tokio::sync::Mutex;

struct NullChannelRegistry;

#[async_trait]
impl ChannelRegistry for NullChannelRegistry {
    async fn send(&self, _channel_id: &str, _peer_id: &str, _text: &str) -> Result<(), String> {
        Ok(())
    }
}

fn envelope(id: &str, peer_id: &str, text: &str) -> InboundEnvelope {
    InboundEnvelope {
        id: format!("env-{id}"),
        inbound: InboundMessage {
            id: id.to_owned(),
            channel: "test".to_owned(),
            peer_id: peer_id.to_owned(),
            peer_type: PeerType::Dm,
            sender_id: peer_id.to_owned(),
            text: Some(text.to_owned()),
            media: None,
            timestamp: Utc::now(),
            raw: serde_json::json!({}),
        },
        dedup_key: None,
        received_at: Utc::now(),
    }
}

async fn kernel_with(mode: AdmissionMode, handler: Arc<dyn MessageHandler>) -> Kernel {
    let db = Database::open_in_memory().await.unwrap();
    let queue: Arc<dyn QueueRepository> = Arc::new(SqliteQueueRepository::new(db.clone()));
    let sessions = SessionManager::new(Arc::new(SqliteSessionRepository::new(db)));
    let egress = Arc::new(Egress::new(Arc::new(NullChannelRegistry)));
    Kernel::new(
        queue,
        sessions,
        ContinuationRegistry::new(),
        handler,
        egress,
        Arc::new(SystemClock),
        KernelTuning { mode, ..KernelTuning::default() },
        mozi_errors::Policy::default(),
    )
}

/// Records the order `handle` was invoked in, and by default just succeeds.
struct RecordingHandler {
    order: Mutex<Vec<String>>,
    call_count: AtomicUsize,
}

impl RecordingHandler {
    fn new() -> Self {
        Self { order: Mutex::new(Vec::new()), call_count: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    fn resolve_session_context(&self, inbound: &InboundMessage) -> (SessionKey, String) {
        (SessionKey::new("mozi", &inbound.channel, inbound.peer_type, &inbound.peer_id), "mozi".to_owned())
    }

    async fn handle(&self, inbound: InboundMessage, _channel: &dyn RuntimeChannel) -> Result<(), String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.order.lock().await.push(inbound.text.unwrap_or_default());
        Ok(())
    }
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true within the test timeout");
}

#[tokio::test]
async fn followup_items_in_one_session_run_fifo() {
    let handler = Arc::new(RecordingHandler::new());
    let kernel = kernel_with(AdmissionMode::Followup, handler.clone()).await;
    kernel.startup_recovery().await.unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let pump = tokio::spawn({
        let kernel = kernel.clone();
        async move { kernel.run(shutdown_rx).await }
    });

    kernel.enqueue_inbound(envelope("m1", "p1", "first")).await.unwrap();
    kernel.enqueue_inbound(envelope("m2", "p1", "second")).await.unwrap();

    wait_until(|| handler.call_count.load(Ordering::SeqCst) == 2).await;
    assert_eq!(*handler.order.lock().await, vec!["first".to_owned(), "second".to_owned()]);

    let _ = shutdown_tx.send(());
    let _ = pump.await;
}

#[tokio::test]
async fn distinct_sessions_run_in_parallel() {
    struct BarrierHandler {
        barrier: Arc<tokio::sync::Barrier>,
        done: AtomicUsize,
    }

    #[async_trait]
    impl MessageHandler for BarrierHandler {
        fn resolve_session_context(&self, inbound: &InboundMessage) -> (SessionKey, String) {
            (SessionKey::new("mozi", &inbound.channel, inbound.peer_type, &inbound.peer_id), "mozi".to_owned())
        }

        async fn handle(&self, _inbound: InboundMessage, _channel: &dyn RuntimeChannel) -> Result<(), String> {
            // Two sessions both wait here; if the kernel serialized them onto
            // one task this would deadlock, since only one could ever reach
            // the barrier.
            self.barrier.wait().await;
            self.done.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let barrier = Arc::new(tokio::sync::Barrier::new(2));
    let handler = Arc::new(BarrierHandler { barrier, done: AtomicUsize::new(0) });
    let kernel = kernel_with(AdmissionMode::Followup, handler.clone()).await;
    kernel.startup_recovery().await.unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let pump = tokio::spawn({
        let kernel = kernel.clone();
        async move { kernel.run(shutdown_rx).await }
    });

    kernel.enqueue_inbound(envelope("m1", "session-a", "hi")).await.unwrap();
    kernel.enqueue_inbound(envelope("m2", "session-b", "hi")).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), wait_until(|| handler.done.load(Ordering::SeqCst) == 2))
        .await
        .expect("both sessions should reach the barrier concurrently without deadlocking");

    let _ = shutdown_tx.send(());
    let _ = pump.await;
}

#[tokio::test]
async fn duplicate_dedup_key_is_rejected_without_a_second_handler_call() {
    let handler = Arc::new(RecordingHandler::new());
    let kernel = kernel_with(AdmissionMode::Followup, handler.clone()).await;
    kernel.startup_recovery().await.unwrap();

    let mut first = envelope("m1", "p1", "hello");
    first.dedup_key = Some("fixed-key".to_owned());
    let mut second = envelope("m2", "p1", "hello again");
    second.dedup_key = Some("fixed-key".to_owned());

    let first_result = kernel.enqueue_inbound(first).await.unwrap();
    assert!(first_result.accepted);
    assert!(!first_result.deduplicated);

    let second_result = kernel.enqueue_inbound(second).await.unwrap();
    assert!(!second_result.accepted);
    assert!(second_result.deduplicated);

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let pump = tokio::spawn({
        let kernel = kernel.clone();
        async move { kernel.run(shutdown_rx).await }
    });
    wait_until(|| handler.call_count.load(Ordering::SeqCst) == 1).await;
    let _ = shutdown_tx.send(());
    let _ = pump.await;
}

#[tokio::test]
async fn startup_recovery_interrupts_rows_left_running() {
    let handler = Arc::new(RecordingHandler::new());
    let kernel = kernel_with(AdmissionMode::Followup, handler).await;

    let result = kernel.enqueue_inbound(envelope("m1", "p1", "hello")).await.unwrap();
    let item_id = result.queue_item_id.unwrap();
    assert!(kernel.queue().claim(&item_id, Utc::now()).await.unwrap());

    let row = kernel.queue().get_by_id(&item_id).await.unwrap().unwrap();
    assert_eq!(row.status, QueueItemStatus::Running);

    let interrupted = kernel.startup_recovery().await.unwrap();
    assert_eq!(interrupted, 1);

    let row = kernel.queue().get_by_id(&item_id).await.unwrap().unwrap();
    assert_eq!(row.status, QueueItemStatus::Interrupted);
}

#[tokio::test]
async fn collect_mode_merges_within_the_window() {
    let handler = Arc::new(RecordingHandler::new());
    let kernel = kernel_with(AdmissionMode::Collect, handler).await;

    let first = kernel.enqueue_inbound(envelope("m1", "p1", "first")).await.unwrap();
    let second = kernel.enqueue_inbound(envelope("m2", "p1", "second")).await.unwrap();

    assert_eq!(first.queue_item_id, second.queue_item_id);

    let row = kernel.queue().get_by_id(first.queue_item_id.as_deref().unwrap()).await.unwrap().unwrap();
    let merged: InboundMessage = serde_json::from_value(row.inbound_json).unwrap();
    assert_eq!(merged.text.as_deref(), Some("first\nsecond"));
}

#[tokio::test]
async fn stop_tombstones_pending_continuations_and_interrupts_the_session() {
    let handler = Arc::new(RecordingHandler::new());
    let kernel = kernel_with(AdmissionMode::Followup, handler).await;

    let first = kernel.enqueue_inbound(envelope("m1", "p1", "hello")).await.unwrap();
    let session_key = first.session_key.clone();
    kernel.continuations().schedule(&session_key, ContinuationRequest {
        prompt: "keep going".to_owned(),
        delay_ms: None,
        reason: None,
        context: serde_json::Value::Null,
    }).await;

    kernel.enqueue_inbound(envelope("m2", "p1", "/stop")).await.unwrap();

    assert!(kernel.continuations().consume(&session_key).await.is_empty());

    let first_row = kernel.queue().get_by_id(first.queue_item_id.as_deref().unwrap()).await.unwrap().unwrap();
    assert_eq!(first_row.status, QueueItemStatus::Interrupted);
}

#[tokio::test]
async fn interrupt_mode_preempts_the_pending_row_before_admitting_the_new_one() {
    let handler = Arc::new(MockMessageHandler::new().with_agent_id("mozi"));
    let kernel = kernel_with(AdmissionMode::Interrupt, handler.clone()).await;

    let first = kernel.enqueue_inbound(envelope("m1", "p1", "first")).await.unwrap();
    let second = kernel.enqueue_inbound(envelope("m2", "p1", "second")).await.unwrap();

    let first_row = kernel.queue().get_by_id(first.queue_item_id.as_deref().unwrap()).await.unwrap().unwrap();
    assert_eq!(first_row.status, QueueItemStatus::Interrupted);

    let second_row = kernel.queue().get_by_id(second.queue_item_id.as_deref().unwrap()).await.unwrap().unwrap();
    assert_eq!(second_row.status, QueueItemStatus::Queued);
}

#[tokio::test]
async fn steer_mode_routes_into_the_running_turn_instead_of_enqueueing() {
    let handler = Arc::new(MockMessageHandler::new().with_agent_id("mozi"));
    handler.queue_steer_result(true);
    let kernel = kernel_with(AdmissionMode::Steer, handler.clone()).await;

    let result = kernel.enqueue_inbound(envelope("m1", "p1", "steer me")).await.unwrap();

    assert!(result.accepted);
    assert!(!result.deduplicated);
    assert!(result.queue_item_id.is_none());
    assert!(kernel.queue().list_pending_by_session(&result.session_key).await.unwrap().is_empty());
}

#[tokio::test]
async fn steer_mode_falls_through_to_a_normal_enqueue_when_the_handler_declines() {
    let handler = Arc::new(MockMessageHandler::new().with_agent_id("mozi"));
    handler.queue_steer_result(false);
    let kernel = kernel_with(AdmissionMode::Steer, handler.clone()).await;

    let result = kernel.enqueue_inbound(envelope("m1", "p1", "steer me")).await.unwrap();

    assert!(result.accepted);
    assert!(result.queue_item_id.is_some());
    let row = kernel.queue().get_by_id(result.queue_item_id.as_deref().unwrap()).await.unwrap().unwrap();
    assert_eq!(row.status, QueueItemStatus::Queued);
}

#[tokio::test]
async fn steer_backlog_mode_preempts_instead_of_steering_once_the_session_is_active() {
    let handler = Arc::new(MockMessageHandler::new().with_agent_id("mozi"));
    handler.set_active(true);
    let kernel = kernel_with(AdmissionMode::SteerBacklog, handler.clone()).await;

    let first = kernel.enqueue_inbound(envelope("m1", "p1", "first")).await.unwrap();
    let second = kernel.enqueue_inbound(envelope("m2", "p1", "second")).await.unwrap();

    let first_row = kernel.queue().get_by_id(first.queue_item_id.as_deref().unwrap()).await.unwrap().unwrap();
    assert_eq!(first_row.status, QueueItemStatus::Interrupted);
    assert!(second.accepted);
    assert!(second.queue_item_id.is_some());
}

#[tokio::test]
async fn steer_backlog_mode_steers_when_the_session_is_quiescent() {
    let handler = Arc::new(MockMessageHandler::new().with_agent_id("mozi"));
    handler.set_active(false);
    handler.queue_steer_result(true);
    let kernel = kernel_with(AdmissionMode::SteerBacklog, handler.clone()).await;

    let result = kernel.enqueue_inbound(envelope("m1", "p1", "steer me")).await.unwrap();

    assert!(result.accepted);
    assert!(result.queue_item_id.is_none());
}
