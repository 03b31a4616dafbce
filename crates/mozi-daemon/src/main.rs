//! Process entry point: load configuration, open the durable store, wire
//! the kernel and reminder runner together, and run until `Ctrl-C`.

#![deny(unsafe_code)]
#![warn(clippy::all)]

mod cli;
mod console;
mod handler;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use console::{ConsoleChannelRegistry, run_console_ingress};
use handler::EchoHandler;
use mozi_config::KernelConfig;
use mozi_continuations::ContinuationRegistry;
use mozi_core::{AdmissionMode, SystemClock};
use mozi_kernel::{Egress, Kernel, KernelTuning};
use mozi_reminders::ReminderRunner;
use mozi_sessions::SessionManager;
use mozi_storage::{Database, QueueRepository, ReminderRepository, SqliteQueueRepository, SqliteReminderRepository, SqliteSessionRepository};
use mozi_telemetry::{LogConfig, LogFormat, setup_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::new(cli.log_level.clone());
    if cli.json_logs {
        log_config = log_config.with_format(LogFormat::Json);
    }
    setup_logging(&log_config).context("failed to initialize logging")?;

    let config = KernelConfig::load(cli.workspace.as_deref()).context("failed to load kernel configuration")?;

    let mode = AdmissionMode::parse(&config.queue.mode).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "unrecognized queue mode in configuration, falling back to the default");
        AdmissionMode::default()
    });
    let tuning = KernelTuning {
        mode,
        // Config values are bounded u64 milliseconds; i64 overflow is not reachable in practice.
        #[allow(clippy::arithmetic_side_effects)]
        collect_window_ms: i64::try_from(config.queue.collect_window_ms).unwrap_or(i64::MAX),
        max_backlog: config.queue.max_backlog,
        poll_interval_ms: config.queue.poll_interval_ms,
    };
    let retry_policy = mozi_errors::Policy { max_retries: config.retry.max_retries, base_delay_ms: config.retry.base_delay_ms };

    let database = Database::open(config.storage.path.clone()).await.context("failed to open the durable store")?;
    let queue: Arc<dyn QueueRepository> = Arc::new(SqliteQueueRepository::new(database.clone()));
    let reminders: Arc<dyn ReminderRepository> = Arc::new(SqliteReminderRepository::new(database.clone()));
    let sessions = SessionManager::new(Arc::new(SqliteSessionRepository::new(database)));

    let egress = Arc::new(Egress::new(Arc::new(ConsoleChannelRegistry)));
    let handler = Arc::new(EchoHandler::new(config.agent.default_agent_id.clone()));

    let kernel = Kernel::new(
        queue,
        sessions,
        ContinuationRegistry::new(),
        handler,
        egress,
        Arc::new(SystemClock),
        tuning,
        retry_policy,
    );

    let interrupted = kernel.startup_recovery().await.context("startup recovery failed")?;
    if interrupted > 0 {
        tracing::warn!(interrupted, "recovered queue rows left running by a previous crash");
    }

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    let pump_handle = tokio::spawn({
        let kernel = kernel.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        async move { kernel.run(shutdown_rx).await }
    });

    let reminder_runner = ReminderRunner::new(reminders, kernel.clone(), config.reminders.poll_ms).with_batch(config.reminders.batch_size);
    let reminder_handle = tokio::spawn({
        let shutdown_rx = shutdown_tx.subscribe();
        async move { reminder_runner.run(shutdown_rx).await }
    });

    let console_handle = tokio::spawn({
        let kernel = kernel.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        async move { run_console_ingress(kernel, shutdown_rx).await }
    });

    tracing::info!("mozi daemon running, type a message and press enter");

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("received ctrl-c, shutting down");

    let _ = shutdown_tx.send(());
    let _ = tokio::join!(pump_handle, reminder_handle, console_handle);

    Ok(())
}
