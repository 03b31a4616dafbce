//! Configuration struct definitions for the runtime kernel (SPEC_FULL §10).

use serde::{Deserialize, Serialize};

/// Top-level, validated kernel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Queue admission policy and tuning.
    pub queue: QueueConfig,
    /// Error-policy retry tuning.
    pub retry: RetryConfig,
    /// Reminder scheduler tuning.
    pub reminders: ReminderConfig,
    /// Durable storage location.
    pub storage: StorageConfig,
    /// Agent-level defaults.
    pub agent: AgentConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            retry: RetryConfig::default(),
            reminders: ReminderConfig::default(),
            storage: StorageConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

/// Queue-mode configuration (SPEC_FULL §6 "Queue modes & tuning").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// `followup | collect | interrupt | steer | steer-backlog`.
    pub mode: String,
    /// Collect-mode merge window, milliseconds.
    pub collect_window_ms: u64,
    /// Maximum pending+retrying rows per session before the oldest are
    /// interrupted. `None` (absent in TOML) means unbounded.
    pub max_backlog: Option<u32>,
    /// Pump polling interval, milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            mode: "steer-backlog".to_owned(),
            collect_window_ms: 400,
            max_backlog: None,
            poll_interval_ms: 250,
        }
    }
}

/// Error-policy (C6) retry tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum retry attempts before a transient error becomes terminal.
    pub max_retries: u32,
    /// Base delay for exponential backoff, milliseconds.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

/// Reminder scheduler (C8) tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Poll interval, milliseconds. Must be at least 250.
    pub poll_ms: u64,
    /// Maximum due reminders processed per tick.
    pub batch_size: u32,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            poll_ms: 1000,
            batch_size: 25,
        }
    }
}

/// Durable storage location and connection tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the sqlite database file, or `:memory:` for ephemeral stores.
    pub path: String,
    /// `busy_timeout` applied to the sqlite connection, milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "mozi.db".to_owned(),
            busy_timeout_ms: 5000,
        }
    }
}

/// Agent-level defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Default `agentId` used when a session key is built without one.
    pub default_agent_id: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_agent_id: "mozi".to_owned(),
        }
    }
}
