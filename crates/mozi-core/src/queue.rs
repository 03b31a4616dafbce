//! Queue item status vocabulary and the durable queue row shape.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{PeerType, SessionKey};

/// Lifecycle status of a durable queue row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueItemStatus {
    /// Waiting for a pump claim.
    Queued,
    /// Claimed; a handler invocation is in flight.
    Running,
    /// A transient error was classified as retryable; waiting for
    /// `available_at`.
    Retrying,
    /// The handler returned successfully.
    Completed,
    /// The handler raised a terminal error.
    Failed,
    /// Externally cancelled via `/stop` or preemption.
    Interrupted,
}

impl QueueItemStatus {
    /// `true` for the two statuses `listRunnable` selects.
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Queued | Self::Retrying)
    }

    /// `true` for the three statuses that imply `finishedAt` is set.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Interrupted)
    }

    /// The stable string stored in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for QueueItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QueueItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "queued" => Self::Queued,
            "running" => Self::Running,
            "retrying" => Self::Retrying,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "interrupted" => Self::Interrupted,
            other => return Err(format!("unknown queue item status: {other}")),
        })
    }
}

/// A durable queue row (SPEC_FULL §3 "Queue Item").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// Opaque unique identifier.
    pub id: String,
    /// Globally unique dedup key.
    pub dedup_key: String,
    /// Owning session.
    pub session_key: SessionKey,
    /// Mirror of inbound routing: channel id.
    pub channel_id: String,
    /// Mirror of inbound routing: peer id.
    pub peer_id: String,
    /// Mirror of inbound routing: peer type.
    pub peer_type: PeerType,
    /// Serialized inbound message.
    pub inbound_json: serde_json::Value,
    /// Current lifecycle status.
    pub status: QueueItemStatus,
    /// Number of handler attempts so far.
    pub attempts: u32,
    /// Error or interrupt reason, if any.
    pub error: Option<String>,
    /// When the envelope was admitted.
    pub enqueued_at: DateTime<Utc>,
    /// When the row becomes eligible for `claim`.
    pub available_at: DateTime<Utc>,
    /// When the row was last claimed.
    pub started_at: Option<DateTime<Utc>>,
    /// When the row reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}
