//! Reminder domain types: the tagged-union schedule and the durable row
//! shape the Reminder Scheduler polls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{PeerType, SessionKey};

/// When a reminder fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schedule {
    /// Fires once at a fixed instant.
    At {
        /// The instant to fire at.
        at: DateTime<Utc>,
    },
    /// Fires repeatedly every fixed interval from an anchor.
    Every {
        /// Interval between firings.
        every_ms: i64,
        /// Reference instant the interval is measured from. Defaults to the
        /// reminder's creation time if absent.
        anchor: Option<DateTime<Utc>>,
    },
    /// Fires on a cron expression, optionally in a named time zone.
    Cron {
        /// Standard five- or six-field cron expression.
        expr: String,
        /// IANA time zone name; defaults to UTC if absent.
        tz: Option<String>,
    },
}

impl Schedule {
    /// The stable discriminant stored alongside the schedule, matching
    /// [`Schedule::kind`] in log lines and the `kind` JSON tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::At { .. } => "at",
            Self::Every { .. } => "every",
            Self::Cron { .. } => "cron",
        }
    }
}

/// A scheduled reminder row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    /// Opaque unique identifier.
    pub id: String,
    /// Session the reminder fires into.
    pub session_key: SessionKey,
    /// Channel the synthesized envelope is routed through.
    pub channel_id: String,
    /// Peer the synthesized envelope is routed to.
    pub peer_id: String,
    /// Kind of peer.
    pub peer_type: PeerType,
    /// User-visible reminder text.
    pub message: String,
    /// Tagged-union firing schedule.
    pub schedule: Schedule,
    /// Whether the reminder is still eligible to fire.
    pub enabled: bool,
    /// Next instant `listDue` will select this row, if any.
    pub next_run_at: Option<DateTime<Utc>>,
    /// Last instant this row fired, if any.
    pub last_run_at: Option<DateTime<Utc>>,
    /// When the reminder was cancelled, if it was.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent update.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_kind_matches_json_tag() {
        assert_eq!(Schedule::At { at: Utc::now() }.kind(), "at");
        assert_eq!(Schedule::Every { every_ms: 1000, anchor: None }.kind(), "every");
        assert_eq!(Schedule::Cron { expr: "* * * * * *".to_owned(), tz: None }.kind(), "cron");
    }

    #[test]
    fn schedule_round_trips_through_json() {
        let schedule = Schedule::Every { every_ms: 60_000, anchor: Some(Utc::now()) };
        let raw = serde_json::to_string(&schedule).unwrap();
        let parsed: Schedule = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.kind(), "every");
    }
}
