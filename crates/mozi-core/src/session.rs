//! Canonical session identity and status vocabulary.

use std::fmt;

/// The default agent identifier used when a session key is built without
/// one, e.g. for locally-originated reminders.
pub const DEFAULT_AGENT_ID: &str = "mozi";

/// Kind of peer a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerType {
    /// One-on-one direct message.
    Dm,
    /// A multi-party group chat.
    Group,
    /// A broadcast-style channel.
    Channel,
}

impl Default for PeerType {
    fn default() -> Self {
        Self::Dm
    }
}

impl fmt::Display for PeerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Dm => "dm",
            Self::Group => "group",
            Self::Channel => "channel",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for PeerType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "group" => Self::Group,
            "channel" => Self::Channel,
            _ => Self::Dm,
        })
    }
}

/// Lifecycle status of a [`Session`](crate::session). Unknown values read
/// from storage normalize to `Idle` rather than failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No queue activity; the default at creation.
    Idle,
    /// At least one queue row is waiting to run.
    Queued,
    /// A handler invocation is currently in flight.
    Running,
    /// The last attempt failed transiently and will retry.
    Retrying,
    /// The last turn finished successfully.
    Completed,
    /// The last turn failed terminally.
    Failed,
    /// The last turn was externally cancelled.
    Interrupted,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl SessionStatus {
    /// Parse a stored status string, normalizing anything unrecognized to
    /// [`SessionStatus::Idle`] per SPEC_FULL §4.6.
    #[must_use]
    pub fn from_stored(raw: &str) -> Self {
        match raw {
            "queued" => Self::Queued,
            "running" => Self::Running,
            "retrying" => Self::Retrying,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "interrupted" => Self::Interrupted,
            _ => Self::Idle,
        }
    }

    /// The stable string stored in the database and logged.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        }
    }
}

/// Canonical session identifier: `{agentId}:{channel}:{peerType}:{peerId}`.
///
/// Subagent sessions substitute `channel` with the literal `subagent` and
/// `peerId` with a random identifier; that substitution happens at the call
/// site, not here — this type only parses and formats the four-part key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Build a session key from its four parts.
    #[must_use]
    pub fn new(agent_id: &str, channel: &str, peer_type: PeerType, peer_id: &str) -> Self {
        Self(format!("{agent_id}:{channel}:{peer_type}:{peer_id}"))
    }

    /// Parse `{agentId}:{channel}:{peerType}:{peerId}`, defaulting any
    /// missing trailing part: `agentId` defaults to [`DEFAULT_AGENT_ID`],
    /// `channel` to `unknown`, `peerType` to `dm`, `peerId` to `unknown`.
    #[must_use]
    pub fn parse_or_default(raw: &str) -> Self {
        let mut parts = raw.splitn(4, ':');
        let agent_id = parts.next().filter(|s| !s.is_empty()).unwrap_or(DEFAULT_AGENT_ID);
        let channel = parts.next().filter(|s| !s.is_empty()).unwrap_or("unknown");
        let peer_type: PeerType = parts
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("dm")
            .parse()
            .unwrap_or_default();
        let peer_id = parts.next().filter(|s| !s.is_empty()).unwrap_or("unknown");
        Self::new(agent_id, channel, peer_type, peer_id)
    }

    /// Borrow the raw canonical string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A catalogued conversation thread. Durable fields mirror the `sessions`
/// table; `lastActiveAt` advances on every update.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Session {
    /// Canonical session identifier; primary key.
    pub key: SessionKey,
    /// Agent identifier the session belongs to.
    pub agent_id: String,
    /// Channel identifier (`telegram`, `discord`, `local`, ...).
    pub channel: String,
    /// Routing identifier of the remote peer.
    pub peer_id: String,
    /// Kind of peer.
    pub peer_type: PeerType,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Parent session, set for subagent sessions.
    pub parent_key: Option<SessionKey>,
    /// Free-form metadata.
    pub metadata: serde_json::Value,
    /// Creation timestamp.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Timestamp of the most recent update.
    pub last_active_at: chrono::DateTime<chrono::Utc>,
}
