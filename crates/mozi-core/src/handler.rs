//! The message handler contract (SPEC_FULL §6) and the queue admission
//! modes that select how the kernel applies it.
//!
//! Rather than probing for optional methods at call time (the source
//! repository's approach, flagged as a redesign target in SPEC_FULL §9), the
//! contract is a fixed capability set: every hook is a real trait method
//! with a default "not supported" implementation, so a handler opts in by
//! overriding only the hooks it needs.

use async_trait::async_trait;

use crate::envelope::InboundMessage;
use crate::session::SessionKey;

/// Queue admission policy, selected per-kernel-instance by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdmissionMode {
    /// Every inbound becomes a new row; FIFO per session.
    Followup,
    /// Successive inbounds within a window merge into the latest queued row.
    Collect,
    /// Each inbound interrupts everything pending/running for the session.
    Interrupt,
    /// Non-command text is injected into the active run when possible.
    Steer,
    /// Like `Steer`, but preempts an active run instead of injecting.
    SteerBacklog,
}

impl Default for AdmissionMode {
    fn default() -> Self {
        Self::SteerBacklog
    }
}

impl AdmissionMode {
    /// Parse the configuration string, rejecting anything unrecognized.
    ///
    /// # Errors
    ///
    /// Returns an error string naming the invalid mode.
    pub fn parse(raw: &str) -> Result<Self, String> {
        Ok(match raw {
            "followup" => Self::Followup,
            "collect" => Self::Collect,
            "interrupt" => Self::Interrupt,
            "steer" => Self::Steer,
            "steer-backlog" => Self::SteerBacklog,
            other => return Err(format!("unknown queue mode: {other}")),
        })
    }

    /// The stable configuration string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Followup => "followup",
            Self::Collect => "collect",
            Self::Interrupt => "interrupt",
            Self::Steer => "steer",
            Self::SteerBacklog => "steer-backlog",
        }
    }
}

/// A per-turn facade handed to [`MessageHandler::handle`]. Implementations
/// route `send`/`begin_typing` through the egress adapter (C9) carrying a
/// delivery receipt; handlers never see the channel registry directly.
#[async_trait]
pub trait RuntimeChannel: Send + Sync {
    /// Deliver an outbound text message for the current turn.
    async fn send(&self, text: &str);

    /// Signal that the handler is composing a reply, for adapters that
    /// support a typing indicator. Default is a no-op.
    async fn begin_typing(&self) {}
}

/// The contract a turn-runner must implement to be driven by the kernel.
///
/// `resolve_session_context` and `handle` are mandatory. The three
/// admission-mode hooks are optional; their default implementations report
/// "not supported," which disables the corresponding mode behavior exactly
/// as an absent method would in a dynamic-dispatch source.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Resolve the canonical session key and agent id for an inbound
    /// message. Must be pure (no I/O, no mutation).
    fn resolve_session_context(&self, inbound: &InboundMessage) -> (SessionKey, String);

    /// Run one turn. Errors are caught by the kernel and classified by the
    /// error policy (C6); nothing propagates to the caller of
    /// `enqueue_inbound`.
    async fn handle(
        &self,
        inbound: InboundMessage,
        channel: &dyn RuntimeChannel,
    ) -> Result<(), String>;

    /// Best-effort abort of an in-flight run for `session_key`. Used by
    /// `/stop` and interrupt/steer-backlog preemption. Default: unsupported.
    async fn interrupt_session(&self, _session_key: &SessionKey, _reason: &str) -> bool {
        false
    }

    /// Attempt to inject `text` into an active run. Returns `true` if the
    /// handler accepted the text in place of a new queue row. Default:
    /// unsupported.
    async fn steer_session(&self, _session_key: &SessionKey, _text: &str, _mode: &str) -> bool {
        false
    }

    /// Whether a handler invocation is currently active for `session_key`.
    /// Default: unsupported (treated as `false`, which routes `steer-backlog`
    /// down the plain `steer` path).
    async fn is_session_active(&self, _session_key: &SessionKey) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parse_round_trips() {
        for mode in [
            AdmissionMode::Followup,
            AdmissionMode::Collect,
            AdmissionMode::Interrupt,
            AdmissionMode::Steer,
            AdmissionMode::SteerBacklog,
        ] {
            assert_eq!(AdmissionMode::parse(mode.as_str()).unwrap(), mode);
        }
    }

    #[test]
    fn mode_parse_rejects_unknown() {
        assert!(AdmissionMode::parse("bogus").is_err());
    }

    #[test]
    fn default_mode_is_steer_backlog() {
        assert_eq!(AdmissionMode::default(), AdmissionMode::SteerBacklog);
    }
}
