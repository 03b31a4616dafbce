//! Mozi Errors — pure classification of handler invocation failures into a
//! retry-or-terminate decision.
//!
//! No I/O, no clock, no async: [`decide`] is a deterministic function over an
//! error message and an attempt count, callable from both the pump's
//! exception path and from tests without a fixture.

#![deny(unsafe_code)]
#![warn(clippy::all)]

/// Case-insensitive substrings that mark an error as a capability gap rather
/// than a transient fault. A handler that raises one of these will never
/// succeed on retry.
const CAPABILITY_MARKERS: &[&str] = &["image_url", "unsupported input", "does not support image"];

/// Case-insensitive substrings that mark an error as transient.
const TRANSIENT_MARKERS: &[&str] =
    &["already processing a prompt", "timeout", "temporarily unavailable", "network", "rate limit", "503"];

/// Default maximum number of retry attempts before a transient error is
/// treated as terminal.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for the exponential backoff, in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Outcome of classifying one handler-invocation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Retry after `delay_ms`, tagged with `reason`.
    Retry {
        /// Milliseconds to wait before the row becomes runnable again.
        delay_ms: u64,
        /// Short machine-readable reason, prefixed onto the stored error.
        reason: &'static str,
    },
    /// Give up; the row transitions to `failed`.
    Terminal {
        /// Short machine-readable reason, prefixed onto the stored error.
        reason: &'static str,
    },
}

/// Policy knobs, mirroring `[retry]` in the kernel configuration.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    /// Attempts allowed (inclusive) before a transient error goes terminal.
    pub max_retries: u32,
    /// Base delay for `base_delay_ms * 2^attempt`.
    pub base_delay_ms: u64,
}

impl Default for Policy {
    fn default() -> Self {
        Self { max_retries: DEFAULT_MAX_RETRIES, base_delay_ms: DEFAULT_BASE_DELAY_MS }
    }
}

impl Policy {
    /// Classify `error_message` raised on the given 1-indexed `attempt`.
    #[must_use]
    pub fn decide(&self, error_message: &str, attempt: u32) -> Decision {
        decide_with(self, error_message, attempt)
    }
}

/// Classify `error_message` raised on the given 1-indexed `attempt` using the
/// default [`Policy`].
#[must_use]
pub fn decide(error_message: &str, attempt: u32) -> Decision {
    Policy::default().decide(error_message, attempt)
}

fn decide_with(policy: &Policy, error_message: &str, attempt: u32) -> Decision {
    let lower = error_message.to_lowercase();

    if CAPABILITY_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return Decision::Terminal { reason: "capability_error" };
    }

    if TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker)) && attempt < policy.max_retries {
        let exp = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay_ms = policy.base_delay_ms.saturating_mul(exp);
        return Decision::Retry { delay_ms, reason: "transient_error" };
    }

    Decision::Terminal { reason: "terminal_error" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_error_is_always_terminal() {
        let decision = decide("Model does not support image input", 0);
        assert_eq!(decision, Decision::Terminal { reason: "capability_error" });
    }

    #[test]
    fn transient_error_retries_with_exponential_delay() {
        assert_eq!(decide("upstream timeout", 0), Decision::Retry { delay_ms: 1000, reason: "transient_error" });
        assert_eq!(decide("upstream timeout", 1), Decision::Retry { delay_ms: 2000, reason: "transient_error" });
        assert_eq!(decide("upstream timeout", 2), Decision::Retry { delay_ms: 4000, reason: "transient_error" });
    }

    #[test]
    fn transient_error_becomes_terminal_past_max_retries() {
        let policy = Policy { max_retries: 3, base_delay_ms: 1000 };
        assert_eq!(policy.decide("rate limit exceeded", 3), Decision::Terminal { reason: "terminal_error" });
    }

    #[test]
    fn unrecognized_error_is_terminal() {
        assert_eq!(decide("assertion failed: index out of bounds", 0), Decision::Terminal { reason: "terminal_error" });
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(decide("RATE LIMIT hit", 0), Decision::Retry { delay_ms: 1000, reason: "transient_error" });
        assert_eq!(decide("IMAGE_URL not supported", 0), Decision::Terminal { reason: "capability_error" });
    }

    #[test]
    fn attempt_counter_cannot_overflow_the_shift() {
        let policy = Policy { max_retries: u32::MAX, base_delay_ms: 1000 };
        let decision = policy.decide("network error", 200);
        assert_eq!(decision, Decision::Retry { delay_ms: u64::MAX, reason: "transient_error" });
    }
}
