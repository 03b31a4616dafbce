//! Error type for the pure, dependency-free operations this crate exposes
//! (session-key parsing, admission-mode parsing). The umbrella error type
//! that aggregates every `mozi-*` crate's error (`mozi_kernel::KernelError`)
//! lives one layer up, in `mozi-kernel`, since it is the crate that actually
//! depends on storage/config/reminders and can `#[from]`-convert their
//! errors without creating a dependency cycle.

use thiserror::Error;

/// Errors raised by this crate's own logic.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A configuration string did not match a known enum variant.
    #[error("invalid value for {field}: {value}")]
    InvalidValue {
        /// The field name being parsed.
        field: &'static str,
        /// The offending raw value.
        value: String,
    },
}

/// Result alias for this crate's fallible operations.
pub type KernelResult<T> = Result<T, KernelError>;
