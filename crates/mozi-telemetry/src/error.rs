//! Telemetry error types.

use thiserror::Error;

/// Errors raised while configuring logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The global tracing subscriber was already installed.
    #[error("logging already initialized")]
    AlreadyInitialized,

    /// A log file target could not be opened.
    #[error("failed to open log file at {path}: {source}")]
    LogFileOpen {
        /// Path that failed to open.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The requested filter directive could not be parsed.
    #[error("invalid filter directive '{directive}': {message}")]
    InvalidDirective {
        /// The offending directive string.
        directive: String,
        /// Parser error message.
        message: String,
    },
}

/// Result alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
