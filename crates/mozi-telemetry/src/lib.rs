//! Mozi Telemetry — logging and tracing for the mozi runtime kernel.
//!
//! This crate provides:
//! - Configurable logging setup with multiple formats
//! - Request context for correlation across operations
//! - Integration with the `tracing` ecosystem
//!
//! # Example
//!
//! ```rust,no_run
//! use mozi_telemetry::{LogConfig, LogFormat, setup_logging, RequestContext};
//!
//! # fn main() -> Result<(), mozi_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("mozi_kernel=trace");
//!
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("kernel").with_operation("pump_tick");
//! let _guard = ctx.enter();
//! tracing::info!("pump tick started");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod logging;
pub mod prelude;

pub use context::{RequestContext, RequestGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
