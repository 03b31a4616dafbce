//! Convenience re-exports for crates that only need the common path.

pub use crate::context::RequestContext;
pub use crate::logging::{LogConfig, LogFormat, setup_logging};
