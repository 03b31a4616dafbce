//! The umbrella error type returned from this crate's public API, aggregating
//! each collaborator crate's own error at the kernel seam.

use thiserror::Error;

/// Errors raised while admitting, pumping, or dispatching queue items.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A durable repository call failed.
    #[error(transparent)]
    Storage(#[from] mozi_storage::StorageError),
}

/// Result alias for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
