use super::SuspensionStatus;
use crate::core::ContinuationHandle;
use thiserror::Error;

/// Storage layer error type for tessera.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageError {
    /// No suspension is registered under this handle.
    #[error("continuation handle not found: {0}")]
    NotFound(ContinuationHandle),

    /// The suspension already carries a terminal disposition.
    #[error("continuation handle {handle} already resolved as {status}")]
    AlreadyResolved {
        handle: ContinuationHandle,
        status: SuspensionStatus,
    },

    /// A handle was registered twice.
    #[error("continuation handle already registered: {0}")]
    Duplicate(ContinuationHandle),
}

pub type Result<T> = std::result::Result<T, StorageError>;
