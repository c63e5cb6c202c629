use crate::core::ContinuationHandle;
use crate::storage::{DispatchReceipt, StorageError, SuspensionStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why one dispatch attempt did not produce a value.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ActivityError {
    /// The outbound dispatch call failed at the network or HTTP layer.
    #[error("transport error: {0}")]
    Transport(String),

    /// The Callback-Emitting Service reported an explicit failure.
    #[error("{reason}")]
    Business { reason: String, non_retryable: bool },

    /// The dispatch input could not be turned into a request.
    #[error("invalid activity input: {0}")]
    InvalidInput(String),

    /// No heartbeat arrived within the configured window.
    #[error("no heartbeat received within {timeout_ms}ms")]
    HeartbeatTimeout { timeout_ms: u64 },

    /// The attempt was not resolved within its start-to-close window.
    #[error("attempt not resolved within {timeout_ms}ms")]
    StartToCloseTimeout { timeout_ms: u64 },
}

// =============================================================================
// RETRYABLE ERROR TRAIT
// =============================================================================

/// Trait for error types to specify whether they should trigger a retry.
///
/// The supervisor consults this after every failed attempt: a retryable error
/// schedules a new dispatch (with a new token) after the policy's backoff, a
/// non-retryable one ends the workflow immediately.
///
/// # Example
///
/// ```rust
/// use tessera::executor::Retryable;
///
/// #[derive(Debug)]
/// enum QuoteError {
///     UpstreamBusy,
///     UnknownSymbol,
/// }
///
/// impl Retryable for QuoteError {
///     fn is_retryable(&self) -> bool {
///         matches!(self, QuoteError::UpstreamBusy)
///     }
/// }
///
/// assert!(QuoteError::UpstreamBusy.is_retryable());
/// ```
pub trait Retryable {
    /// Returns true if this error is transient and the operation should be retried.
    fn is_retryable(&self) -> bool;
}

impl Retryable for ActivityError {
    fn is_retryable(&self) -> bool {
        match self {
            ActivityError::Transport(_)
            | ActivityError::HeartbeatTimeout { .. }
            | ActivityError::StartToCloseTimeout { .. } => true,
            ActivityError::Business { non_retryable, .. } => !non_retryable,
            ActivityError::InvalidInput(_) => false,
        }
    }
}

/// Result of a single dispatch call.
///
/// Suspension is neither success nor failure: the attempt stays open until the
/// Correlation Resolver applies a terminal disposition or the supervisor gives
/// up on it.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// The service acknowledged the request; resolution arrives out of band.
    Suspended(DispatchReceipt),
    /// The request did not reach the service; try again after backoff.
    Retryable(ActivityError),
    /// The request can never succeed as built.
    Rejected(ActivityError),
}

/// Errors surfaced by the Correlation Resolver.
///
/// The callback ingress logs these and acknowledges the callback anyway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CorrelationError {
    #[error("no outstanding suspension for {0}")]
    NotFound(ContinuationHandle),

    #[error("suspension {handle} already resolved as {status}")]
    AlreadyResolved {
        handle: ContinuationHandle,
        status: SuspensionStatus,
    },

    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
}

impl From<StorageError> for CorrelationError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(handle) => CorrelationError::NotFound(handle),
            StorageError::AlreadyResolved { handle, status } => {
                CorrelationError::AlreadyResolved { handle, status }
            }
            other => CorrelationError::Storage(other),
        }
    }
}

/// Terminal error of a workflow execution.
///
/// This is what the workflow's caller sees. It carries the last failure cause
/// so a caller can tell transport, business and deadline failures apart.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum WorkflowError {
    /// The schedule-to-close deadline passed before a terminal disposition.
    #[error("schedule-to-close deadline exceeded after {attempts} attempt(s){}", last_cause(.last_failure))]
    DeadlineExceeded {
        attempts: u32,
        last_failure: Option<ActivityError>,
    },

    /// The retry policy allowed no further attempts.
    #[error("retries exhausted after {attempts} attempt(s): {last_failure}")]
    RetriesExhausted {
        attempts: u32,
        last_failure: ActivityError,
    },

    /// An attempt failed with an error that must not be retried.
    #[error("activity failed: {0}")]
    NonRetryable(ActivityError),

    /// The workflow was cancelled by its caller.
    #[error("workflow cancelled")]
    Cancelled,

    #[error("no dispatch step registered as '{0}'")]
    ActivityNotRegistered(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("core error: {0}")]
    Core(String),

    /// Recorded history does not match the commands the workflow produces.
    #[error("non-determinism detected: {0}")]
    NonDeterminism(String),
}

impl WorkflowError {
    /// The last activity failure that led to this error, if any.
    pub fn last_failure(&self) -> Option<&ActivityError> {
        match self {
            WorkflowError::DeadlineExceeded { last_failure, .. } => last_failure.as_ref(),
            WorkflowError::RetriesExhausted { last_failure, .. } => Some(last_failure),
            WorkflowError::NonRetryable(e) => Some(e),
            _ => None,
        }
    }
}

fn last_cause(last_failure: &Option<ActivityError>) -> String {
    match last_failure {
        Some(e) => format!(": {e}"),
        None => String::new(),
    }
}

// Manual From implementations to convert nested errors to strings
impl From<StorageError> for WorkflowError {
    fn from(e: StorageError) -> Self {
        WorkflowError::Storage(e.to_string())
    }
}

impl From<crate::core::CoreError> for WorkflowError {
    fn from(e: crate::core::CoreError) -> Self {
        WorkflowError::Core(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_failure_retryability() {
        let retryable = ActivityError::Business {
            reason: "boom".into(),
            non_retryable: false,
        };
        let permanent = ActivityError::Business {
            reason: "boom".into(),
            non_retryable: true,
        };
        assert!(retryable.is_retryable());
        assert!(!permanent.is_retryable());
        assert!(ActivityError::Transport("refused".into()).is_retryable());
        assert!(!ActivityError::InvalidInput("bad".into()).is_retryable());
        assert!(ActivityError::StartToCloseTimeout { timeout_ms: 60_000 }.is_retryable());
    }

    #[test]
    fn test_workflow_error_carries_last_cause() {
        let err = WorkflowError::DeadlineExceeded {
            attempts: 7,
            last_failure: Some(ActivityError::Transport("connection refused".into())),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("7 attempt"));
        assert!(rendered.contains("connection refused"));

        let err = WorkflowError::DeadlineExceeded {
            attempts: 1,
            last_failure: None,
        };
        assert!(err.to_string().ends_with("1 attempt(s)"));
    }
}
