//! Correlation resolver.
//!
//! Applies callback dispositions to suspended dispatch attempts. The resolver
//! owns no state of its own: every operation is a single linearized write on
//! the [`SuspensionStore`], so two callbacks racing on one handle cannot both
//! apply a terminal disposition.

use super::error::CorrelationError;
use crate::core::ContinuationHandle;
use crate::storage::{Disposition, Suspension, SuspensionStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

type Result<T> = std::result::Result<T, CorrelationError>;

/// Answer to a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatAck {
    /// The workflow side has asked the activity to stop.
    pub cancel_requested: bool,
}

/// Resolves suspensions by handle.
#[derive(Clone)]
pub struct CorrelationResolver {
    store: Arc<dyn SuspensionStore>,
}

impl CorrelationResolver {
    pub fn new(store: Arc<dyn SuspensionStore>) -> Self {
        Self { store }
    }

    /// Resolve the suspension successfully with `output`.
    pub async fn complete(&self, handle: &ContinuationHandle, output: Value) -> Result<Suspension> {
        self.log_receipt(handle, "complete").await;
        let suspension = self
            .store
            .resolve(handle, Disposition::Completed(output))
            .await
            .inspect_err(|e| warn!(handle = %handle, error = %e, "complete rejected"))?;
        info!(handle = %handle, "activity completed");
        Ok(suspension)
    }

    /// Record liveness without resolving.
    pub async fn heartbeat(
        &self,
        handle: &ContinuationHandle,
        details: Option<Value>,
    ) -> Result<HeartbeatAck> {
        let suspension = self
            .store
            .heartbeat(handle, details)
            .await
            .inspect_err(|e| warn!(handle = %handle, error = %e, "heartbeat rejected"))?;
        debug!(
            handle = %handle,
            heartbeats = suspension.heartbeats(),
            "heartbeat recorded"
        );
        Ok(HeartbeatAck {
            cancel_requested: suspension.cancel_requested(),
        })
    }

    /// Resolve the suspension with a failure whose `reason` becomes the
    /// workflow's failure cause.
    pub async fn fail(
        &self,
        handle: &ContinuationHandle,
        reason: impl Into<String>,
        non_retryable: bool,
    ) -> Result<Suspension> {
        self.log_receipt(handle, "fail").await;
        let reason = reason.into();
        let suspension = self
            .store
            .resolve(
                handle,
                Disposition::Failed {
                    reason: reason.clone(),
                    non_retryable,
                },
            )
            .await
            .inspect_err(|e| warn!(handle = %handle, error = %e, "fail rejected"))?;
        info!(handle = %handle, reason = %reason, non_retryable, "activity failed");
        Ok(suspension)
    }

    /// Acknowledge a cancellation request.
    ///
    /// Terminal only when the workflow side has requested cancellation;
    /// otherwise the details are recorded and the suspension stays open.
    pub async fn report_cancellation(
        &self,
        handle: &ContinuationHandle,
        details: Option<Value>,
    ) -> Result<Suspension> {
        let suspension = self
            .store
            .report_cancellation(handle, details)
            .await
            .inspect_err(|e| warn!(handle = %handle, error = %e, "cancellation report rejected"))?;
        if suspension.is_terminal() {
            info!(handle = %handle, "activity cancelled");
        } else {
            info!(handle = %handle, "cancellation reported before it was requested");
        }
        Ok(suspension)
    }

    /// Logs the dispatch acknowledgement next to the callback it belongs to.
    async fn log_receipt(&self, handle: &ContinuationHandle, action: &str) {
        let Ok(Some(suspension)) = self.store.get(handle).await else {
            return;
        };
        match suspension.receipt() {
            Some(receipt) => info!(
                handle = %handle,
                action,
                dispatch_status = receipt.status,
                dispatch_body = %receipt.body,
                "callback for acknowledged dispatch"
            ),
            None => debug!(handle = %handle, action, "callback arrived before dispatch acknowledgement"),
        }
    }
}
