//! Per-attempt dispatch context.
//!
//! Everything a dispatch step needs to know about the attempt it is serving
//! travels in a [`DispatchContext`] passed by value into the call. Nothing is
//! stored on the step itself, so one step instance can serve any number of
//! concurrent attempts from different workflows.

use crate::core::{ContinuationHandle, ContinuationToken};
use uuid::Uuid;

/// Context for a single dispatch attempt.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    workflow_id: Uuid,
    handle: ContinuationHandle,
    token: ContinuationToken,
    activity_name: String,
}

impl DispatchContext {
    pub fn new(
        workflow_id: Uuid,
        handle: ContinuationHandle,
        token: ContinuationToken,
        activity_name: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id,
            handle,
            token,
            activity_name: activity_name.into(),
        }
    }

    pub fn workflow_id(&self) -> Uuid {
        self.workflow_id
    }

    /// The suspension this attempt resolves.
    pub fn handle(&self) -> ContinuationHandle {
        self.handle
    }

    /// The token to hand to the Callback-Emitting Service.
    pub fn token(&self) -> &ContinuationToken {
        &self.token
    }

    /// 1-indexed attempt number.
    pub fn attempt(&self) -> u32 {
        self.handle.attempt()
    }

    pub fn activity_name(&self) -> &str {
        &self.activity_name
    }
}
