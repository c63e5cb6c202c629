use super::error::{Result, WorkflowError};
use super::resolver::CorrelationResolver;
use super::supervisor::{ActivityOptions, Supervisor};
use super::workflow::{
    CallServiceWorkflow, CallServiceWorkflowInput, CallServiceWorkflowOutput, WorkflowHistory,
};
use crate::core::TokenCodec;
use crate::storage::SuspensionStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Succeeded,
    Failed,
}

/// Point-in-time view of one workflow execution.
#[derive(Debug, Clone)]
pub struct WorkflowSnapshot {
    pub status: WorkflowStatus,
    /// Set once the workflow reaches a terminal state.
    pub result: Option<Result<CallServiceWorkflowOutput>>,
    pub history: WorkflowHistory,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowSnapshot {
    fn running() -> Self {
        Self {
            status: WorkflowStatus::Running,
            result: None,
            history: WorkflowHistory::new(),
            finished_at: None,
        }
    }
}

/// Handle to a running or finished workflow execution.
#[derive(Debug, Clone)]
pub struct WorkflowHandle {
    id: Uuid,
    snapshot: watch::Receiver<WorkflowSnapshot>,
    cancel: CancellationToken,
}

impl WorkflowHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn status(&self) -> WorkflowStatus {
        self.snapshot.borrow().status
    }

    /// Wait for the workflow's terminal result.
    pub async fn result(&self) -> Result<CallServiceWorkflowOutput> {
        let mut snapshot = self.snapshot.clone();
        let finished = snapshot
            .wait_for(|s| s.result.is_some())
            .await
            .map_err(|_| WorkflowError::Core("workflow task ended without a result".to_string()))?;
        match &finished.result {
            Some(result) => result.clone(),
            None => Err(WorkflowError::Core("workflow result missing".to_string())),
        }
    }

    /// Request cancellation. The workflow finishes with
    /// [`WorkflowError::Cancelled`] unless it already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Embedded durable execution service: hosts workflow executions and the
/// supervisor they schedule activities on.
pub struct Runtime {
    supervisor: Arc<Supervisor>,
    workflows: DashMap<Uuid, WorkflowHandle>,
    activity_options: ActivityOptions,
}

impl Runtime {
    pub fn new(supervisor: Supervisor) -> Self {
        Self {
            supervisor: Arc::new(supervisor),
            workflows: DashMap::new(),
            activity_options: CallServiceWorkflow::activity_options(),
        }
    }

    /// Override the options workflows schedule their activity with.
    pub fn with_activity_options(mut self, options: ActivityOptions) -> Self {
        self.activity_options = options;
        self
    }

    pub fn store(&self) -> &Arc<dyn SuspensionStore> {
        self.supervisor.store()
    }

    pub fn codec(&self) -> &Arc<dyn TokenCodec> {
        self.supervisor.codec()
    }

    /// Resolver over this runtime's suspension store.
    pub fn resolver(&self) -> CorrelationResolver {
        CorrelationResolver::new(self.store().clone())
    }

    /// Start a `CallServiceWorkflow` in the background.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_workflow(&self, input: CallServiceWorkflowInput) -> WorkflowHandle {
        let id = Uuid::new_v4();
        let (tx, rx) = watch::channel(WorkflowSnapshot::running());
        let cancel = CancellationToken::new();
        let handle = WorkflowHandle {
            id,
            snapshot: rx,
            cancel: cancel.clone(),
        };
        self.workflows.insert(id, handle.clone());

        let supervisor = self.supervisor.clone();
        let options = self.activity_options.clone();
        let span = tracing::info_span!("workflow", workflow_id = %id);
        tokio::spawn(
            async move {
                let mut workflow = CallServiceWorkflow::new();
                let result = workflow
                    .run(supervisor.as_ref(), id, input, &options, cancel)
                    .await;
                let status = match result {
                    Ok(_) => WorkflowStatus::Succeeded,
                    Err(_) => WorkflowStatus::Failed,
                };
                tx.send_replace(WorkflowSnapshot {
                    status,
                    result: Some(result),
                    history: workflow.history().clone(),
                    finished_at: Some(Utc::now()),
                });
            }
            .instrument(span),
        );

        info!(workflow_id = %id, "workflow scheduled");
        handle
    }

    pub fn workflow(&self, id: Uuid) -> Option<WorkflowHandle> {
        self.workflows.get(&id).map(|entry| entry.value().clone())
    }

    /// Drop workflows that finished before `before` from the registry.
    /// Returns how many were removed.
    pub fn forget_finished(&self, before: DateTime<Utc>) -> usize {
        let initial = self.workflows.len();
        self.workflows.retain(|_, handle| {
            !matches!(handle.snapshot.borrow().finished_at, Some(at) if at < before)
        });
        initial.saturating_sub(self.workflows.len())
    }
}
