//! The orchestrating workflow.
//!
//! `CallServiceWorkflow` sequences exactly one asynchronous activity:
//!
//! ```text
//! Started ──► DispatchPending ──┬──► Succeeded
//!                               └──► Failed
//! ```
//!
//! Decisions are a pure function of the recorded [`WorkflowHistory`]: the
//! workflow never reads the clock, generates ids or performs I/O itself. All
//! side effects go through the [`ActivityExecutor`] and come back as history
//! events, so [`CallServiceWorkflow::replay`] reconstructs identical state and
//! commands from a recorded history.

use super::dispatch::{AsyncActivityInput, AsyncActivityOutput, ASYNC_ACTIVITY_NAME};
use super::error::{Result, WorkflowError};
use super::supervisor::{ActivityExecutor, ActivityOptions};
use crate::core::{deserialize_value, serialize_value};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Task queue label workflows and activities are registered on.
pub const TASK_QUEUE: &str = "task-queue";

/// Caller-supplied parameters of one workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallServiceWorkflowInput {
    pub sleep_until_200: u64,
    pub sleep_until_callback: u64,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallServiceWorkflowOutput {
    pub activity_output: AsyncActivityOutput,
}

/// One recorded fact about a workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HistoryEvent {
    WorkflowStarted { input: CallServiceWorkflowInput },
    ActivityScheduled { activity: String, input: Value },
    ActivityCompleted { result: Value },
    ActivityFailed { error: WorkflowError },
}

/// Ordered event log of one workflow execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowHistory {
    events: Vec<HistoryEvent>,
}

impl WorkflowHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[HistoryEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn push(&mut self, event: HistoryEvent) {
        self.events.push(event);
    }
}

impl From<Vec<HistoryEvent>> for WorkflowHistory {
    fn from(events: Vec<HistoryEvent>) -> Self {
        Self { events }
    }
}

/// A decision the workflow hands to its driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkflowCommand {
    ScheduleActivity { activity: String, input: Value },
    CompleteWorkflow(CallServiceWorkflowOutput),
    FailWorkflow(WorkflowError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkflowState {
    Started,
    DispatchPending,
    Succeeded(CallServiceWorkflowOutput),
    Failed(WorkflowError),
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Succeeded(_) | WorkflowState::Failed(_))
    }
}

/// Calls the Callback-Emitting Service once and returns what it called back with.
#[derive(Debug, Clone)]
pub struct CallServiceWorkflow {
    state: WorkflowState,
    history: WorkflowHistory,
    commands: Vec<WorkflowCommand>,
}

impl Default for CallServiceWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl CallServiceWorkflow {
    pub fn new() -> Self {
        Self {
            state: WorkflowState::Started,
            history: WorkflowHistory::new(),
            commands: Vec::new(),
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn history(&self) -> &WorkflowHistory {
        &self.history
    }

    /// Every command issued so far, in order.
    pub fn commands(&self) -> &[WorkflowCommand] {
        &self.commands
    }

    /// Options the activity is scheduled with.
    pub fn activity_options() -> ActivityOptions {
        ActivityOptions::default()
    }

    /// Build the activity request from the caller's input.
    pub fn start(&mut self, input: CallServiceWorkflowInput) -> Result<WorkflowCommand> {
        if self.state != WorkflowState::Started {
            return Err(WorkflowError::NonDeterminism(
                "workflow started twice".to_string(),
            ));
        }

        let request = AsyncActivityInput {
            sleep_until_200: input.sleep_until_200,
            sleep_until_callback: input.sleep_until_callback,
            action: input.action.clone(),
            callback_url: None,
        };
        let request = serialize_value(&request)?;

        self.history.push(HistoryEvent::WorkflowStarted { input });
        self.history.push(HistoryEvent::ActivityScheduled {
            activity: ASYNC_ACTIVITY_NAME.to_string(),
            input: request.clone(),
        });
        self.state = WorkflowState::DispatchPending;

        Ok(self.issue(WorkflowCommand::ScheduleActivity {
            activity: ASYNC_ACTIVITY_NAME.to_string(),
            input: request,
        }))
    }

    /// Apply the activity's terminal result.
    pub fn on_activity_result(
        &mut self,
        result: std::result::Result<Value, WorkflowError>,
    ) -> Result<WorkflowCommand> {
        if self.state != WorkflowState::DispatchPending {
            return Err(WorkflowError::NonDeterminism(format!(
                "activity result delivered in state {:?}",
                self.state
            )));
        }

        let decided = match result {
            Ok(value) => {
                self.history.push(HistoryEvent::ActivityCompleted {
                    result: value.clone(),
                });
                deserialize_value::<AsyncActivityOutput>(value)
                    .map(|activity_output| CallServiceWorkflowOutput { activity_output })
                    .map_err(WorkflowError::from)
            }
            Err(error) => {
                self.history.push(HistoryEvent::ActivityFailed {
                    error: error.clone(),
                });
                Err(error)
            }
        };

        let command = match decided {
            Ok(output) => {
                self.state = WorkflowState::Succeeded(output.clone());
                WorkflowCommand::CompleteWorkflow(output)
            }
            Err(error) => {
                self.state = WorkflowState::Failed(error.clone());
                WorkflowCommand::FailWorkflow(error)
            }
        };
        Ok(self.issue(command))
    }

    /// Rebuild a workflow from recorded history.
    ///
    /// Fails with [`WorkflowError::NonDeterminism`] if any recorded event
    /// differs from what the workflow produces at that position. A history
    /// that stops while the activity is outstanding replays to
    /// `DispatchPending`.
    pub fn replay(history: &WorkflowHistory) -> Result<Self> {
        let events = history.events();
        let Some(HistoryEvent::WorkflowStarted { input }) = events.first() else {
            return Err(WorkflowError::NonDeterminism(
                "history must begin with WorkflowStarted".to_string(),
            ));
        };

        let mut workflow = Self::new();
        workflow.start(input.clone())?;

        for (position, recorded) in events.iter().enumerate().skip(1) {
            match recorded {
                HistoryEvent::ActivityCompleted { result } => {
                    workflow.on_activity_result(Ok(result.clone()))?;
                }
                HistoryEvent::ActivityFailed { error } => {
                    workflow.on_activity_result(Err(error.clone()))?;
                }
                _ => {}
            }

            let produced = workflow.history.events().get(position);
            if produced != Some(recorded) {
                return Err(WorkflowError::NonDeterminism(format!(
                    "event {position}: history has {recorded:?}, workflow produced {produced:?}"
                )));
            }
        }

        Ok(workflow)
    }

    /// Drive the workflow to completion against an executor.
    pub async fn run<E>(
        &mut self,
        executor: &E,
        workflow_id: Uuid,
        input: CallServiceWorkflowInput,
        options: &ActivityOptions,
        cancel: CancellationToken,
    ) -> Result<CallServiceWorkflowOutput>
    where
        E: ActivityExecutor + ?Sized,
    {
        info!(workflow_id = %workflow_id, task_queue = TASK_QUEUE, "workflow started");
        let mut command = self.start(input)?;

        loop {
            command = match command {
                WorkflowCommand::ScheduleActivity { activity, input } => {
                    let result = executor
                        .execute_activity(workflow_id, &activity, input, options, cancel.clone())
                        .await;
                    self.on_activity_result(result)?
                }
                WorkflowCommand::CompleteWorkflow(output) => {
                    info!(workflow_id = %workflow_id, "workflow succeeded");
                    return Ok(output);
                }
                WorkflowCommand::FailWorkflow(error) => {
                    warn!(workflow_id = %workflow_id, error = %error, "workflow failed");
                    return Err(error);
                }
            };
        }
    }

    fn issue(&mut self, command: WorkflowCommand) -> WorkflowCommand {
        self.commands.push(command.clone());
        command
    }
}
