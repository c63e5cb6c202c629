//! Execution engine for tessera.
//!
//! Module organization following Parnas's information hiding principles:
//! - dispatch: hides how work reaches the Callback-Emitting Service
//! - resolver: hides how callbacks turn into suspension state transitions
//! - supervisor: hides retry, backoff, deadline and cancellation policy
//! - workflow: hides the orchestration decisions and their replay
//! - runtime: hides task spawning and workflow bookkeeping
//!
//! The one seam between orchestration and execution is [`ActivityExecutor`]:
//! workflows only ever ask it to run an activity and get back a value or a
//! [`WorkflowError`]. [`Supervisor`] is the embedded implementation; another
//! durable execution substrate can take its place behind the same trait.

mod context;
mod dispatch;
mod error;
mod resolver;
mod runtime;
mod supervisor;
mod workflow;

pub use context::DispatchContext;
pub use dispatch::{
    AsyncActivityInput, AsyncActivityOutput, DispatchStep, HttpDispatchStep, ASYNC_ACTIVITY_NAME,
};
pub use error::{ActivityError, CorrelationError, DispatchOutcome, Result, Retryable, WorkflowError};
pub use resolver::{CorrelationResolver, HeartbeatAck};
pub use runtime::{Runtime, WorkflowHandle, WorkflowSnapshot, WorkflowStatus};
pub use supervisor::{ActivityExecutor, ActivityOptions, CancellationType, Supervisor};
pub use workflow::{
    CallServiceWorkflow, CallServiceWorkflowInput, CallServiceWorkflowOutput, HistoryEvent,
    WorkflowCommand, WorkflowHistory, WorkflowState, TASK_QUEUE,
};
