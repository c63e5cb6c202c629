//! Retry/timeout supervisor.
//!
//! The supervisor is the embedded stand-in for a durable execution service. For
//! each activity it:
//!
//! 1. opens a fresh suspension and mints its token,
//! 2. runs the dispatch step,
//! 3. on suspension, waits (without holding a thread) for a terminal
//!    disposition, the attempt's start-to-close timeout, the schedule-to-close
//!    deadline, a heartbeat timeout or workflow cancellation,
//! 4. on a retryable failure, backs off per the [`RetryPolicy`] and starts
//!    over with a new suspension.
//!
//! A start-to-close timeout fails only the current attempt. Attempts stop at
//! whichever bound is reached first: the policy's attempt limit or the
//! schedule-to-close deadline, when one is set. A backoff that would end past
//! that deadline is not slept; the run fails with
//! [`WorkflowError::DeadlineExceeded`] right away.

use super::context::DispatchContext;
use super::dispatch::DispatchStep;
use super::error::{ActivityError, DispatchOutcome, Result, Retryable, WorkflowError};
use crate::core::{Base64UrlCodec, ContinuationHandle, RetryPolicy, TokenCodec};
use crate::storage::{Disposition, OpenSuspensionParams, StorageError, SuspensionStore};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// What happens to a suspended attempt when its workflow is cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CancellationType {
    /// Flag the suspension and give up on it immediately.
    #[default]
    TryCancel,
    /// Flag the suspension and wait for the service to report cancellation
    /// (or for any other terminal disposition).
    WaitCancellationCompleted,
}

/// Per-activity scheduling options.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOptions {
    pub retry_policy: RetryPolicy,
    /// Bound on one attempt, from dispatch until its callback resolves it.
    pub start_to_close: Duration,
    /// Bound on total time across all attempts. `None` leaves the run bounded
    /// by the retry policy alone.
    pub schedule_to_close: Option<Duration>,
    /// Maximum gap between heartbeats while suspended. `None` disables the check.
    pub heartbeat_timeout: Option<Duration>,
    pub cancellation: CancellationType,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::ASYNC_DISPATCH,
            start_to_close: Duration::from_secs(60),
            schedule_to_close: None,
            heartbeat_timeout: None,
            cancellation: CancellationType::TryCancel,
        }
    }
}

/// Runs activities on behalf of workflows.
///
/// Workflows depend on this trait rather than on [`Supervisor`] so their
/// decision logic can be driven by a scripted executor in tests.
#[async_trait]
pub trait ActivityExecutor: Send + Sync {
    async fn execute_activity(
        &self,
        workflow_id: Uuid,
        activity: &str,
        input: Value,
        options: &ActivityOptions,
        cancel: CancellationToken,
    ) -> Result<Value>;
}

/// Bounds shared by every attempt of one activity execution.
struct AttemptScope<'a> {
    workflow_id: Uuid,
    input: &'a Value,
    options: &'a ActivityOptions,
    deadline: Option<Instant>,
    cancel: &'a CancellationToken,
}

/// How one attempt ended.
enum Attempt {
    Completed(Value),
    Failed(ActivityError),
    Cancelled,
    DeadlineReached,
}

/// Supervises dispatch steps against a suspension store.
pub struct Supervisor {
    store: Arc<dyn SuspensionStore>,
    codec: Arc<dyn TokenCodec>,
    steps: HashMap<String, Arc<dyn DispatchStep>>,
}

impl Supervisor {
    pub fn new(store: Arc<dyn SuspensionStore>) -> Self {
        Self::with_codec(store, Arc::new(Base64UrlCodec))
    }

    pub fn with_codec(store: Arc<dyn SuspensionStore>, codec: Arc<dyn TokenCodec>) -> Self {
        Self {
            store,
            codec,
            steps: HashMap::new(),
        }
    }

    /// Register a dispatch step under its [`DispatchStep::name`].
    pub fn register(&mut self, step: Arc<dyn DispatchStep>) -> &mut Self {
        self.steps.insert(step.name().to_string(), step);
        self
    }

    pub fn store(&self) -> &Arc<dyn SuspensionStore> {
        &self.store
    }

    pub fn codec(&self) -> &Arc<dyn TokenCodec> {
        &self.codec
    }

    async fn run_attempt(
        &self,
        step: &dyn DispatchStep,
        attempt: u32,
        scope: &AttemptScope<'_>,
    ) -> Result<Attempt> {
        let AttemptScope {
            workflow_id,
            input,
            options,
            deadline,
            cancel,
        } = *scope;
        let handle = self
            .store
            .open(OpenSuspensionParams {
                execution_id: workflow_id,
                attempt,
                activity_name: step.name(),
            })
            .await?;
        let mut updates = self.store.subscribe(&handle).await?;
        let ctx = DispatchContext::new(workflow_id, handle, self.codec.encode(&handle), step.name());

        // One timer covers both bounds; `run_bound` records which one it is.
        let attempt_deadline = Instant::now() + options.start_to_close;
        let (expires_at, run_bound) = match deadline {
            Some(deadline) if deadline <= attempt_deadline => (deadline, true),
            _ => (attempt_deadline, false),
        };
        let expired = || {
            if run_bound {
                Attempt::DeadlineReached
            } else {
                Attempt::Failed(ActivityError::StartToCloseTimeout {
                    timeout_ms: options.start_to_close.as_millis() as u64,
                })
            }
        };

        // A callback may resolve the handle before the dispatch call returns,
        // so every abandon below defers to a disposition that is already set.
        let outcome = tokio::select! {
            outcome = step.dispatch(&ctx, input) => outcome,
            _ = sleep_until(expires_at) => {
                warn!(handle = %handle, run_bound, "timed out while dispatching");
                return Ok(match self.abandon(&handle, Disposition::TimedOut).await? {
                    Some(settled) => settled_attempt(settled),
                    None => expired(),
                });
            }
            _ = cancel.cancelled() => {
                return Ok(match self.abandon(&handle, Disposition::Cancelled(None)).await? {
                    Some(settled) => settled_attempt(settled),
                    None => Attempt::Cancelled,
                });
            }
        };

        match outcome {
            DispatchOutcome::Suspended(receipt) => {
                self.store.mark_suspended(&handle, receipt).await?;
                debug!(handle = %handle, "attempt suspended");
            }
            DispatchOutcome::Retryable(error) | DispatchOutcome::Rejected(error) => {
                let disposition = Disposition::Failed {
                    reason: error.to_string(),
                    non_retryable: !error.is_retryable(),
                };
                if let Some(settled) = self.abandon(&handle, disposition).await? {
                    return Ok(settled_attempt(settled));
                }
                return Ok(Attempt::Failed(error));
            }
        }

        let mut seen_heartbeats = 0;
        let mut heartbeat_deadline = options.heartbeat_timeout.map(|t| Instant::now() + t);
        let mut cancel_sent = false;

        loop {
            let current = updates.borrow_and_update().clone();
            if let Some(disposition) = current.disposition() {
                return Ok(settled_attempt(disposition.clone()));
            }
            if current.heartbeats() != seen_heartbeats {
                seen_heartbeats = current.heartbeats();
                heartbeat_deadline = options.heartbeat_timeout.map(|t| Instant::now() + t);
            }

            let heartbeat_expired = async {
                match heartbeat_deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        return Err(StorageError::NotFound(handle).into());
                    }
                }
                _ = sleep_until(expires_at) => {
                    warn!(handle = %handle, run_bound, "timed out while suspended");
                    return Ok(match self.abandon(&handle, Disposition::TimedOut).await? {
                        Some(settled) => settled_attempt(settled),
                        None => expired(),
                    });
                }
                _ = heartbeat_expired => {
                    let timeout = options.heartbeat_timeout.unwrap_or_default();
                    warn!(handle = %handle, timeout_ms = timeout.as_millis() as u64, "heartbeat timeout");
                    return Ok(match self.abandon(&handle, Disposition::TimedOut).await? {
                        Some(settled) => settled_attempt(settled),
                        None => Attempt::Failed(ActivityError::HeartbeatTimeout {
                            timeout_ms: timeout.as_millis() as u64,
                        }),
                    });
                }
                _ = cancel.cancelled(), if !cancel_sent => {
                    cancel_sent = true;
                    info!(handle = %handle, cancellation = ?options.cancellation, "requesting cancellation");
                    match self.store.request_cancellation(&handle).await {
                        Ok(_) => {}
                        Err(StorageError::AlreadyResolved { .. }) => continue,
                        Err(e) => return Err(e.into()),
                    }
                    if options.cancellation == CancellationType::TryCancel {
                        return Ok(Attempt::Cancelled);
                    }
                }
            }
        }
    }

    /// Resolve a suspension the supervisor is giving up on.
    ///
    /// Returns the disposition a callback already applied if it won the race.
    async fn abandon(
        &self,
        handle: &ContinuationHandle,
        disposition: Disposition,
    ) -> Result<Option<Disposition>> {
        match self.store.resolve(handle, disposition).await {
            Ok(_) => Ok(None),
            Err(StorageError::AlreadyResolved { .. }) => Ok(self
                .store
                .get(handle)
                .await?
                .and_then(|s| s.disposition().cloned())),
            Err(e) => Err(e.into()),
        }
    }
}

fn settled_attempt(disposition: Disposition) -> Attempt {
    match disposition {
        Disposition::Completed(value) => Attempt::Completed(value),
        Disposition::Failed {
            reason,
            non_retryable,
        } => Attempt::Failed(ActivityError::Business {
            reason,
            non_retryable,
        }),
        Disposition::Cancelled(_) => Attempt::Cancelled,
        Disposition::TimedOut => Attempt::DeadlineReached,
    }
}

#[async_trait]
impl ActivityExecutor for Supervisor {
    #[instrument(skip_all, fields(workflow_id = %workflow_id, activity = %activity))]
    async fn execute_activity(
        &self,
        workflow_id: Uuid,
        activity: &str,
        input: Value,
        options: &ActivityOptions,
        cancel: CancellationToken,
    ) -> Result<Value> {
        let step = self
            .steps
            .get(activity)
            .cloned()
            .ok_or_else(|| WorkflowError::ActivityNotRegistered(activity.to_string()))?;

        let deadline = options.schedule_to_close.map(|bound| Instant::now() + bound);
        let scope = AttemptScope {
            workflow_id,
            input: &input,
            options,
            deadline,
            cancel: &cancel,
        };
        let mut last_failure: Option<ActivityError> = None;
        let mut attempt = 0;

        loop {
            attempt += 1;
            info!(attempt, "starting attempt");

            let failure = match self.run_attempt(step.as_ref(), attempt, &scope).await?
            {
                Attempt::Completed(value) => {
                    info!(attempt, "activity completed");
                    return Ok(value);
                }
                Attempt::Cancelled => return Err(WorkflowError::Cancelled),
                Attempt::DeadlineReached => {
                    return Err(WorkflowError::DeadlineExceeded {
                        attempts: attempt,
                        last_failure,
                    })
                }
                Attempt::Failed(failure) => failure,
            };

            if !failure.is_retryable() {
                warn!(attempt, error = %failure, "non-retryable failure");
                return Err(WorkflowError::NonRetryable(failure));
            }

            let Some(delay) = options.retry_policy.delay_for_attempt(attempt) else {
                warn!(attempt, error = %failure, "retries exhausted");
                return Err(WorkflowError::RetriesExhausted {
                    attempts: attempt,
                    last_failure: failure,
                });
            };

            if deadline.is_some_and(|deadline| Instant::now() + delay >= deadline) {
                warn!(attempt, error = %failure, "next attempt would start past the deadline");
                return Err(WorkflowError::DeadlineExceeded {
                    attempts: attempt,
                    last_failure: Some(failure),
                });
            }

            info!(attempt, delay_ms = delay.as_millis() as u64, error = %failure, "retrying after backoff");
            last_failure = Some(failure);

            tokio::select! {
                _ = sleep(delay) => {}
                _ = cancel.cancelled() => return Err(WorkflowError::Cancelled),
            }
        }
    }
}
