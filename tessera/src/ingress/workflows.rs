//! Workflow API served by the worker.
//!
//! - `POST /workflows` starts a `CallServiceWorkflow`
//! - `GET /workflows/{id}?wait_secs=N` returns its state, waiting up to `N`
//!   seconds for a terminal result
//! - `POST /workflows/{id}/cancel` requests cancellation

use crate::executor::{
    CallServiceWorkflowInput, CallServiceWorkflowOutput, Runtime, WorkflowHandle, WorkflowHistory,
    WorkflowStatus,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Longest a single status request may block.
pub const MAX_WAIT_SECS: u64 = 60;

#[derive(Debug, Serialize, Deserialize)]
pub struct StartWorkflowResponse {
    pub workflow_id: Uuid,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WaitQuery {
    #[serde(default)]
    pub wait_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowView {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<CallServiceWorkflowOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub history: WorkflowHistory,
}

impl WorkflowView {
    fn of(handle: &WorkflowHandle) -> Self {
        let snapshot = handle.snapshot();
        let (output, error) = match snapshot.result {
            Some(Ok(output)) => (Some(output), None),
            Some(Err(e)) => (None, Some(e.to_string())),
            None => (None, None),
        };
        Self {
            workflow_id: handle.id(),
            status: snapshot.status,
            output,
            error,
            history: snapshot.history,
        }
    }
}

pub(super) enum ApiError {
    NotFound(Uuid),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(id) => (StatusCode::NOT_FOUND, format!("Workflow {id} not found")),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub(super) async fn start_workflow(
    State(runtime): State<Arc<Runtime>>,
    Json(input): Json<CallServiceWorkflowInput>,
) -> Json<StartWorkflowResponse> {
    let handle = runtime.start_workflow(input);
    Json(StartWorkflowResponse {
        workflow_id: handle.id(),
    })
}

pub(super) async fn get_workflow(
    State(runtime): State<Arc<Runtime>>,
    Path(workflow_id): Path<Uuid>,
    Query(wait): Query<WaitQuery>,
) -> Result<Json<WorkflowView>, ApiError> {
    let handle = runtime
        .workflow(workflow_id)
        .ok_or(ApiError::NotFound(workflow_id))?;

    if wait.wait_secs > 0 && handle.status() == WorkflowStatus::Running {
        let wait_for = Duration::from_secs(wait.wait_secs.min(MAX_WAIT_SECS));
        // Elapsed just means "still running"; the view says so.
        let _ = tokio::time::timeout(wait_for, handle.result()).await;
    }

    Ok(Json(WorkflowView::of(&handle)))
}

pub(super) async fn cancel_workflow(
    State(runtime): State<Arc<Runtime>>,
    Path(workflow_id): Path<Uuid>,
) -> Result<(StatusCode, Json<WorkflowView>), ApiError> {
    let handle = runtime
        .workflow(workflow_id)
        .ok_or(ApiError::NotFound(workflow_id))?;
    info!(workflow_id = %workflow_id, "cancellation requested");
    handle.cancel();
    Ok((StatusCode::ACCEPTED, Json(WorkflowView::of(&handle))))
}
