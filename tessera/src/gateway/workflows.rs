use super::api::HttpApiClient;
use super::error::{GatewayError, Result};
use crate::executor::{CallServiceWorkflowInput, WorkflowStatus};
use crate::ingress::{StartWorkflowResponse, WaitQuery, WorkflowView, MAX_WAIT_SECS};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Client for the worker's workflow API.
#[derive(Debug, Clone)]
pub struct WorkflowClient {
    api: HttpApiClient,
}

impl WorkflowClient {
    /// Long-poll requests block for up to [`MAX_WAIT_SECS`], so the HTTP
    /// timeout is set above that.
    pub fn new(base_url: &str) -> Result<Self> {
        let timeout = Duration::from_secs(MAX_WAIT_SECS + 10);
        Ok(Self {
            api: HttpApiClient::new(base_url, timeout)?,
        })
    }

    pub async fn start(&self, input: &CallServiceWorkflowInput) -> Result<Uuid> {
        let response = self.api.post_json("workflows", input).await?;
        let started: StartWorkflowResponse = decode(self.api.base_url().as_str(), response.body)?;
        Ok(started.workflow_id)
    }

    pub async fn status(&self, workflow_id: Uuid, wait_secs: u64) -> Result<WorkflowView> {
        let path = format!("workflows/{workflow_id}");
        let response = self.api.get_json(&path, &WaitQuery { wait_secs }).await?;
        decode(&path, response.body)
    }

    /// Poll until the workflow leaves `Running`.
    pub async fn wait(&self, workflow_id: Uuid) -> Result<WorkflowView> {
        loop {
            let view = self.status(workflow_id, MAX_WAIT_SECS).await?;
            if view.status != WorkflowStatus::Running {
                return Ok(view);
            }
            debug!(workflow_id = %workflow_id, "workflow still running");
        }
    }

    pub async fn cancel(&self, workflow_id: Uuid) -> Result<WorkflowView> {
        let path = format!("workflows/{workflow_id}/cancel");
        let response = self.api.post_json(&path, &serde_json::json!({})).await?;
        decode(&path, response.body)
    }
}

fn decode<T: serde::de::DeserializeOwned>(url: &str, body: serde_json::Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| GatewayError::InvalidResponse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
