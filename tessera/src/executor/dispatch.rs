//! Dispatch steps.
//!
//! A dispatch step hands one unit of work to the Callback-Emitting Service and
//! reports back how the hand-off went. It never waits for the result of the
//! work itself: the returned [`DispatchOutcome`] says whether the attempt is
//! now suspended, should be retried, or can never succeed.

use super::context::DispatchContext;
use super::error::{ActivityError, DispatchOutcome};
use crate::core::ContinuationToken;
use crate::gateway::{GatewayError, HttpApiClient};
use crate::storage::DispatchReceipt;
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// Name the asynchronous HTTP activity is registered under.
pub const ASYNC_ACTIVITY_NAME: &str = "async-activity";

/// Request sent to the Callback-Emitting Service.
///
/// The workflow supplies everything but `callback_url`, which the dispatch
/// step fills in per attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncActivityInput {
    /// Seconds the service waits before acknowledging the request.
    pub sleep_until_200: u64,
    /// Seconds the service waits after acknowledging before calling back.
    pub sleep_until_callback: u64,
    /// Action the service echoes back in its callback.
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// Value a `complete` callback resolves the activity with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncActivityOutput {
    pub this_is_a_type: String,
    pub and_a_boolean: bool,
}

impl Default for AsyncActivityOutput {
    fn default() -> Self {
        Self {
            this_is_a_type: "type".to_string(),
            and_a_boolean: true,
        }
    }
}

/// A unit of work that completes out of band.
#[async_trait]
pub trait DispatchStep: Send + Sync {
    /// Name the supervisor looks this step up by.
    fn name(&self) -> &str;

    /// Issue the work for one attempt.
    ///
    /// Implementations must only report `Suspended` once the service has
    /// accepted the request carrying `ctx.token()`.
    async fn dispatch(&self, ctx: &DispatchContext, input: &Value) -> DispatchOutcome;
}

/// Dispatches [`AsyncActivityInput`] to `POST /request` over HTTP.
pub struct HttpDispatchStep {
    client: HttpApiClient,
    callback_base: Url,
}

impl HttpDispatchStep {
    /// `callback_base` is the full address of the callback ingress, e.g.
    /// `http://worker:8001/callback`. The token is appended as a query
    /// parameter.
    pub fn new(client: HttpApiClient, callback_base: &str) -> Result<Self, GatewayError> {
        let callback_base = Url::parse(callback_base).map_err(|e| GatewayError::InvalidUrl {
            url: callback_base.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            callback_base,
        })
    }

    /// Callback address for one token.
    pub fn callback_url(&self, token: &ContinuationToken) -> Url {
        let mut url = self.callback_base.clone();
        url.query_pairs_mut().append_pair("token", token.as_str());
        url
    }
}

#[async_trait]
impl DispatchStep for HttpDispatchStep {
    fn name(&self) -> &str {
        ASYNC_ACTIVITY_NAME
    }

    async fn dispatch(&self, ctx: &DispatchContext, input: &Value) -> DispatchOutcome {
        let mut request: AsyncActivityInput = match serde_json::from_value(input.clone()) {
            Ok(request) => request,
            Err(e) => return DispatchOutcome::Rejected(ActivityError::InvalidInput(e.to_string())),
        };
        let callback_url = self.callback_url(ctx.token());
        request.callback_url = Some(callback_url.to_string());

        info!(
            workflow_id = %ctx.workflow_id(),
            handle = %ctx.handle(),
            attempt = ctx.attempt(),
            callback_url = %callback_url,
            "dispatching request"
        );

        match self.client.post_json("request", &request).await {
            Ok(response) => {
                info!(
                    handle = %ctx.handle(),
                    status = response.status,
                    body = %response.body,
                    "request acknowledged, suspending"
                );
                DispatchOutcome::Suspended(DispatchReceipt {
                    status: response.status,
                    body: response.body,
                })
            }
            Err(e) => {
                warn!(handle = %ctx.handle(), attempt = ctx.attempt(), error = %e, "dispatch failed");
                failed_dispatch(e)
            }
        }
    }
}

/// A bad URL fails the same way on every attempt; anything else is transport.
fn failed_dispatch(error: GatewayError) -> DispatchOutcome {
    match error {
        GatewayError::InvalidUrl { .. } => {
            DispatchOutcome::Rejected(ActivityError::InvalidInput(error.to_string()))
        }
        other => DispatchOutcome::Retryable(ActivityError::Transport(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{decode, encode, ContinuationHandle};
    use std::time::Duration;
    use uuid::Uuid;

    fn step(callback: &str) -> HttpDispatchStep {
        let client = HttpApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        HttpDispatchStep::new(client, callback).unwrap()
    }

    #[test]
    fn test_callback_url_carries_token() {
        let step = step("http://localhost:8001/callback");
        let handle = ContinuationHandle::new(Uuid::new_v4(), 3);
        let token = encode(&handle);

        let url = step.callback_url(&token);
        assert_eq!(url.path(), "/callback");
        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "token");
        assert_eq!(decode(&value).unwrap(), handle);
    }

    #[test]
    fn test_callback_url_keeps_existing_query() {
        let step = step("http://localhost:8001/callback?tenant=a");
        let token = encode(&ContinuationHandle::new(Uuid::new_v4(), 1));
        let url = step.callback_url(&token);
        let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(keys, vec!["tenant".to_string(), "token".to_string()]);
    }

    #[tokio::test]
    async fn test_bad_input_is_rejected_without_network() {
        let step = step("http://localhost:8001/callback");
        let handle = ContinuationHandle::new(Uuid::new_v4(), 1);
        let ctx = DispatchContext::new(Uuid::new_v4(), handle, encode(&handle), ASYNC_ACTIVITY_NAME);

        let outcome = step
            .dispatch(&ctx, &serde_json::json!({"sleep_until_200": "soon"}))
            .await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Rejected(ActivityError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let outcome = failed_dispatch(GatewayError::InvalidUrl {
            url: "mailto:ops@example.com/request".into(),
            reason: "relative URL with a cannot-be-a-base base".into(),
        });
        assert!(matches!(
            outcome,
            DispatchOutcome::Rejected(ActivityError::InvalidInput(_))
        ));

        let outcome = failed_dispatch(GatewayError::Status {
            url: "http://127.0.0.1:8000/request".into(),
            status: 503,
            body: String::new(),
        });
        assert!(matches!(
            outcome,
            DispatchOutcome::Retryable(ActivityError::Transport(_))
        ));
    }

    #[test]
    fn test_output_default_payload() {
        assert_eq!(
            serde_json::to_value(AsyncActivityOutput::default()).unwrap(),
            serde_json::json!({"this_is_a_type": "type", "and_a_boolean": true})
        );
    }
}
