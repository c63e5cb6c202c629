//! HTTP surface of the worker.
//!
//! [`router`] serves the callback ingress and the workflow API from the same
//! listener, sharing one [`Runtime`].

mod callback;
mod workflows;

pub use callback::{
    apply_callback, CallbackAck, CallbackAction, CallbackEnvelope, CallbackOutcome,
    CallbackQuery, CALLBACK_ACK, DEFAULT_FAIL_REASON,
};
pub use workflows::{StartWorkflowResponse, WaitQuery, WorkflowView, MAX_WAIT_SECS};

use crate::executor::Runtime;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub fn router(runtime: Arc<Runtime>) -> Router {
    Router::new()
        .route("/callback", post(callback::receive_callback))
        .route("/workflows", post(workflows::start_workflow))
        .route("/workflows/{id}", get(workflows::get_workflow))
        .route("/workflows/{id}/cancel", post(workflows::cancel_workflow))
        .route("/health", get(health_check))
        .with_state(runtime)
}

async fn health_check() -> &'static str {
    "OK"
}

/// Serve the worker's HTTP surface until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    runtime: Arc<Runtime>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    info!(addr = ?listener.local_addr().ok(), "ingress listening");
    axum::serve(listener, router(runtime))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{encode, ContinuationHandle};
    use crate::executor::Supervisor;
    use crate::storage::{InMemorySuspensionStore, OpenSuspensionParams, SuspensionStatus};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn runtime() -> Arc<Runtime> {
        let store = Arc::new(InMemorySuspensionStore::new());
        Arc::new(Runtime::new(Supervisor::new(store)))
    }

    async fn open(runtime: &Runtime) -> ContinuationHandle {
        runtime
            .store()
            .open(OpenSuspensionParams {
                execution_id: Uuid::new_v4(),
                attempt: 1,
                activity_name: "async-activity",
            })
            .await
            .unwrap()
    }

    fn callback(token: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/callback?token={token}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_complete_callback() {
        let runtime = runtime();
        let handle = open(&runtime).await;
        let token = encode(&handle);

        let response = router(runtime.clone())
            .oneshot(callback(token.as_str(), r#"{"action": "complete"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"message": CALLBACK_ACK})
        );

        let s = runtime.store().get(&handle).await.unwrap().unwrap();
        assert_eq!(s.status(), SuspensionStatus::Completed);
    }

    #[tokio::test]
    async fn test_malformed_token_is_rejected() {
        let response = router(runtime())
            .oneshot(callback("not*a*token", r#"{"action": "complete"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let missing = Request::builder()
            .method("POST")
            .uri("/callback")
            .body(Body::from(r#"{"action": "complete"}"#))
            .unwrap();
        let response = router(runtime()).oneshot(missing).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_handle_still_acknowledged() {
        let token = encode(&ContinuationHandle::new(Uuid::new_v4(), 1));
        let response = router(runtime())
            .oneshot(callback(token.as_str(), r#"{"action": "complete"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_action_changes_nothing() {
        let runtime = runtime();
        let handle = open(&runtime).await;
        let before = runtime.store().get(&handle).await.unwrap().unwrap();

        let response = router(runtime.clone())
            .oneshot(callback(
                encode(&handle).as_str(),
                r#"{"action": "dance", "message": "hello"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let after = runtime.store().get(&handle).await.unwrap().unwrap();
        assert_eq!(after.status(), before.status());
        assert_eq!(after.updated_at(), before.updated_at());
        assert_eq!(after.heartbeats(), 0);
    }

    #[tokio::test]
    async fn test_fail_callback_default_reason() {
        let runtime = runtime();
        let handle = open(&runtime).await;

        router(runtime.clone())
            .oneshot(callback(encode(&handle).as_str(), r#"{"action": "fail"}"#))
            .await
            .unwrap();

        let s = runtime.store().get(&handle).await.unwrap().unwrap();
        assert_eq!(
            s.disposition(),
            Some(&crate::storage::Disposition::Failed {
                reason: DEFAULT_FAIL_REASON.to_string(),
                non_retryable: false
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_workflow_is_404() {
        let request = Request::builder()
            .uri(format!("/workflows/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let response = router(runtime()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
