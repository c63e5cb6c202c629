//! Simulated Callback-Emitting Service.
//!
//! `POST /request` with an [`AsyncActivityInput`]: waits `sleep_until_200`
//! seconds, acknowledges with `{"message": "ok"}`, then in the background waits
//! `sleep_until_callback` seconds and posts
//! `{"action": <action>, "message": ...}` to the request's `callback_url`.
//! Callback delivery failures are logged and dropped.

use crate::executor::AsyncActivityInput;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Body of the callback the service sends once the work is "done".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub action: String,
    pub message: String,
}

impl CallbackPayload {
    pub fn after(action: &str, seconds: u64) -> Self {
        Self {
            action: action.to_string(),
            message: format!("This is the callback response after {seconds} seconds."),
        }
    }
}

#[derive(Clone)]
struct ServiceState {
    client: reqwest::Client,
}

/// Router for the simulated service. `client` delivers callbacks.
pub fn router(client: reqwest::Client) -> Router {
    Router::new()
        .route("/request", post(handle_request))
        .with_state(ServiceState { client })
}

/// Serve the simulated service until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    client: reqwest::Client,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    info!(addr = ?listener.local_addr().ok(), "service listening");
    axum::serve(listener, router(client))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

#[instrument(skip_all)]
async fn handle_request(
    State(state): State<ServiceState>,
    Json(request): Json<AsyncActivityInput>,
) -> Response {
    let Some(callback_url) = request.callback_url.clone() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"message": "callback_url is required"})),
        )
            .into_response();
    };

    info!(
        action = %request.action,
        sleep_until_200 = request.sleep_until_200,
        sleep_until_callback = request.sleep_until_callback,
        "request received"
    );
    tokio::time::sleep(Duration::from_secs(request.sleep_until_200)).await;

    tokio::spawn(deliver_callback(
        state.client,
        callback_url,
        request.action.clone(),
        request.sleep_until_callback,
    ));

    Json(serde_json::json!({"message": "ok"})).into_response()
}

async fn deliver_callback(client: reqwest::Client, url: String, action: String, delay: u64) {
    tokio::time::sleep(Duration::from_secs(delay)).await;
    let payload = CallbackPayload::after(&action, delay);

    match client.post(&url).json(&payload).send().await {
        Ok(response) if response.status().is_success() => {
            info!(status = response.status().as_u16(), action = %action, "callback delivered");
        }
        Ok(response) => {
            warn!(status = response.status().as_u16(), action = %action, "callback rejected");
        }
        Err(e) => warn!(error = %e, action = %action, "callback delivery failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn test_callback_message() {
        assert_eq!(
            CallbackPayload::after("complete", 10).message,
            "This is the callback response after 10 seconds."
        );
    }

    #[tokio::test]
    async fn test_request_without_callback_url_is_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/request")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"sleep_until_200": 0, "sleep_until_callback": 0, "action": "complete"}"#,
            ))
            .unwrap();
        let response = router(reqwest::Client::new())
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
