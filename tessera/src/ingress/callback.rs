//! Callback ingress.
//!
//! `POST /callback?token=<token>` with a JSON body `{"action": ..., ...}`.
//!
//! Only an undecodable token is rejected (400). Every decodable token is
//! acknowledged with 200, whether or not a suspension was found or changed:
//! the Callback-Emitting Service is never told about correlation failures.
//! Those are visible in the logs only.

use crate::core::{serialize_value, ContinuationHandle};
use crate::executor::{AsyncActivityOutput, CorrelationError, CorrelationResolver, Runtime};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Body returned for every accepted callback.
pub const CALLBACK_ACK: &str = "Callback received. Thank you.";

/// Failure reason used when a `fail` callback carries none.
pub const DEFAULT_FAIL_REASON: &str = "Doing a \"fail\" action to this activity.";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackAck {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Complete,
    Heartbeat,
    Fail,
    ReportCancellation,
    /// Anything else; applied as a no-op.
    Unknown(String),
}

impl CallbackAction {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "complete" => CallbackAction::Complete,
            "heartbeat" => CallbackAction::Heartbeat,
            "fail" => CallbackAction::Fail,
            "report_cancellation" => CallbackAction::ReportCancellation,
            other => CallbackAction::Unknown(other.to_string()),
        }
    }
}

/// Action plus the rest of the callback body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(default)]
    pub action: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl CallbackEnvelope {
    /// Parse a callback body. A body that is not a JSON object yields an
    /// envelope with no action.
    pub fn from_body(body: &[u8]) -> Self {
        if body.is_empty() {
            return Self::default();
        }
        serde_json::from_slice(body).unwrap_or_else(|e| {
            warn!(error = %e, "callback body is not a JSON object");
            Self::default()
        })
    }

    pub fn action(&self) -> CallbackAction {
        CallbackAction::parse(&self.action)
    }

    /// Payload as an opaque detail value, `None` when empty.
    fn details(&self) -> Option<Value> {
        if self.payload.is_empty() {
            None
        } else {
            Some(Value::Object(self.payload.clone()))
        }
    }
}

/// What applying a callback did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Applied(CallbackAction),
    Ignored(String),
}

/// Map one callback onto the resolver operation its action names.
pub async fn apply_callback(
    resolver: &CorrelationResolver,
    handle: &ContinuationHandle,
    envelope: &CallbackEnvelope,
) -> Result<CallbackOutcome, CorrelationError> {
    let action = envelope.action();
    match &action {
        CallbackAction::Complete => {
            let output = serialize_value(&AsyncActivityOutput::default()).unwrap_or_else(|e| {
                warn!(error = %e, "failed to serialize activity output");
                Value::Null
            });
            resolver.complete(handle, output).await?;
        }
        CallbackAction::Heartbeat => {
            let ack = resolver.heartbeat(handle, envelope.details()).await?;
            if ack.cancel_requested {
                info!(handle = %handle, "heartbeat received for cancellation-requested activity");
            }
        }
        CallbackAction::Fail => {
            let reason = envelope
                .payload
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_FAIL_REASON);
            let non_retryable = envelope
                .payload
                .get("non_retryable")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            resolver.fail(handle, reason, non_retryable).await?;
        }
        CallbackAction::ReportCancellation => {
            resolver
                .report_cancellation(handle, envelope.details())
                .await?;
        }
        CallbackAction::Unknown(other) => {
            info!(handle = %handle, action = %other, "unknown callback action, doing nothing");
            return Ok(CallbackOutcome::Ignored(other.clone()));
        }
    }
    Ok(CallbackOutcome::Applied(action))
}

#[instrument(skip_all, fields(action = tracing::field::Empty))]
pub(super) async fn receive_callback(
    State(runtime): State<Arc<Runtime>>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Response {
    let handle = match runtime.codec().decode(&query.token) {
        Ok(handle) => handle,
        Err(e) => {
            warn!(error = %e, "rejecting callback with undecodable token");
            return (
                StatusCode::BAD_REQUEST,
                Json(CallbackAck {
                    message: format!("Invalid callback token: {e}"),
                }),
            )
                .into_response();
        }
    };

    let envelope = CallbackEnvelope::from_body(&body);
    tracing::Span::current().record("action", envelope.action.as_str());
    info!(handle = %handle, payload = ?envelope.payload, "callback received");

    if let Err(e) = apply_callback(&runtime.resolver(), &handle, &envelope).await {
        warn!(handle = %handle, error = %e, "callback not applied");
    }

    (
        StatusCode::OK,
        Json(CallbackAck {
            message: CALLBACK_ACK.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_keeps_extra_fields() {
        let envelope = CallbackEnvelope::from_body(
            br#"{"action": "fail", "reason": "boom", "message": "hi"}"#,
        );
        assert_eq!(envelope.action(), CallbackAction::Fail);
        assert_eq!(envelope.payload.get("reason"), Some(&Value::from("boom")));
        assert!(!envelope.payload.contains_key("action"));
    }

    #[test]
    fn test_garbage_body_has_no_action() {
        let envelope = CallbackEnvelope::from_body(b"not json");
        assert_eq!(envelope.action(), CallbackAction::Unknown(String::new()));
        assert!(CallbackEnvelope::from_body(b"").payload.is_empty());
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!(
            CallbackAction::parse("report_cancellation"),
            CallbackAction::ReportCancellation
        );
        assert_eq!(
            CallbackAction::parse("Complete"),
            CallbackAction::Unknown("Complete".into())
        );
    }
}
