use crate::core::ContinuationHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle state of one suspension.
///
/// ```text
/// Dispatching ──► Suspended ──┬──► Completed
///      │                      ├──► Failed
///      └──────────────────────┼──► Cancelled
///                             └──► TimedOut
/// ```
///
/// Callbacks are accepted in both non-terminal states: a fast service may call
/// back before its acknowledgement has reached the dispatch step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuspensionStatus {
    /// Handle minted, dispatch request in flight.
    Dispatching,
    /// Dispatch acknowledged, waiting for a callback.
    Suspended,
    Completed,
    Failed,
    Cancelled,
    /// The supervisor gave up on this attempt (timeout, deadline or heartbeat timeout).
    TimedOut,
}

impl SuspensionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuspensionStatus::Dispatching => "DISPATCHING",
            SuspensionStatus::Suspended => "SUSPENDED",
            SuspensionStatus::Completed => "COMPLETED",
            SuspensionStatus::Failed => "FAILED",
            SuspensionStatus::Cancelled => "CANCELLED",
            SuspensionStatus::TimedOut => "TIMED_OUT",
        }
    }

    /// Whether this is a terminal state (no further transitions).
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            SuspensionStatus::Dispatching | SuspensionStatus::Suspended
        )
    }
}

impl fmt::Display for SuspensionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgement metadata returned by the Callback-Emitting Service.
///
/// Diagnostic only: it is attached to the suspension so the resolver can log
/// it next to the callback payload, and never drives control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub status: u16,
    pub body: Value,
}

/// A terminal write applied to a suspension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Disposition {
    Completed(Value),
    Failed { reason: String, non_retryable: bool },
    Cancelled(Option<Value>),
    TimedOut,
}

impl Disposition {
    /// The status a suspension takes once this disposition is applied.
    pub fn status(&self) -> SuspensionStatus {
        match self {
            Disposition::Completed(_) => SuspensionStatus::Completed,
            Disposition::Failed { .. } => SuspensionStatus::Failed,
            Disposition::Cancelled(_) => SuspensionStatus::Cancelled,
            Disposition::TimedOut => SuspensionStatus::TimedOut,
        }
    }
}

/// State of one outstanding (or recently resolved) dispatch attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suspension {
    handle: ContinuationHandle,
    activity_name: String,
    status: SuspensionStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    receipt: Option<DispatchReceipt>,
    heartbeats: u32,
    last_heartbeat_at: Option<DateTime<Utc>>,
    heartbeat_details: Option<Value>,
    cancel_requested: bool,
    cancellation_details: Option<Value>,
    disposition: Option<Disposition>,
}

impl Suspension {
    pub fn new(handle: ContinuationHandle, activity_name: String) -> Self {
        let now = Utc::now();
        Self {
            handle,
            activity_name,
            status: SuspensionStatus::Dispatching,
            created_at: now,
            updated_at: now,
            receipt: None,
            heartbeats: 0,
            last_heartbeat_at: None,
            heartbeat_details: None,
            cancel_requested: false,
            cancellation_details: None,
            disposition: None,
        }
    }

    pub fn handle(&self) -> ContinuationHandle {
        self.handle
    }

    pub fn activity_name(&self) -> &str {
        &self.activity_name
    }

    pub fn status(&self) -> SuspensionStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn receipt(&self) -> Option<&DispatchReceipt> {
        self.receipt.as_ref()
    }

    /// Number of heartbeats recorded so far.
    pub fn heartbeats(&self) -> u32 {
        self.heartbeats
    }

    pub fn last_heartbeat_at(&self) -> Option<DateTime<Utc>> {
        self.last_heartbeat_at
    }

    pub fn heartbeat_details(&self) -> Option<&Value> {
        self.heartbeat_details.as_ref()
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    pub fn cancellation_details(&self) -> Option<&Value> {
        self.cancellation_details.as_ref()
    }

    /// The terminal disposition, once one has been applied.
    pub fn disposition(&self) -> Option<&Disposition> {
        self.disposition.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub(crate) fn attach_receipt(&mut self, receipt: DispatchReceipt) {
        self.receipt = Some(receipt);
        if self.status == SuspensionStatus::Dispatching {
            self.status = SuspensionStatus::Suspended;
        }
        self.touch();
    }

    pub(crate) fn record_heartbeat(&mut self, details: Option<Value>) {
        self.heartbeats = self.heartbeats.saturating_add(1);
        self.last_heartbeat_at = Some(Utc::now());
        if details.is_some() {
            self.heartbeat_details = details;
        }
        self.touch();
    }

    pub(crate) fn request_cancellation(&mut self) {
        self.cancel_requested = true;
        self.touch();
    }

    pub(crate) fn record_cancellation_report(&mut self, details: Option<Value>) {
        self.cancellation_details = details;
        self.touch();
    }

    pub(crate) fn apply(&mut self, disposition: Disposition) {
        self.status = disposition.status();
        self.disposition = Some(disposition);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn suspension() -> Suspension {
        Suspension::new(
            ContinuationHandle::new(Uuid::new_v4(), 1),
            "async-activity".to_string(),
        )
    }

    #[test]
    fn test_receipt_moves_dispatching_to_suspended() {
        let mut s = suspension();
        assert_eq!(s.status(), SuspensionStatus::Dispatching);

        s.attach_receipt(DispatchReceipt {
            status: 200,
            body: serde_json::json!({"message": "ok"}),
        });
        assert_eq!(s.status(), SuspensionStatus::Suspended);
        assert_eq!(s.receipt().unwrap().status, 200);
    }

    #[test]
    fn test_receipt_after_resolution_keeps_terminal_status() {
        let mut s = suspension();
        s.apply(Disposition::Completed(Value::Null));
        s.attach_receipt(DispatchReceipt {
            status: 200,
            body: Value::Null,
        });
        assert_eq!(s.status(), SuspensionStatus::Completed);
        assert!(s.receipt().is_some());
    }

    #[test]
    fn test_heartbeat_keeps_latest_details() {
        let mut s = suspension();
        s.record_heartbeat(Some(serde_json::json!("first")));
        s.record_heartbeat(None);
        assert_eq!(s.heartbeats(), 2);
        assert_eq!(s.heartbeat_details(), Some(&serde_json::json!("first")));
        assert!(!s.is_terminal());
    }

    #[test]
    fn test_disposition_status() {
        assert_eq!(
            Disposition::Failed {
                reason: "boom".into(),
                non_retryable: false
            }
            .status(),
            SuspensionStatus::Failed
        );
        assert!(SuspensionStatus::TimedOut.is_terminal());
        assert!(!SuspensionStatus::Suspended.is_terminal());
    }
}
