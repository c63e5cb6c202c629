use super::{
    error::Result, error::StorageError, params::OpenSuspensionParams, DispatchReceipt,
    Disposition, Suspension, SuspensionStore,
};
use crate::core::ContinuationHandle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::watch;

/// In-memory suspension store using DashMap for concurrent access.
///
/// Each suspension lives in a `watch` channel: writers mutate the value under
/// the channel's lock, which linearizes every operation on one handle, and the
/// supervisor awaits changes on a receiver without holding a thread.
///
/// Suitable for a single worker process. State does not survive a restart.
pub struct InMemorySuspensionStore {
    suspensions: DashMap<ContinuationHandle, watch::Sender<Suspension>>,
}

impl InMemorySuspensionStore {
    pub fn new() -> Self {
        Self {
            suspensions: DashMap::new(),
        }
    }

    /// Number of records held, resolved ones included.
    pub fn len(&self) -> usize {
        self.suspensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suspensions.is_empty()
    }

    /// Runs `update` on a non-terminal suspension and publishes the result.
    ///
    /// `update` returns whether it changed the record.
    fn update_open<F>(&self, handle: &ContinuationHandle, update: F) -> Result<Suspension>
    where
        F: FnOnce(&mut Suspension) -> bool,
    {
        let sender = self
            .suspensions
            .get(handle)
            .ok_or(StorageError::NotFound(*handle))?;

        let mut outcome = Err(StorageError::NotFound(*handle));
        sender.send_if_modified(|suspension| {
            if suspension.is_terminal() {
                outcome = Err(StorageError::AlreadyResolved {
                    handle: *handle,
                    status: suspension.status(),
                });
                return false;
            }
            let modified = update(suspension);
            outcome = Ok(suspension.clone());
            modified
        });
        outcome
    }
}

impl Default for InMemorySuspensionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SuspensionStore for InMemorySuspensionStore {
    async fn open(&self, params: OpenSuspensionParams<'_>) -> Result<ContinuationHandle> {
        let OpenSuspensionParams {
            execution_id,
            attempt,
            activity_name,
        } = params;

        let handle = ContinuationHandle::new(execution_id, attempt);
        match self.suspensions.entry(handle) {
            Entry::Occupied(_) => Err(StorageError::Duplicate(handle)),
            Entry::Vacant(vacant) => {
                let (sender, _) =
                    watch::channel(Suspension::new(handle, activity_name.to_string()));
                vacant.insert(sender);
                Ok(handle)
            }
        }
    }

    async fn get(&self, handle: &ContinuationHandle) -> Result<Option<Suspension>> {
        Ok(self
            .suspensions
            .get(handle)
            .map(|sender| sender.borrow().clone()))
    }

    async fn mark_suspended(
        &self,
        handle: &ContinuationHandle,
        receipt: DispatchReceipt,
    ) -> Result<Suspension> {
        let sender = self
            .suspensions
            .get(handle)
            .ok_or(StorageError::NotFound(*handle))?;

        let mut snapshot = None;
        sender.send_modify(|suspension| {
            suspension.attach_receipt(receipt);
            snapshot = Some(suspension.clone());
        });
        snapshot.ok_or(StorageError::NotFound(*handle))
    }

    async fn resolve(
        &self,
        handle: &ContinuationHandle,
        disposition: Disposition,
    ) -> Result<Suspension> {
        self.update_open(handle, |suspension| {
            suspension.apply(disposition);
            true
        })
    }

    async fn heartbeat(
        &self,
        handle: &ContinuationHandle,
        details: Option<Value>,
    ) -> Result<Suspension> {
        self.update_open(handle, |suspension| {
            suspension.record_heartbeat(details);
            true
        })
    }

    async fn request_cancellation(&self, handle: &ContinuationHandle) -> Result<Suspension> {
        self.update_open(handle, |suspension| {
            if suspension.cancel_requested() {
                return false;
            }
            suspension.request_cancellation();
            true
        })
    }

    async fn report_cancellation(
        &self,
        handle: &ContinuationHandle,
        details: Option<Value>,
    ) -> Result<Suspension> {
        self.update_open(handle, |suspension| {
            if suspension.cancel_requested() {
                suspension.apply(Disposition::Cancelled(details));
            } else {
                suspension.record_cancellation_report(details);
            }
            true
        })
    }

    async fn subscribe(
        &self,
        handle: &ContinuationHandle,
    ) -> Result<watch::Receiver<Suspension>> {
        self.suspensions
            .get(handle)
            .map(|sender| sender.subscribe())
            .ok_or(StorageError::NotFound(*handle))
    }

    async fn outstanding(&self) -> Result<Vec<Suspension>> {
        let mut open: Vec<Suspension> = self
            .suspensions
            .iter()
            .map(|entry| entry.value().borrow().clone())
            .filter(|suspension| !suspension.is_terminal())
            .collect();
        open.sort_by_key(|suspension| suspension.created_at());
        Ok(open)
    }

    async fn prune_resolved(&self, before: DateTime<Utc>) -> Result<usize> {
        let initial = self.suspensions.len();
        self.suspensions.retain(|_, sender| {
            let suspension = sender.borrow();
            let abandoned = suspension.is_terminal() || suspension.cancel_requested();
            !(abandoned && suspension.updated_at() < before)
        });
        Ok(initial.saturating_sub(self.suspensions.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SuspensionStatus;
    use std::sync::Arc;
    use uuid::Uuid;

    async fn open(store: &InMemorySuspensionStore) -> ContinuationHandle {
        store
            .open(OpenSuspensionParams {
                execution_id: Uuid::new_v4(),
                attempt: 1,
                activity_name: "async-activity",
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_terminal_write_wins() {
        let store = InMemorySuspensionStore::new();
        let handle = open(&store).await;

        let resolved = store
            .resolve(&handle, Disposition::Completed(serde_json::json!({"n": 1})))
            .await
            .unwrap();
        assert_eq!(resolved.status(), SuspensionStatus::Completed);

        let second = store
            .resolve(
                &handle,
                Disposition::Failed {
                    reason: "late".to_string(),
                    non_retryable: false,
                },
            )
            .await;
        assert_eq!(
            second.unwrap_err(),
            StorageError::AlreadyResolved {
                handle,
                status: SuspensionStatus::Completed
            }
        );

        let current = store.get(&handle).await.unwrap().unwrap();
        assert_eq!(
            current.disposition(),
            Some(&Disposition::Completed(serde_json::json!({"n": 1})))
        );
    }

    #[tokio::test]
    async fn test_unknown_handle_is_not_found() {
        let store = InMemorySuspensionStore::new();
        let handle = ContinuationHandle::new(Uuid::new_v4(), 1);

        assert_eq!(
            store.heartbeat(&handle, None).await.unwrap_err(),
            StorageError::NotFound(handle)
        );
        assert_eq!(
            store
                .resolve(&handle, Disposition::TimedOut)
                .await
                .unwrap_err(),
            StorageError::NotFound(handle)
        );
        assert!(store.get(&handle).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_heartbeats_never_resolve() {
        let store = InMemorySuspensionStore::new();
        let handle = open(&store).await;

        for i in 0..25 {
            let s = store
                .heartbeat(&handle, Some(serde_json::json!(i)))
                .await
                .unwrap();
            assert!(!s.is_terminal());
        }
        let s = store.get(&handle).await.unwrap().unwrap();
        assert_eq!(s.heartbeats(), 25);
        assert_eq!(s.status(), SuspensionStatus::Dispatching);
    }

    #[tokio::test]
    async fn test_report_cancellation_without_request_keeps_open() {
        let store = InMemorySuspensionStore::new();
        let handle = open(&store).await;

        let s = store
            .report_cancellation(&handle, Some(serde_json::json!("stopping")))
            .await
            .unwrap();
        assert!(!s.is_terminal());
        assert_eq!(s.cancellation_details(), Some(&serde_json::json!("stopping")));

        store.request_cancellation(&handle).await.unwrap();
        let s = store.report_cancellation(&handle, None).await.unwrap();
        assert_eq!(s.status(), SuspensionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_subscriber_sees_resolution() {
        let store = InMemorySuspensionStore::new();
        let handle = open(&store).await;
        let mut rx = store.subscribe(&handle).await.unwrap();

        store
            .mark_suspended(
                &handle,
                DispatchReceipt {
                    status: 200,
                    body: serde_json::json!({"message": "ok"}),
                },
            )
            .await
            .unwrap();
        store
            .resolve(&handle, Disposition::Completed(Value::Null))
            .await
            .unwrap();

        let s = rx.wait_for(|s| s.is_terminal()).await.unwrap().clone();
        assert_eq!(s.status(), SuspensionStatus::Completed);
        assert_eq!(s.receipt().unwrap().status, 200);
    }

    #[tokio::test]
    async fn test_outstanding_and_prune() {
        let store = InMemorySuspensionStore::new();
        let open_handle = open(&store).await;
        let resolved_handle = open(&store).await;
        store
            .resolve(&resolved_handle, Disposition::TimedOut)
            .await
            .unwrap();

        let outstanding = store.outstanding().await.unwrap();
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].handle(), open_handle);

        let pruned = store
            .prune_resolved(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(pruned, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(
            store
                .resolve(&resolved_handle, Disposition::TimedOut)
                .await
                .unwrap_err(),
            StorageError::NotFound(resolved_handle)
        );
    }

    #[tokio::test]
    async fn test_prune_reclaims_cancel_requested() {
        let store = InMemorySuspensionStore::new();
        let live = open(&store).await;
        let cancelled = open(&store).await;
        store.request_cancellation(&cancelled).await.unwrap();

        let pruned = store
            .prune_resolved(Utc::now() + chrono::Duration::days(365))
            .await
            .unwrap();
        assert_eq!(pruned, 1);

        let outstanding = store.outstanding().await.unwrap();
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].handle(), live);
        assert_eq!(
            store
                .resolve(&cancelled, Disposition::Completed(Value::Null))
                .await
                .unwrap_err(),
            StorageError::NotFound(cancelled)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_terminal_writes_single_winner() {
        let store = Arc::new(InMemorySuspensionStore::new());
        let handle = open(&store).await;

        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let disposition = if i % 2 == 0 {
                    Disposition::Completed(serde_json::json!(i))
                } else {
                    Disposition::Failed {
                        reason: format!("failure {i}"),
                        non_retryable: false,
                    }
                };
                store.resolve(&handle, disposition).await
            }));
        }

        let mut winners = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => winners += 1,
                Err(StorageError::AlreadyResolved { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners, 1);
    }
}
