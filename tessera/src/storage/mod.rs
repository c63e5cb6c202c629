//! Storage layer for tessera.
//!
//! This module owns the only shared mutable state in the system: the mapping
//! from [`ContinuationHandle`] to suspension state. It is defined as a trait so
//! the embedded in-memory implementation can be swapped for a durable backend
//! without touching the dispatch step, the resolver or the ingress.
//!
//! - [`InMemorySuspensionStore`]: DashMap-based storage for a single process
//!
//! # Example
//!
//! ```
//! use tessera::storage::{InMemorySuspensionStore, OpenSuspensionParams, SuspensionStore};
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemorySuspensionStore::new();
//! let handle = store
//!     .open(OpenSuspensionParams {
//!         execution_id: Uuid::new_v4(),
//!         attempt: 1,
//!         activity_name: "async-activity",
//!     })
//!     .await?;
//! assert!(store.get(&handle).await?.is_some());
//! # Ok(())
//! # }
//! ```

use crate::core::ContinuationHandle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;

mod error;
pub mod memory;
mod params;
mod suspension;

pub use error::{Result, StorageError};
pub use memory::InMemorySuspensionStore;
pub use params::OpenSuspensionParams;
pub use suspension::{DispatchReceipt, Disposition, Suspension, SuspensionStatus};

/// Trait for suspension storage backends.
///
/// Every operation on a single handle must be linearizable. In particular
/// [`resolve`](SuspensionStore::resolve) is a compare-and-set: the first
/// terminal write wins and every later one observes
/// [`StorageError::AlreadyResolved`].
#[async_trait]
pub trait SuspensionStore: Send + Sync {
    /// Mint a fresh handle and register it in the `Dispatching` state.
    async fn open(&self, params: OpenSuspensionParams<'_>) -> Result<ContinuationHandle>;

    /// Get the current state of a suspension.
    async fn get(&self, handle: &ContinuationHandle) -> Result<Option<Suspension>>;

    /// Attach the dispatch acknowledgement and move to `Suspended`.
    ///
    /// A suspension that was already resolved by a fast callback keeps its
    /// terminal status; the receipt is still recorded.
    async fn mark_suspended(
        &self,
        handle: &ContinuationHandle,
        receipt: DispatchReceipt,
    ) -> Result<Suspension>;

    /// Apply a terminal disposition. First terminal write wins.
    async fn resolve(
        &self,
        handle: &ContinuationHandle,
        disposition: Disposition,
    ) -> Result<Suspension>;

    /// Record a heartbeat without resolving the suspension.
    async fn heartbeat(
        &self,
        handle: &ContinuationHandle,
        details: Option<Value>,
    ) -> Result<Suspension>;

    /// Flag the suspension as cancellation-requested (workflow side).
    async fn request_cancellation(&self, handle: &ContinuationHandle) -> Result<Suspension>;

    /// Acknowledge cancellation from the service side.
    ///
    /// Resolves the suspension as `Cancelled` only if cancellation was
    /// requested; otherwise the details are recorded and the suspension stays
    /// open.
    async fn report_cancellation(
        &self,
        handle: &ContinuationHandle,
        details: Option<Value>,
    ) -> Result<Suspension>;

    /// Watch a suspension for changes (heartbeats, terminal dispositions).
    async fn subscribe(&self, handle: &ContinuationHandle)
        -> Result<watch::Receiver<Suspension>>;

    /// All suspensions that have not reached a terminal state.
    async fn outstanding(&self) -> Result<Vec<Suspension>>;

    /// Drop resolved suspensions last updated before `before`.
    ///
    /// Suspensions whose cancellation was requested count as abandoned and are
    /// dropped under the same cutoff even if the service never reported back.
    /// Returns the number of records removed. Callbacks for pruned handles
    /// observe `NotFound` instead of `AlreadyResolved`.
    async fn prune_resolved(&self, before: DateTime<Utc>) -> Result<usize>;
}
