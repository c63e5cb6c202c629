//! Tessera: asynchronous activity completion for Rust
//!
//! A tessera was a token broken in two, one half kept by each party so the
//! halves could be matched later. This crate does the same for long-running
//! work: a dispatch step hands an external service a continuation token and
//! suspends, and the service's callback, carrying the token back, resolves the
//! suspended step.
//!
//! # Features
//!
//! - **Opaque tokens**: URL-safe, reversible encoding of continuation handles
//! - **Suspend without blocking**: no thread or connection held between
//!   dispatch and callback
//! - **At-most-one resolution**: the first terminal callback wins, later ones
//!   are rejected
//! - **Retry and deadlines**: capped exponential backoff with a per-attempt
//!   timeout and an optional schedule-to-close deadline
//! - **Deterministic workflows**: decisions replay from recorded history
//!
//! # Module Organization
//!
//! Following Parnas's information hiding principles, each module hides specific design
//! decisions that are likely to change:
//!
//! - [`core`]: Handles, tokens, retry policy (hides the token format)
//! - [`storage`]: Suspension state (hides where and how it is kept)
//! - [`executor`]: Dispatch, resolution, supervision, workflows (hides execution strategy)
//! - [`ingress`]: Inbound HTTP (hides the web framework)
//! - [`gateway`]: Outbound HTTP (hides the HTTP client)
//! - [`service`]: A simulated Callback-Emitting Service for local runs and tests
//! - [`config`]: Environment-driven settings
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tessera::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemorySuspensionStore::new());
//! let client = HttpApiClient::new("http://localhost:8000", Duration::from_secs(60))?;
//! let step = HttpDispatchStep::new(client, "http://localhost:8001/callback")?;
//!
//! let mut supervisor = Supervisor::new(store);
//! supervisor.register(Arc::new(step));
//! let runtime = Arc::new(Runtime::new(supervisor));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8001").await?;
//! tokio::spawn(tessera::ingress::serve(
//!     listener,
//!     runtime.clone(),
//!     CancellationToken::new(),
//! ));
//!
//! let handle = runtime.start_workflow(CallServiceWorkflowInput {
//!     sleep_until_200: 1,
//!     sleep_until_callback: 10,
//!     action: "complete".to_string(),
//! });
//! println!("{:?}", handle.result().await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod executor;
pub mod gateway;
pub mod ingress;
pub mod service;
pub mod storage;

pub use crate::core::{
    decode, encode, Base64UrlCodec, ContinuationHandle, ContinuationToken, CoreError, DecodeError,
    RetryPolicy, TokenCodec,
};

pub use crate::executor::{
    ActivityError, ActivityExecutor, ActivityOptions, CallServiceWorkflow,
    CallServiceWorkflowInput, CallServiceWorkflowOutput, CancellationType, CorrelationError,
    CorrelationResolver, DispatchOutcome, DispatchStep, Retryable, Runtime, Supervisor,
    WorkflowError, WorkflowHandle,
};

pub use crate::storage::{InMemorySuspensionStore, StorageError, SuspensionStore};

// Re-export dependencies used in public API
pub use serde;
pub use tokio;
pub use tokio_util::sync::CancellationToken;
pub use uuid;

/// Commonly used types for building a worker.
pub mod prelude {
    pub use crate::core::{ContinuationHandle, ContinuationToken, RetryPolicy, TokenCodec};
    pub use crate::executor::{
        ActivityExecutor, ActivityOptions, AsyncActivityInput, AsyncActivityOutput,
        CallServiceWorkflow, CallServiceWorkflowInput, CallServiceWorkflowOutput,
        CancellationType, CorrelationResolver, DispatchContext, DispatchOutcome, DispatchStep,
        HttpDispatchStep, Runtime, Supervisor, WorkflowError, WorkflowHandle,
    };
    pub use crate::gateway::{HttpApiClient, WorkflowClient};
    pub use crate::storage::{InMemorySuspensionStore, SuspensionStore};
    pub use std::sync::Arc;
    pub use tokio_util::sync::CancellationToken;
    pub use uuid::Uuid;
}
