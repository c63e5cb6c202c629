//! Outbound HTTP.
//!
//! - [`HttpApiClient`]: calls the Callback-Emitting Service
//! - [`WorkflowClient`]: drives a worker's workflow API

mod api;
mod error;
mod workflows;

pub use api::{ApiResponse, HttpApiClient};
pub use error::{GatewayError, Result};
pub use workflows::WorkflowClient;
