//! Core types and utilities for tessera.
//!
//! This module provides the building blocks every other layer depends on:
//!
//! # Correlation
//! - [`ContinuationHandle`]: Identifies exactly one outstanding suspension
//! - [`ContinuationToken`]: The URL-safe, transmittable form of a handle
//! - [`TokenCodec`]: Encodes handles into tokens and back ([`Base64UrlCodec`] by default)
//!
//! # Serialization
//! - [`serialize_value`]: Convert Rust types to JSON values for history and payloads
//! - [`deserialize_value`]: Convert JSON values back to Rust types
//!
//! # Retry Behavior
//! - [`RetryPolicy`]: Configuration for retry attempts and backoff strategy
//!
//! # Example
//!
//! ```
//! use tessera::core::{decode, encode, ContinuationHandle};
//! use uuid::Uuid;
//!
//! let handle = ContinuationHandle::new(Uuid::new_v4(), 1);
//! let token = encode(&handle);
//! assert_eq!(decode(token.as_str()).unwrap(), handle);
//! ```

mod error;
mod handle;
pub mod retry;
mod serialization;
mod token;

pub use error::{CoreError, Result};
pub use handle::ContinuationHandle;
pub use retry::RetryPolicy;
pub use serialization::{deserialize_value, serialize_value};
pub use token::{decode, encode, Base64UrlCodec, ContinuationToken, DecodeError, TokenCodec};
