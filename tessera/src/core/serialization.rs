use super::error::{CoreError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Serializes a value into a JSON value.
///
/// Payloads travel through history events and callback bodies as JSON, so
/// every typed value crosses this boundary exactly once.
///
/// # Errors
/// Returns `CoreError::Serialization` if the value cannot be serialized.
pub fn serialize_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(CoreError::Serialization)
}

/// Deserializes a JSON value into a typed value.
///
/// # Errors
/// Returns `CoreError::Deserialization` if the value does not match `T`.
pub fn deserialize_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(CoreError::Deserialization)
}
