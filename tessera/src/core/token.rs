//! Continuation token codec.
//!
//! Hides the textual representation of a [`ContinuationHandle`] so the handle's
//! binary layout can evolve without touching the dispatch step or the ingress.

use super::handle::ContinuationHandle;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The externally transmittable form of a [`ContinuationHandle`].
///
/// Tokens only contain characters from the URL-safe base64 alphabet, so they
/// can be placed in a query string without further escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContinuationToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Why a token string could not be turned back into a handle.
///
/// This is deliberately separate from "handle not found": a decodable token
/// always names a handle, whether or not that handle is still outstanding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// The string is not valid URL-safe base64.
    #[error("malformed continuation token")]
    Malformed(#[source] base64::DecodeError),

    /// The decoded bytes have the wrong length for a handle.
    #[error("continuation token decodes to {0} bytes")]
    InvalidLength(usize),

    /// The decoded bytes carry a handle version this build does not know.
    #[error("unsupported continuation token version {0}")]
    UnsupportedVersion(u8),
}

/// Capability set for turning handles into tokens and back.
///
/// Implementations must be deterministic and satisfy
/// `decode(encode(h)) == h` for every handle.
pub trait TokenCodec: Send + Sync {
    fn encode(&self, handle: &ContinuationHandle) -> ContinuationToken;

    fn decode(&self, token: &str) -> Result<ContinuationHandle, DecodeError>;
}

/// Default codec: unpadded URL-safe base64 over the handle's bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64UrlCodec;

impl TokenCodec for Base64UrlCodec {
    fn encode(&self, handle: &ContinuationHandle) -> ContinuationToken {
        ContinuationToken(URL_SAFE_NO_PAD.encode(handle.to_bytes()))
    }

    fn decode(&self, token: &str) -> Result<ContinuationHandle, DecodeError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(DecodeError::Malformed)?;
        ContinuationHandle::from_bytes(&bytes)
    }
}

/// Encodes a handle with the default codec.
pub fn encode(handle: &ContinuationHandle) -> ContinuationToken {
    Base64UrlCodec.encode(handle)
}

/// Decodes a token with the default codec.
///
/// # Errors
/// Returns a [`DecodeError`] when the string was not produced by [`encode`].
pub fn decode(token: &str) -> Result<ContinuationHandle, DecodeError> {
    Base64UrlCodec.decode(token)
}
