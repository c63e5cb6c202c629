use super::token::DecodeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Version tag written as the first byte of every encoded handle.
pub(super) const HANDLE_VERSION: u8 = 1;

/// Length of the binary representation: version + execution id + attempt + nonce.
pub(super) const HANDLE_LEN: usize = 1 + 16 + 4 + 16;

/// Identifies exactly one outstanding suspension.
///
/// A handle is minted by the suspension store right before a dispatch attempt
/// and is never reused: the random `nonce` makes every attempt's handle unique,
/// even for the same execution and attempt number after a restart.
///
/// The fields are exposed for logging only. Nothing outside the store should
/// derive behaviour from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContinuationHandle {
    execution_id: Uuid,
    attempt: u32,
    nonce: Uuid,
}

impl ContinuationHandle {
    /// Mints a fresh handle for the given execution and attempt.
    pub fn new(execution_id: Uuid, attempt: u32) -> Self {
        Self::from_parts(execution_id, attempt, Uuid::new_v4())
    }

    pub fn from_parts(execution_id: Uuid, attempt: u32, nonce: Uuid) -> Self {
        Self {
            execution_id,
            attempt,
            nonce,
        }
    }

    /// The workflow execution that owns this suspension.
    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    /// The 1-indexed dispatch attempt this handle was minted for.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn nonce(&self) -> Uuid {
        self.nonce
    }

    /// Returns the fixed-size binary representation.
    pub fn to_bytes(&self) -> [u8; HANDLE_LEN] {
        let mut bytes = [0u8; HANDLE_LEN];
        bytes[0] = HANDLE_VERSION;
        bytes[1..17].copy_from_slice(self.execution_id.as_bytes());
        bytes[17..21].copy_from_slice(&self.attempt.to_be_bytes());
        bytes[21..37].copy_from_slice(self.nonce.as_bytes());
        bytes
    }

    /// Parses the binary representation produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidLength` or `DecodeError::UnsupportedVersion`
    /// when the bytes were not produced by `to_bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != HANDLE_LEN {
            return Err(DecodeError::InvalidLength(bytes.len()));
        }
        if bytes[0] != HANDLE_VERSION {
            return Err(DecodeError::UnsupportedVersion(bytes[0]));
        }

        let invalid = |_| DecodeError::InvalidLength(bytes.len());
        let execution_id = Uuid::from_slice(&bytes[1..17]).map_err(invalid)?;
        let attempt = u32::from_be_bytes(
            bytes[17..21]
                .try_into()
                .map_err(|_| DecodeError::InvalidLength(bytes.len()))?,
        );
        let nonce = Uuid::from_slice(&bytes[21..37]).map_err(invalid)?;

        Ok(Self::from_parts(execution_id, attempt, nonce))
    }
}

impl fmt::Display for ContinuationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}/{}",
            self.execution_id,
            self.attempt,
            &self.nonce.simple().to_string()[..8]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_round_trip() {
        let handle = ContinuationHandle::new(Uuid::new_v4(), 7);
        let bytes = handle.to_bytes();
        assert_eq!(bytes[0], HANDLE_VERSION);
        assert_eq!(ContinuationHandle::from_bytes(&bytes).unwrap(), handle);
    }

    #[test]
    fn test_fresh_handles_are_unique() {
        let execution_id = Uuid::new_v4();
        let first = ContinuationHandle::new(execution_id, 1);
        let second = ContinuationHandle::new(execution_id, 1);
        assert_ne!(first, second);
    }

    #[test]
    fn test_from_bytes_rejects_wrong_length() {
        let handle = ContinuationHandle::new(Uuid::new_v4(), 1);
        let bytes = handle.to_bytes();
        assert_eq!(
            ContinuationHandle::from_bytes(&bytes[..20]),
            Err(DecodeError::InvalidLength(20))
        );
        assert_eq!(
            ContinuationHandle::from_bytes(&[]),
            Err(DecodeError::InvalidLength(0))
        );
    }

    #[test]
    fn test_from_bytes_rejects_unknown_version() {
        let mut bytes = ContinuationHandle::new(Uuid::new_v4(), 1).to_bytes();
        bytes[0] = 9;
        assert_eq!(
            ContinuationHandle::from_bytes(&bytes),
            Err(DecodeError::UnsupportedVersion(9))
        );
    }

    #[test]
    fn test_display_is_short() {
        let handle = ContinuationHandle::from_parts(Uuid::nil(), 3, Uuid::nil());
        assert_eq!(
            handle.to_string(),
            "00000000-0000-0000-0000-000000000000#3/00000000"
        );
    }
}
