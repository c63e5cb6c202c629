// =============================================================================
// DISPATCH RETRY BEHAVIOR
// =============================================================================
//
// A dispatch attempt fails for one of two reasons:
//
// 1. TRANSPORT: the Callback-Emitting Service did not acknowledge the request
//    (connection refused, timeout, non-2xx status).
// 2. DISPOSITION: the service acknowledged, then called back with `fail`, or the
//    attempt stopped heartbeating.
//
// Both are retried by the supervisor with a fresh continuation handle, unless
// the failure says otherwise (`Retryable::is_retryable() == false`).
//
// The policy below only decides WHEN the next attempt starts. The supervisor
// additionally times out each attempt (start-to-close) and, when configured,
// enforces a schedule-to-close deadline that can end the sequence before
// `max_attempts` is reached.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for dispatch retry behavior.
///
/// Controls how many attempts a dispatch step gets and the backoff strategy
/// between attempts.
///
/// # Examples
///
/// ```
/// use tessera::core::RetryPolicy;
/// use std::time::Duration;
///
/// const API_RETRY: RetryPolicy = RetryPolicy {
///     max_attempts: 5,
///     initial_delay: Duration::from_secs(1),
///     max_delay: Duration::from_secs(30),
///     backoff_multiplier: 2.0,
/// };
///
/// assert_eq!(API_RETRY.delay_for_attempt(2), Some(Duration::from_secs(2)));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first try).
    ///
    /// For example, `max_attempts = 3` means:
    /// - Attempt 1: immediate (first try)
    /// - Attempt 2: after initial_delay
    /// - Attempt 3: after initial_delay * backoff_multiplier
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries (caps exponential backoff).
    pub max_delay: Duration,

    /// Multiplier for exponential backoff.
    ///
    /// Each retry delay is calculated as:
    /// `min(initial_delay * backoff_multiplier^(attempt-1), max_delay)`
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// No retries - fail immediately on first error.
    pub const NONE: Self = Self {
        max_attempts: 1,
        initial_delay: Duration::from_secs(0),
        max_delay: Duration::from_secs(0),
        backoff_multiplier: 1.0,
    };

    /// Policy used for asynchronous dispatch steps.
    ///
    /// - Max attempts: 10
    /// - Initial delay: 1 second
    /// - Max delay: 16 seconds
    /// - Backoff: exponential (2x each time)
    ///
    /// Retry schedule: immediate → 1s → 2s → 4s → 8s → 16s → 16s → 16s → 16s → 16s
    pub const ASYNC_DISPATCH: Self = Self {
        max_attempts: 10,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(16),
        backoff_multiplier: 2.0,
    };

    /// Create a policy with custom max_attempts (uses the dispatch delays).
    pub const fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::ASYNC_DISPATCH
        }
    }

    /// Calculate the delay before the next retry attempt.
    ///
    /// Uses exponential backoff: `initial_delay * backoff_multiplier^(attempt-1)`
    /// capped at `max_delay`.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt that just failed (1-indexed)
    ///
    /// # Returns
    ///
    /// Duration to wait before the next attempt, or None if no more retries.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }

        // attempt=1 (first retry): multiplier^0 = 1 → initial_delay
        // attempt=2 (second retry): multiplier^1 → initial_delay * multiplier
        let exponent = (attempt - 1) as f64;
        let multiplier = self.backoff_multiplier.powf(exponent);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;

        Some(Duration::from_secs_f64(
            delay_secs.min(self.max_delay.as_secs_f64()),
        ))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::ASYNC_DISPATCH
    }
}

impl From<u32> for RetryPolicy {
    fn from(max_attempts: u32) -> Self {
        Self::with_max_attempts(max_attempts)
    }
}
