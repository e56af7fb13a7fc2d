//! Fixed-attempt retry for page downloads.
//!
//! [`retry_bounded`] runs an operation up to [`RetryPolicy::max_attempts`]
//! times and reports either the first success or the last error as a
//! [`RetryOutcome`].
//!
//! Attempts fire back to back by default. A fixed delay can be configured
//! with [`RetryPolicy::with_delay`]; no exponential backoff is applied.
//!
//! # Example
//!
//! ```
//! use nli_downloader_core::download::{RetryOutcome, RetryPolicy, retry_bounded};
//!
//! # async fn example() {
//! let policy = RetryPolicy::default();
//! let outcome = retry_bounded(&policy, |attempt| async move {
//!     if attempt < 3 { Err("flaky") } else { Ok(attempt) }
//! })
//! .await;
//! assert!(matches!(outcome, RetryOutcome::Succeeded { value: 3, attempts: 3 }));
//! # }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::constants::DEFAULT_MAX_ATTEMPTS;

/// How many times to try and how long to wait in between.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `delay`: zero (retries fire immediately)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,
    /// Pause between a failed attempt and the next one.
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with a custom attempt count and no delay.
    ///
    /// Values below one are raised to one.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns a copy of this policy that waits `delay` between attempts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the pause between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Result of [`retry_bounded`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    /// One of the attempts succeeded.
    Succeeded {
        /// Value returned by the successful attempt.
        value: T,
        /// Attempts made, including the successful one.
        attempts: u32,
    },
    /// Every attempt failed.
    Exhausted {
        /// Error from the final attempt.
        last_error: E,
        /// Attempts made (always the policy maximum).
        attempts: u32,
    },
}

impl<T, E> RetryOutcome<T, E> {
    /// Returns the number of attempts made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Returns true when an attempt succeeded.
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Runs `operation` until it succeeds or the policy's attempts run out.
///
/// The closure receives the 1-indexed attempt number. Every error is treated
/// as retryable; anything that must abort the whole run has to panic or be
/// raised outside of this loop.
pub async fn retry_bounded<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(attempt, max_attempts = policy.max_attempts, "starting attempt");

        match operation(attempt).await {
            Ok(value) => {
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                };
            }
            Err(error) => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %error,
                    "attempt failed"
                );
                if attempt >= policy.max_attempts {
                    return RetryOutcome::Exhausted {
                        last_error: error,
                        attempts: attempt,
                    };
                }
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }
}
