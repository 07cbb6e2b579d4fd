//! Retry policy table for failed download attempts.

use std::time::Duration;

use crate::error::ErrorKind;

/// Upper bound on download attempts for a single message.
pub const MAX_ATTEMPTS: u32 = 3;

/// How the item state machine reacts to a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retryable: bool,
    /// Fetch the message again before the next attempt.
    pub refetch: bool,
    /// Pause before the next attempt.
    pub delay: Option<Duration>,
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Policy for an error kind. `timeout_delay` is the configured retry delay.
    pub fn for_kind(kind: ErrorKind, timeout_delay: Duration) -> Self {
        match kind {
            ErrorKind::ExpiredReference => Self {
                retryable: true,
                refetch: true,
                delay: None,
                max_attempts: MAX_ATTEMPTS,
            },
            ErrorKind::Timeout => Self {
                retryable: true,
                refetch: false,
                delay: Some(timeout_delay),
                max_attempts: MAX_ATTEMPTS,
            },
            ErrorKind::Other => Self {
                retryable: false,
                refetch: false,
                delay: None,
                max_attempts: 1,
            },
        }
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn allows_retry(&self, attempt: u32) -> bool {
        self.retryable && attempt < self.max_attempts
    }
}
