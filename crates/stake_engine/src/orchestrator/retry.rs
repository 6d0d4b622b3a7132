use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_RETRY_BACKOFF_MILLIS, DEFAULT_RETRY_MAX_ATTEMPTS};

/// Bounded, caller-invoked retry strategy.
///
/// Only failures for which [`EngineError::is_retryable`] holds are retried.
///
/// [`EngineError::is_retryable`]: crate::error::EngineError::is_retryable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub backoff_millis: u64,
}

impl RetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_millis)
    }

    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff_millis: 0,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            backoff_millis: DEFAULT_RETRY_BACKOFF_MILLIS,
        }
    }
}
