//! Retry and failover accounting.
//!
//! # Responsibilities
//! - Carry per-request attempt/retry counters as an immutable value
//! - Decide between retrying the same backend, failing over, or rejecting
//!
//! # Design Decisions
//! - Retries stay on one backend; failover marks it dead and picks another
//! - Only transport failures are retried; any HTTP response is final
//! - Counters are `Copy` values, never shared state

use std::time::Duration;

use crate::config::RetryConfig;

/// Attempt/retry counters for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptState {
    attempts: u32,
    retries: u32,
}

impl Default for AttemptState {
    fn default() -> Self {
        Self {
            attempts: 1,
            retries: 0,
        }
    }
}

impl AttemptState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch cycles so far, starting at 1.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Retries against the current backend, starting at 0.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Same backend, one more retry.
    #[must_use]
    pub fn next_retry(self) -> Self {
        Self {
            retries: self.retries + 1,
            ..self
        }
    }

    /// New dispatch cycle; retries start over.
    #[must_use]
    pub fn next_attempt(self) -> Self {
        Self {
            attempts: self.attempts + 1,
            retries: 0,
        }
    }
}

/// What to do after a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Wait, then forward to the same backend again.
    Retry(Duration),
    /// Mark the backend dead and dispatch again.
    FailOver,
}

/// Bounds on retries and attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            max_attempts: config.max_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Whether another dispatch cycle is allowed.
    pub fn can_dispatch(&self, state: AttemptState) -> bool {
        state.attempts() <= self.max_attempts
    }

    /// Decide how to handle a transport failure in `state`.
    pub fn on_failure(&self, state: AttemptState) -> FailureAction {
        if state.retries() < self.max_retries {
            FailureAction::Retry(self.retry_delay)
        } else {
            FailureAction::FailOver
        }
    }

    /// Upper bound on forwards for one request.
    pub fn max_forwards(&self) -> u32 {
        self.max_attempts * (self.max_retries + 1)
    }
}
