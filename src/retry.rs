use std::time::Duration;

use crate::errors::AiError;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    Fail,
}

/// Exponential backoff for transient provider failures.
///
/// Classification lives on the error (`AiError::is_transient`); this type only
/// owns the attempt budget arithmetic and the delay curve.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,

    /// Multiplier applied for each further retry
    pub backoff_factor: u32,

    /// Upper bound on a single delay
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            backoff_factor: 2,
            max_delay: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Delay before retry number `retry_count` (0-based): base * factor^retry_count.
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let multiplier = self.backoff_factor.saturating_pow(retry_count);
        let delay = self.base_delay.saturating_mul(multiplier);
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// Decide after attempt `attempt` (1-based) out of `max_attempts` failed
    /// with `error`.
    pub fn decide(&self, attempt: u32, max_attempts: u32, error: &AiError) -> RetryDecision {
        if attempt >= max_attempts || !error.is_transient() {
            return RetryDecision::Fail;
        }
        RetryDecision::Retry(self.backoff_delay(attempt.saturating_sub(1)))
    }
}
