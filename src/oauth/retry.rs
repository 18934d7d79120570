//! Exponential backoff for the authorization code exchange.

use std::time::Duration;

/// Bounded retry policy: `max_retries` retries after the first attempt, with
/// delays starting at `initial_delay` and doubling each time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Start a fresh attempt sequence.
    pub fn attempts(&self) -> ExchangeAttempts {
        ExchangeAttempts {
            attempt: 0,
            max_attempts: self.max_attempts(),
            next_delay: self.initial_delay,
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the delay, then try again
    Retry(Duration),
    /// Surface the failure
    GiveUp,
}

/// Attempt counter for one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeAttempts {
    attempt: u32,
    max_attempts: u32,
    next_delay: Duration,
}

impl ExchangeAttempts {
    /// Begin the next attempt and return its 1-based number.
    pub fn begin(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Attempts started so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide after a failure of the current attempt.
    ///
    /// Non-transient failures and an exhausted budget both give up; otherwise
    /// the current delay is returned and the next one doubles.
    pub fn on_failure(&mut self, transient: bool) -> RetryDecision {
        if !transient || self.attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }

        let delay = self.next_delay;
        self.next_delay = self.next_delay.saturating_mul(2);
        RetryDecision::Retry(delay)
    }
}
