use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::configuration::RetryConfig;
use crate::errors::*;

/// Bounded retry of transient failures with exponential backoff. The overall timeout is
/// checked between attempts, a running attempt is never interrupted.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_attempts: usize,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl<'a> From<&'a RetryConfig> for RetryPolicy {
    fn from(config: &'a RetryConfig) -> Self {
        Self {
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            max_attempts: config.max_attempts,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

impl RetryPolicy {
    /// Pause following the failure of attempt `attempt` (1-based)
    pub fn backoff(&self, attempt: usize) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1) as u32);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Runs `operation` until it succeeds, fails deterministically, runs out of attempts
    /// or out of time. The operation receives the attempt number.
    pub fn execute<T, F>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(usize) -> Result<T>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut attempt = 1;
        loop {
            let error = match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            if !is_transient(&error) {
                return Err(error);
            }
            if attempt >= self.max_attempts {
                warn!("Giving up after {} attempts: {}", attempt, error);
                return Err(error);
            }
            let now = Instant::now();
            if now >= deadline {
                warn!("Giving up after {:?}: {}", self.timeout, error);
                return Err(error);
            }
            let backoff = self.backoff(attempt).min(deadline - now);
            debug!("Attempt {} failed, retrying in {:?}: {}", attempt, backoff, error);
            thread::sleep(backoff);
            if Instant::now() >= deadline {
                warn!("Giving up after {:?}: {}", self.timeout, error);
                return Err(error);
            }
            attempt += 1;
        }
    }
}

pub fn is_transient(error: &failure::Error) -> bool {
    error
        .downcast_ref::<NluEngineError>()
        .map(|e| e.is_transient())
        .unwrap_or(false)
}
