// Retry policy for persistence writes
use std::time::Duration;
use tracing::warn;

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the given delay
    Retry(Duration),
    /// Give up and report the failure
    GiveUp,
}

/// Exponential backoff
///
/// delay = base_delay * (backoff_factor ^ attempt), capped at `max_delay`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    backoff_factor: f64,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}

impl RetryPolicy {
    /// # Arguments
    /// * `max_attempts` - Total attempts including the first one (at least 1)
    /// * `base_delay` - Delay before the second attempt
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide what to do after `attempts_made` failed attempts
    ///
    /// # Example
    /// ```text
    /// let policy = RetryPolicy::new(3, Duration::from_millis(200));
    /// policy.decide(1) // Retry(200ms)
    /// policy.decide(2) // Retry(400ms)
    /// policy.decide(3) // GiveUp
    /// ```
    pub fn decide(&self, attempts_made: u32) -> RetryDecision {
        if attempts_made >= self.max_attempts {
            warn!(
                attempts = attempts_made,
                max_attempts = self.max_attempts,
                "Max retry attempts reached"
            );
            return RetryDecision::GiveUp;
        }

        let exponent = attempts_made.saturating_sub(1) as i32;
        let delay_ms = self.base_delay.as_millis() as f64 * self.backoff_factor.powi(exponent);
        let delay = Duration::from_millis(delay_ms as u64).min(self.max_delay);

        RetryDecision::Retry(delay)
    }
}
