//! Backoff for transient transport failures.

use std::time::{Duration, SystemTime};

use reqwest_retry::{RetryDecision, RetryPolicy};

/// Exponential backoff used for connection errors and 5xx/408/429 responses.
///
/// Authorization failures are never transient and are left to the auth middleware.
#[derive(Debug, Clone)]
pub struct TransientBackoff {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl TransientBackoff {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }

    fn delay_for(&self, n_past_retries: u32) -> Duration {
        let factor = 2_u32.saturating_pow(n_past_retries);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl RetryPolicy for TransientBackoff {
    fn should_retry(&self, _request_start_time: SystemTime, n_past_retries: u32) -> RetryDecision {
        if n_past_retries >= self.max_retries {
            RetryDecision::DoNotRetry
        } else {
            RetryDecision::Retry {
                execute_after: SystemTime::now() + self.delay_for(n_past_retries),
            }
        }
    }
}
