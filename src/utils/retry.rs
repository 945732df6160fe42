//! Retry with exponential backoff for network fetches

use crate::error::RtubeError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Backoff settings for page and script fetches
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Random spread added to each delay, 0.0 to 1.0
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt` (0-based), without jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    fn jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 {
            return Duration::ZERO;
        }
        let range = delay.as_millis() as f64 * self.jitter_factor;
        Duration::from_millis((rand::random::<f64>() * range) as u64)
    }
}

/// Runs an operation until it succeeds, fails with a non-retryable error,
/// or runs out of retries
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, RtubeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RtubeError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.delay_for(attempt);
                    let delay = delay + self.config.jitter(delay);
                    debug!("Attempt {} failed ({}), retrying in {:?}", attempt + 1, error, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
