use crate::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Exponential backoff for store writes that may fail transiently.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Adds up to 10% to each grown delay, still bounded by `max_delay`.
    pub jitter: bool,
}

impl RetryConfig {
    pub fn with_delays(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    /// Policy for job record writes. A consumer holds its lane while
    /// retrying, so the whole budget stays well under a second.
    pub fn job_state() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    /// Delay to use after `current`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let mut next = current.mul_f64(self.backoff_multiplier);
        if self.jitter {
            next += next.mul_f64(0.1 * rand::random::<f64>());
        }
        next.min(self.max_delay)
    }
}

/// Run `operation` until it succeeds or `config.max_attempts` is spent,
/// returning the last error.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    let mut delay = config.initial_delay.min(config.max_delay);

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("'{}' succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt >= config.max_attempts => {
                error!("'{}' gave up after {} attempts: {}", operation_name, attempt, e);
                return Err(e);
            }
            Err(e) => {
                warn!(
                    "'{}' failed on attempt {} ({}), retrying in {:?}",
                    operation_name, attempt, e, delay
                );
                sleep(delay).await;
                delay = config.next_delay(delay);
                attempt += 1;
            }
        }
    }
}

/// Retry a job record write with [`RetryConfig::job_state`].
pub async fn retry_job_state_write<F, Fut, T>(operation_name: &str, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with_backoff(&RetryConfig::job_state(), operation_name, operation).await
}
