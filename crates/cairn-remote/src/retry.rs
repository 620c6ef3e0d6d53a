//! Bounded retry with exponential backoff for remote cache calls.

use crate::config::RemoteConfig;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use cairn_core::{Error, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// Failure of a single attempt.
#[derive(Debug)]
pub(crate) enum AttemptError {
    /// Connection problems, timeouts, 5xx, 429: worth another attempt.
    Transient(String),
    /// Anything another attempt cannot fix.
    Permanent(String),
}

/// How many times and how patiently to retry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RemoteConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_multiplier(2.0)
            // Attempts bound the loop, not elapsed time.
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Run `f` until it succeeds, fails permanently or runs out of attempts.
/// Every surfaced failure is an [`Error::Network`].
pub(crate) async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    operation: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, AttemptError>>,
{
    let mut backoff = policy.backoff();
    let mut attempts = 0;

    loop {
        attempts += 1;
        match f().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(operation, attempts, "Remote call succeeded after retry");
                }
                return Ok(value);
            }
            Err(AttemptError::Permanent(message)) => {
                return Err(Error::Network(format!("{operation}: {message}")));
            }
            Err(AttemptError::Transient(message)) => {
                let delay = backoff.next_backoff();
                match delay {
                    Some(delay) if attempts < policy.max_attempts => {
                        warn!(
                            operation,
                            attempts,
                            error = %message,
                            retry_in_ms = delay.as_millis() as u64,
                            "Remote call failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    _ => {
                        return Err(Error::Network(format!(
                            "{operation} failed after {attempts} attempt(s): {message}"
                        )));
                    }
                }
            }
        }
    }
}
