//! Retry logic.
//!
//! # Responsibilities
//! - Re-run an operation whose failure is classified as retryable
//! - Sleep a linearly growing delay between attempts
//! - Report how many retries were spent once the budget is gone
//!
//! # Design Decisions
//! - The classifier is supplied by the caller (upstream/ retries transport errors only)
//! - Non-retryable failures return immediately, without sleeping

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::linear_backoff;

/// How a retried operation ultimately failed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error; `source` is the last one.
    Exhausted { source: E, retries: u32 },
    /// The operation failed with an error the classifier rejected.
    NotRetryable(E),
}

/// Bounded retries with linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Backoff step; retry `n` sleeps `n * step` first.
    pub step: Duration,
    /// How long a single attempt may take before it counts as a transport failure.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            step: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            step: Duration::from_secs(config.step_secs),
            attempt_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails with an error `retryable` rejects,
    /// or `max_retries` extra attempts have failed.
    pub async fn run<T, E, F, Fut, R>(&self, retryable: R, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !retryable(&e) => return Err(RetryError::NotRetryable(e)),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(RetryError::Exhausted {
                            source: e,
                            retries: self.max_retries,
                        });
                    }

                    let delay = linear_backoff(attempt, self.step);
                    tracing::warn!(attempt, delay = ?delay, error = %e, "Upstream request failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
