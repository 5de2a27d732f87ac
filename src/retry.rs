//! Deadline-bounded retry loops for eventually consistent platform calls.
//!
//! An operation reports each failure as [`RetryError::Retryable`] or
//! [`RetryError::NonRetryable`]. [`with_retries`] keeps calling it until it
//! succeeds, fails terminally, or the [`RetryPolicy`] deadline elapses.
//!
//! When the deadline elapses the loop starts over with a fresh deadline up to
//! [`RetryPolicy::restarts`] times before surfacing
//! [`ProviderError::DeadlineExceeded`].
//!
//! ```
//! use genesyscloud_provider::retry::{with_retries, RetryError, RetryPolicy};
//! use genesyscloud_provider::ProviderError;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let mut attempts = 0;
//! let policy = RetryPolicy::new(Duration::from_secs(1)).with_interval(Duration::from_millis(1));
//! let value = with_retries(&policy, || {
//!     attempts += 1;
//!     let n = attempts;
//!     async move {
//!         if n < 3 {
//!             Err(RetryError::retryable(ProviderError::NotFound("not yet".into())))
//!         } else {
//!             Ok(n)
//!         }
//!     }
//! })
//! .await
//! .unwrap();
//! assert_eq!(value, 3);
//! # });
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, warn};

use crate::error::{ProviderError, Result};

/// Classification of a single failed attempt.
#[derive(Debug)]
pub enum RetryError {
    /// The platform has not converged yet; try again.
    Retryable(ProviderError),
    /// Give up immediately and surface the error.
    NonRetryable(ProviderError),
}

impl RetryError {
    /// Wrap an error that should be retried.
    pub fn retryable(err: ProviderError) -> Self {
        Self::Retryable(err)
    }

    /// Wrap an error that ends the loop.
    pub fn non_retryable(err: ProviderError) -> Self {
        Self::NonRetryable(err)
    }

    /// The wrapped error.
    pub fn error(&self) -> &ProviderError {
        match self {
            Self::Retryable(e) | Self::NonRetryable(e) => e,
        }
    }
}

impl From<ProviderError> for RetryError {
    /// Plain errors are terminal unless classified otherwise.
    fn from(err: ProviderError) -> Self {
        Self::NonRetryable(err)
    }
}

/// Timing for a retry loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Time allowed for one pass of the loop.
    pub timeout: Duration,
    /// Wait before the second attempt.
    pub min_interval: Duration,
    /// Upper bound on the wait between attempts.
    pub max_interval: Duration,
    /// Fresh deadlines granted after the first one elapses.
    pub restarts: u32,
}

impl RetryPolicy {
    /// Policy with the given timeout and default intervals.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            min_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            restarts: 1,
        }
    }

    /// Use a fixed interval between attempts.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self.max_interval = interval;
        self
    }

    /// Set the number of deadline restarts.
    pub fn with_restarts(mut self, restarts: u32) -> Self {
        self.restarts = restarts;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }
}

enum PassOutcome<T> {
    Done(T),
    Failed(ProviderError),
    TimedOut(Option<ProviderError>),
}

async fn run_pass<T, F, Fut>(policy: &RetryPolicy, op: &mut F) -> PassOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RetryError>>,
{
    let deadline = Instant::now() + policy.timeout;
    let mut interval = policy.min_interval;
    let mut attempt = 0u32;
    let mut last = None;

    loop {
        attempt += 1;
        // an attempt still running at the deadline is cancelled
        match timeout_at(deadline, op()).await {
            Ok(Ok(value)) => return PassOutcome::Done(value),
            Ok(Err(RetryError::NonRetryable(err))) => return PassOutcome::Failed(err),
            Ok(Err(RetryError::Retryable(err))) => last = Some(err),
            Err(_) => {
                debug!(attempt, "attempt cancelled at the deadline");
                return PassOutcome::TimedOut(last);
            },
        }

        let now = Instant::now();
        if now >= deadline {
            return PassOutcome::TimedOut(last);
        }
        if let Some(err) = &last {
            debug!(attempt, error = %err, "retryable failure, waiting {:?}", interval);
        }

        sleep(interval.min(deadline - now)).await;
        interval = (interval * 2).min(policy.max_interval);
    }
}

/// Run `op` until it succeeds, fails terminally, or every deadline elapses.
pub async fn with_retries<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RetryError>>,
{
    let mut restarts_left = policy.restarts;
    loop {
        match run_pass(policy, &mut op).await {
            PassOutcome::Done(value) => return Ok(value),
            PassOutcome::Failed(err) => return Err(err),
            PassOutcome::TimedOut(last) => {
                if restarts_left > 0 {
                    restarts_left -= 1;
                    warn!(
                        timeout = ?policy.timeout,
                        "deadline elapsed without success, restarting with a fresh deadline"
                    );
                    continue;
                }
                let detail = last
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "attempt did not complete".to_string());
                return Err(ProviderError::DeadlineExceeded(format!(
                    "timeout after {:?}: {}",
                    policy.timeout, detail
                )));
            },
        }
    }
}

/// Retry loop for Read.
///
/// Inside the consistency window (`in_window`, right after a create or update)
/// a 404 is retried like any other retryable error. Outside it a 404 means the
/// resource is gone and the loop returns `Ok(None)` at once.
pub async fn with_retries_for_read<T, F, Fut>(
    policy: &RetryPolicy,
    in_window: bool,
    mut op: F,
) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RetryError>>,
{
    with_retries(policy, || {
        let fut = op();
        async move {
            match fut.await {
                Ok(value) => Ok(Some(value)),
                Err(err) if !in_window && err.error().is_not_found() => Ok(None),
                Err(err) => Err(err),
            }
        }
    })
    .await
}
