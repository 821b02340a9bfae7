//! Retry with exponential backoff
//!
//! Attempt `n` (0-based) that fails waits
//! `min(base_delay * backoff_rate^n, max_delay)` before the next attempt.
//! Every attempt runs under its own deadline; a missed deadline counts as a
//! failed attempt. Non-retryable errors return immediately.
//!
//! [`execute_queued`] admits each attempt through a [`RequestQueue`] first.
//! The deadline covers only the call itself, never the wait for a slot.

use super::RequestQueue;
use spotscrape_common::config::RetryConfig;
use spotscrape_common::Error;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that can tell whether another attempt might succeed
pub trait Retryable: Sized {
    fn is_retryable(&self) -> bool;

    /// Error value for an attempt that exceeded its deadline
    fn timed_out(after: Duration) -> Self;
}

impl Retryable for Error {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }

    fn timed_out(after: Duration) -> Self {
        Error::Timeout(after.as_millis() as u64)
    }
}

/// Retry policy implementing exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt
    pub backoff_rate: f64,
    /// Cap for exponential growth
    pub max_delay: Duration,
    /// Deadline for a single attempt
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            backoff_rate: config.backoff_rate,
            max_delay: Duration::from_millis(config.max_delay_ms),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Single attempt, no waiting
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            backoff_rate: 1.0,
            max_delay: Duration::ZERO,
            timeout,
        }
    }

    /// Delay after failed attempt `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms = self.base_delay.as_millis() as f64 * self.backoff_rate.powi(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        if capped_ms.is_finite() && capped_ms > 0.0 {
            Duration::from_millis(capped_ms as u64)
        } else {
            Duration::ZERO
        }
    }

    /// Upper bound on the total wall time of [`execute`] under this policy
    pub fn worst_case_duration(&self) -> Duration {
        let delays: Duration = (0..self.max_attempts.saturating_sub(1))
            .map(|n| self.delay_for_attempt(n))
            .sum();
        delays + self.timeout * self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Terminal outcome of a retried operation
#[derive(Debug, Error)]
pub enum RetryError<E: std::fmt::Display> {
    /// Error classified as non-retryable; returned without further attempts
    #[error("{operation} failed: {error}")]
    NonRetryable { operation: String, attempts: u32, error: E },

    /// Every attempt failed
    #[error("{operation} failed after {attempts} attempts: {last}")]
    Exhausted { operation: String, attempts: u32, last: E },
}

impl<E: std::fmt::Display> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::NonRetryable { attempts, .. } | RetryError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The last underlying error
    pub fn into_inner(self) -> E {
        match self {
            RetryError::NonRetryable { error, .. } => error,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

impl From<RetryError<Error>> for Error {
    fn from(err: RetryError<Error>) -> Self {
        err.into_inner()
    }
}

/// Run `operation` under `policy`
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "spotify get_album")
/// * `policy` - Attempt budget, backoff and per-attempt deadline
/// * `operation` - Closure producing a fresh future per attempt
pub async fn execute<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display + From<Error>,
{
    run_attempts(operation_name, policy, None, operation).await
}

/// Run `operation` under `policy`, holding a `queue` slot for each attempt
///
/// The slot is taken before the attempt deadline starts and released before
/// any backoff sleep.
pub async fn execute_queued<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    queue: &RequestQueue,
    operation: F,
) -> Result<T, RetryError<Error>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    run_attempts(operation_name, policy, Some(queue), operation).await
}

async fn run_attempts<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    queue: Option<&RequestQueue>,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display + From<Error>,
{
    let start_time = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying operation");
        }

        let permit = match queue {
            Some(queue) => match queue.acquire().await {
                Ok(permit) => Some(permit),
                Err(err) => {
                    return Err(RetryError::NonRetryable {
                        operation: operation_name.to_string(),
                        attempts: attempt,
                        error: E::from(err),
                    })
                }
            },
            None => None,
        };

        let outcome = match tokio::time::timeout(policy.timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(E::timed_out(policy.timeout)),
        };
        drop(permit);

        let err = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            tracing::debug!(
                operation = operation_name,
                attempt,
                error = %err,
                "Non-retryable failure"
            );
            return Err(RetryError::NonRetryable {
                operation: operation_name.to_string(),
                attempts: attempt,
                error: err,
            });
        }

        if attempt >= max_attempts {
            tracing::warn!(
                operation = operation_name,
                attempt,
                elapsed_ms = start_time.elapsed().as_millis() as u64,
                error = %err,
                "Operation failed: retry attempts exhausted"
            );
            return Err(RetryError::Exhausted {
                operation: operation_name.to_string(),
                attempts: attempt,
                last: err,
            });
        }

        let delay = policy.delay_for_attempt(attempt - 1);
        tracing::warn!(
            operation = operation_name,
            attempt,
            backoff_ms = delay.as_millis() as u64,
            error = %err,
            "Transient failure, will retry after backoff"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            backoff_rate: 2.0,
            max_delay: Duration::from_millis(300),
            timeout: Duration::from_millis(1000),
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let p = policy(5);
        assert_eq!(p.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(p.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(p.delay_for_attempt(2), Duration::from_millis(300));
        assert_eq!(p.delay_for_attempt(10), Duration::from_millis(300));
    }

    #[test]
    fn test_worst_case_duration() {
        let p = policy(3);
        // delays 100 + 200, plus 3 * 1000 timeout
        assert_eq!(p.worst_case_duration(), Duration::from_millis(3300));
    }

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let result = execute("test_op", &policy(3), || async { Ok::<i32, Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_is_attempted_exactly_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let p = policy(4);
        let started = tokio::time::Instant::now();

        let c = calls.clone();
        let result = execute("always_fails", &p, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::external_status("spotify", 503, "unavailable"))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(RetryError::Exhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(last, Error::ExternalService { status: Some(503), .. }));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert!(started.elapsed() <= p.worst_case_duration());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_returns_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = execute("not_found", &policy(5), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::external_status("spotify", 404, "missing"))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::NonRetryable { attempts: 1, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = execute("flaky", &policy(3), move || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::external_status("spotify", 429, "slow down"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_counts_as_failure() {
        let mut p = policy(2);
        p.timeout = Duration::from_millis(50);

        let result = execute("hangs", &p, || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<(), Error>(())
        })
        .await;

        match result {
            Err(RetryError::Exhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(last, Error::Timeout(50)));
            }
            other => panic!("expected timeout exhaustion, got {:?}", other),
        }
    }
}
