//! Retrying fallible async calls

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::backoff::BackoffStrategy;

/// Attempt limit plus the pause between attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// `None` keeps trying until the call succeeds or fails permanently
    pub max_attempts: Option<u32>,

    pub backoff: BackoffStrategy,

    /// Upper bound on any single pause
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Random pause in `[min_delay, max_delay]` between attempts
    pub fn uniform(max_attempts: Option<u32>, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Uniform {
                min: min_delay,
                max: max_delay,
            },
            max_delay,
        }
    }

    /// `attempt * uniform(0.05, 0.1)` seconds between attempts
    pub fn randomized_linear(max_attempts: Option<u32>) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::RandomizedLinear {
                unit: Duration::from_secs(1),
                low: 0.05,
                high: 0.1,
            },
            max_delay: Duration::from_secs(60),
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt, self.max_delay)
    }

    /// Whether another attempt is allowed after `attempt` attempts
    pub fn allows_another(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Errors that say whether trying again could help
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Why a retried call gave up
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    #[error("{0}")]
    Permanent(E),
}

/// Runs a call under a [`RetryPolicy`]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `f` until it succeeds, fails permanently, or the policy runs out
    pub async fn execute<F, Fut, T, E>(&self, mut f: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let error = match f().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_retryable() {
                warn!("not retrying: {}", error);
                return Err(RetryError::Permanent(error));
            }
            if !self.policy.allows_another(attempts) {
                warn!("giving up after {} attempts: {}", attempts, error);
                return Err(RetryError::Exhausted {
                    attempts,
                    last_error: error,
                });
            }

            let pause = self.policy.delay_for_attempt(attempts);
            debug!("attempt {} failed ({}), next in {:?}", attempts, error, pause);
            tokio::time::sleep(pause).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Flaky {
        transient: bool,
    }

    impl Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(if self.transient { "transient" } else { "permanent" })
        }
    }

    impl Retryable for Flaky {
        fn is_retryable(&self) -> bool {
            self.transient
        }
    }

    fn quick(max_attempts: Option<u32>) -> RetryExecutor {
        RetryExecutor::new(RetryPolicy {
            max_attempts,
            backoff: BackoffStrategy::Fixed {
                delay: Duration::from_millis(10),
            },
            max_delay: Duration::from_millis(100),
        })
    }

    /// Fails with a transient error for the first `failures` calls
    fn failing_first(failures: u32, calls: Arc<AtomicU32>) -> impl FnMut() -> std::future::Ready<Result<u32, Flaky>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if n <= failures {
                Err(Flaky { transient: true })
            } else {
                Ok(n)
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_once_transient_errors_stop() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = quick(Some(3)).execute(failing_first(2, calls.clone())).await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_policy_reports_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let err = quick(Some(2))
            .execute(failing_first(u32::MAX, calls.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, RetryError::Exhausted { attempts: 2, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_policy_keeps_going() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = quick(None).execute(failing_first(249, calls)).await;
        assert_eq!(result.unwrap(), 250);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();
        let err = quick(None)
            .execute(|| {
                counted.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Flaky { transient: false }) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RetryError::Permanent(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn randomized_linear_policy_is_unbounded_by_default() {
        let policy = RetryPolicy::randomized_linear(None);
        assert!(policy.allows_another(u32::MAX - 1));

        let delay = policy.delay_for_attempt(4);
        assert!(delay >= Duration::from_millis(200));
        assert!(delay <= Duration::from_millis(400));
    }

    #[test]
    fn uniform_policy_respects_bounds() {
        let policy = RetryPolicy::uniform(Some(5), Duration::from_millis(500), Duration::from_secs(1));
        assert!(policy.allows_another(4));
        assert!(!policy.allows_another(5));
        let delay = policy.delay_for_attempt(1);
        assert!(delay >= Duration::from_millis(500) && delay <= Duration::from_secs(1));
    }
}
