//! Admission control and retry for quota-constrained collaborators.
//!
//! A [`RetryExecutor`] wraps one resource class (the text backend, the
//! search provider, ...) with bounded concurrency, minimum inter-start
//! spacing, and exponential backoff with jitter. Executors are
//! process-lifetime singletons shared by every caller of the same
//! resource; the wrapped call and its retries run entirely on the
//! calling task and never block unrelated work.

use std::fmt::Display;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Upper bound (exclusive) of the per-attempt jitter factor.
const MAX_JITTER: f64 = 0.3;

/// Why an attempt failed, distinguished for logging only. Both classes
/// use the same backoff curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    RateLimited,
    Transient,
}

/// Classify an error for retry logging.
///
/// Providers signal quota pressure in their message (HTTP 429 or an
/// explicit quota code); anything else is treated as transient.
pub fn classify<E: Display>(error: &E) -> RetryClass {
    let text = error.to_string().to_lowercase();
    if text.contains("429") || text.contains("rate limit") || text.contains("quota") {
        RetryClass::RateLimited
    } else {
        RetryClass::Transient
    }
}

/// Backoff parameters.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts before the last error becomes terminal.
    pub max_attempts: u32,
    /// Base delay; the delay before attempt i+1 is
    /// `min(base * 2^i * (1 + jitter), cap)`.
    pub base: Duration,
    /// Upper bound on any single delay.
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base: Duration::from_secs(1),
            cap: Duration::from_secs(60),
        }
    }
}

/// Compute the delay before attempt `failed + 1`, where `failed` is the
/// zero-based index of the attempt that just failed.
fn backoff_delay(policy: &RetryPolicy, failed: u32, jitter: f64) -> Duration {
    let base = policy.base.as_secs_f64();
    let exp = 2f64.powi(failed.min(31) as i32);
    let delay = base * exp * (1.0 + jitter);
    Duration::from_secs_f64(delay.min(policy.cap.as_secs_f64()))
}

/// Bounded-concurrency, paced, retrying executor for one resource
/// class.
pub struct RetryExecutor {
    resource: &'static str,
    semaphore: Semaphore,
    pacer: DirectRateLimiter,
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create an executor for `resource`.
    ///
    /// `max_concurrent` bounds in-flight calls; `min_spacing` is the
    /// minimum interval between dispatch starts across all callers.
    pub fn new(resource: &'static str, max_concurrent: usize, min_spacing: Duration) -> Self {
        Self::with_policy(resource, max_concurrent, min_spacing, RetryPolicy::default())
    }

    /// Create with a custom retry policy.
    pub fn with_policy(
        resource: &'static str,
        max_concurrent: usize,
        min_spacing: Duration,
        mut policy: RetryPolicy,
    ) -> Self {
        policy.max_attempts = policy.max_attempts.max(1);
        let quota =
            Quota::with_period(min_spacing).unwrap_or_else(|| Quota::per_second(nonzero!(1u32)));
        Self {
            resource,
            semaphore: Semaphore::new(max_concurrent.max(1)),
            pacer: RateLimiter::direct(quota),
            policy,
        }
    }

    /// Run `op` under admission control, retrying on failure.
    ///
    /// Each attempt holds a concurrency permit and waits for a pacing
    /// slot before dispatching; backoff sleeps happen with the permit
    /// released. Exhausting the attempt budget surfaces the last error.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut last_err: Option<E> = None;

        for attempt in 0..self.policy.max_attempts {
            if attempt > 0 {
                let jitter = fastrand::f64() * MAX_JITTER;
                let delay = backoff_delay(&self.policy, attempt - 1, jitter);
                debug!(
                    resource = self.resource,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }

            let permit = self
                .semaphore
                .acquire()
                .await
                .expect("limiter semaphore is never closed");
            self.pacer.until_ready().await;

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let class = classify(&e);
                    warn!(
                        resource = self.resource,
                        attempt,
                        rate_limited = class == RetryClass::RateLimited,
                        error = %e,
                        "attempt failed"
                    );
                    last_err = Some(e);
                }
            }
            drop(permit);
        }

        // max_attempts is clamped to >= 1, so at least one attempt ran.
        Err(last_err.expect("at least one attempt was made"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base: Duration::from_millis(10),
            cap: Duration::from_millis(80),
        }
    }

    #[test]
    fn classify_detects_rate_limits() {
        assert_eq!(classify(&"HTTP 429 Too Many Requests"), RetryClass::RateLimited);
        assert_eq!(classify(&"quota exceeded for project"), RetryClass::RateLimited);
        assert_eq!(classify(&"connection reset by peer"), RetryClass::Transient);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base: Duration::from_secs(1),
            cap: Duration::from_secs(5),
        };
        assert_eq!(backoff_delay(&policy, 0, 0.0), Duration::from_secs(1));
        assert_eq!(backoff_delay(&policy, 1, 0.0), Duration::from_secs(2));
        assert_eq!(backoff_delay(&policy, 2, 0.0), Duration::from_secs(4));
        // Capped from 8s.
        assert_eq!(backoff_delay(&policy, 3, 0.0), Duration::from_secs(5));
    }

    #[test]
    fn backoff_with_jitter_is_nondecreasing() {
        let policy = RetryPolicy::default();
        // Worst case for monotonicity: max jitter now, none next.
        for i in 0..5 {
            let with_jitter = backoff_delay(&policy, i, MAX_JITTER);
            let next_plain = backoff_delay(&policy, i + 1, 0.0);
            assert!(next_plain >= with_jitter, "delay shrank at attempt {i}");
        }
    }

    #[tokio::test]
    async fn succeeds_on_fourth_attempt_after_three_failures() {
        let executor = RetryExecutor::with_policy(
            "probe",
            3,
            Duration::from_millis(1),
            fast_policy(6),
        );
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = executor
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 4 {
                        Err(format!("transient failure {n}"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn exhaustion_surfaces_last_error() {
        let executor = RetryExecutor::with_policy(
            "probe",
            1,
            Duration::from_millis(1),
            fast_policy(3),
        );
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = executor
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(format!("failure {n}")) }
            })
            .await;

        assert_eq!(result.unwrap_err(), "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn pacing_spaces_out_dispatches() {
        let executor = RetryExecutor::with_policy(
            "probe",
            4,
            Duration::from_millis(50),
            fast_policy(1),
        );

        let start = Instant::now();
        for _ in 0..3 {
            let _: Result<(), String> = executor.run(|| async { Ok(()) }).await;
        }
        // First dispatch is immediate, the next two wait ~50ms each.
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
