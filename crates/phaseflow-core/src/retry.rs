//! Timeout-bounded retries with capped exponential backoff.

use crate::config::EngineConfig;
use crate::error::{PhaseflowError, Result};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound on each attempt; the attempt's future is dropped when hit.
    pub timeout: Duration,
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            timeout: cfg.transform_timeout(),
            max_attempts: cfg.max_attempts,
            base_delay: Duration::from_millis(cfg.backoff_base_ms),
            max_delay: Duration::from_millis(cfg.backoff_cap_ms),
        }
    }

    /// Delay before attempt `attempt + 1`: `min(base * 2^(attempt-1), cap)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// What happened on one attempt, as seen by [`RetryExecutor::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone)]
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

    /// Run `op` until it succeeds or attempts run out. `op` receives the
    /// 1-based attempt number. Intermediate failures are logged; the caller
    /// sees only the final error, or `TimeoutExceeded` when the last attempt
    /// timed out.
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_observed(label, op, |_, _| {}).await
    }

    /// Like [`run`](Self::run), also reporting each attempt's outcome.
    pub async fn run_observed<T, F, Fut, O>(&self, label: &str, mut op: F, mut observe: O) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        O: FnMut(u32, AttemptOutcome),
    {
        let max = self.policy.attempts();
        let timeout_ms = self.policy.timeout.as_millis() as u64;
        let mut attempt = 1;

        loop {
            let err = match tokio::time::timeout(self.policy.timeout, op(attempt)).await {
                Ok(Ok(value)) => {
                    observe(attempt, AttemptOutcome::Succeeded);
                    if attempt > 1 {
                        tracing::info!(op = label, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => {
                    observe(attempt, AttemptOutcome::Failed);
                    e
                }
                Err(_) => {
                    observe(attempt, AttemptOutcome::TimedOut);
                    PhaseflowError::TimeoutExceeded {
                        attempts: attempt,
                        timeout_ms,
                    }
                }
            };

            if attempt >= max {
                tracing::error!(op = label, attempts = attempt, error = %err, "all attempts failed");
                return Err(err);
            }

            let delay = self.policy.backoff_delay(attempt);
            tracing::warn!(
                op = label,
                attempt,
                max_attempts = max,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "attempt failed; backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn policy(max_attempts: u32, timeout_ms: u64) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(timeout_ms),
            max_attempts,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(5_000),
        }
    }

    fn transient() -> PhaseflowError {
        PhaseflowError::Transform("flaky".to_string())
    }

    #[test]
    fn backoff_is_capped_and_non_decreasing() {
        let p = policy(10, 100);
        let delays: Vec<u64> = (1..=6).map(|a| p.backoff_delay(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 5_000, 5_000, 5_000]);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(p.backoff_delay(200), Duration::from_millis(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_max_minus_one_failures() {
        let calls = AtomicU32::new(0);
        let exec = RetryExecutor::new(policy(3, 500));
        let start = Instant::now();
        let out = exec
            .run("flaky", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(transient())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(out, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s + 2s of backoff between the three attempts
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3_000) && elapsed < Duration::from_millis(3_100));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_makes_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let exec = RetryExecutor::new(policy(4, 500));
        let err = exec
            .run("broken", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(transient()) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(matches!(err, PhaseflowError::Transform(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_attempts_time_out() {
        let outcomes = Mutex::new(Vec::new());
        let exec = RetryExecutor::new(policy(2, 200));
        let start = Instant::now();
        let err = exec
            .run_observed(
                "hang",
                |_| async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok::<_, PhaseflowError>(())
                },
                |attempt, outcome| outcomes.lock().unwrap().push((attempt, outcome)),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PhaseflowError::TimeoutExceeded {
                attempts: 2,
                timeout_ms: 200
            }
        ));
        assert_eq!(
            *outcomes.lock().unwrap(),
            vec![(1, AttemptOutcome::TimedOut), (2, AttemptOutcome::TimedOut)]
        );
        // two timeouts plus one backoff
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1_400) && elapsed < Duration::from_millis(1_500));
    }

    #[tokio::test(start_paused = true)]
    async fn error_after_timeout_reports_last_error() {
        let exec = RetryExecutor::new(policy(2, 100));
        let err = exec
            .run("mixed", |attempt| async move {
                if attempt == 1 {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err::<(), _>(transient())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PhaseflowError::Transform(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_runs_once() {
        let exec = RetryExecutor::new(policy(0, 100));
        let out = exec.run("once", |_| async { Ok::<_, PhaseflowError>(7) }).await;
        assert_eq!(out.unwrap(), 7);
    }
}
