//! Retry/backoff controller for stage invocations.
//!
//! Stateless and reentrant: the controller holds only its policy, so one
//! instance is shared by every concurrently running workflow. Each call gets
//! an optional deadline (expiry counts as `Transient`), rate-limited and
//! transient failures are retried with a growing delay, and `Fatal` failures
//! abort at once.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use skillpath_types::config::{BackoffKind, RetryPolicy};
use skillpath_types::stage::StageId;
use tokio_util::sync::CancellationToken;

use crate::stage::{ErrorClass, StageError};

// ---------------------------------------------------------------------------
// RetryController
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RetryController {
    policy: RetryPolicy,
    deadline: Option<Duration>,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            deadline: None,
        }
    }

    /// Bound every single invocation by `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn max_attempts(&self) -> u32 {
        self.policy.max_attempts.max(1)
    }

    /// Call `call` until it succeeds, fails fatally, runs out of attempts or
    /// `cancel` fires.
    ///
    /// Cancellation is observed between attempts and during backoff sleeps;
    /// an attempt already in flight runs to completion or to its deadline.
    pub async fn invoke<T, F, Fut>(
        &self,
        stage: StageId,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled {
                    stage,
                    attempts: attempt,
                });
            }
            attempt += 1;

            let result = match self.deadline {
                Some(deadline) => match tokio::time::timeout(deadline, call()).await {
                    Ok(result) => result,
                    Err(_) => Err(StageError::Timeout(deadline)),
                },
                None => call().await,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(stage = %stage, attempt, "stage succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if error.class() == ErrorClass::Fatal {
                tracing::warn!(stage = %stage, attempt, error = %error, "stage failed fatally");
                return Err(RetryError::Fatal { stage, error });
            }

            if attempt >= max_attempts {
                tracing::error!(
                    stage = %stage,
                    attempts = attempt,
                    error = %error,
                    "stage retries exhausted"
                );
                return Err(RetryError::Exhausted {
                    stage,
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = self.delay_for(attempt, error.retry_after());
            tracing::warn!(
                stage = %stage,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "stage failed, backing off"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(RetryError::Cancelled { stage, attempts: attempt });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Delay after the `failed_attempt`-th failure (1-based).
    ///
    /// A backend hint raises the delay to at least the hinted value; the
    /// result never exceeds `max_delay`.
    pub fn delay_for(&self, failed_attempt: u32, hint: Option<Duration>) -> Duration {
        let n = failed_attempt.max(1);
        let base = self.policy.base_delay();
        let max = self.policy.max_delay();

        let grown = match self.policy.backoff {
            BackoffKind::Linear => base.checked_mul(n),
            BackoffKind::Exponential => 2u32
                .checked_pow(n - 1)
                .and_then(|factor| base.checked_mul(factor)),
        };
        let mut delay = grown.unwrap_or(max).min(max);

        if self.policy.jitter && !delay.is_zero() {
            let ms = delay.as_millis() as u64;
            delay = Duration::from_millis(rand::rng().random_range(ms / 2..=ms));
        }

        match hint {
            Some(hint) => delay.max(hint).min(max),
            None => delay,
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Why a retried invocation gave up.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("stage {stage} exhausted {attempts} attempts: {last}")]
    Exhausted {
        stage: StageId,
        attempts: u32,
        last: StageError,
    },

    #[error("stage {stage} failed: {error}")]
    Fatal { stage: StageId, error: StageError },

    #[error("stage {stage} cancelled after {attempts} attempts")]
    Cancelled { stage: StageId, attempts: u32 },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32, backoff: BackoffKind) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 15_000,
            max_delay_ms: 120_000,
            backoff,
            jitter: false,
        }
    }

    fn rate_limited() -> StageError {
        StageError::RateLimited {
            message: "quota".to_string(),
            retry_after_ms: None,
        }
    }

    // -------------------------------------------------------------------
    // delay_for
    // -------------------------------------------------------------------

    #[test]
    fn test_linear_schedule_matches_defaults() {
        let controller = RetryController::new(RetryPolicy::default());
        assert_eq!(controller.delay_for(1, None), Duration::from_secs(15));
        assert_eq!(controller.delay_for(2, None), Duration::from_secs(30));
        assert_eq!(controller.delay_for(3, None), Duration::from_secs(45));
    }

    #[test]
    fn test_exponential_schedule_is_capped() {
        let controller = RetryController::new(policy(10, BackoffKind::Exponential));
        assert_eq!(controller.delay_for(1, None), Duration::from_secs(15));
        assert_eq!(controller.delay_for(2, None), Duration::from_secs(30));
        assert_eq!(controller.delay_for(3, None), Duration::from_secs(60));
        assert_eq!(controller.delay_for(4, None), Duration::from_secs(120));
        assert_eq!(controller.delay_for(40, None), Duration::from_secs(120));
    }

    #[test]
    fn test_retry_after_hint_raises_delay() {
        let controller = RetryController::new(RetryPolicy::default());
        assert_eq!(
            controller.delay_for(1, Some(Duration::from_secs(40))),
            Duration::from_secs(40)
        );
        assert_eq!(
            controller.delay_for(2, Some(Duration::from_secs(1))),
            Duration::from_secs(30)
        );
        assert_eq!(
            controller.delay_for(1, Some(Duration::from_secs(900))),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_jitter_stays_within_half_to_full() {
        let mut p = policy(3, BackoffKind::Linear);
        p.jitter = true;
        let controller = RetryController::new(p);
        for _ in 0..50 {
            let delay = controller.delay_for(2, None);
            assert!(delay >= Duration::from_secs(15) && delay <= Duration::from_secs(30));
        }
    }

    // -------------------------------------------------------------------
    // invoke
    // -------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_retry_ceiling_calls_exactly_max_attempts() {
        let controller = RetryController::new(policy(3, BackoffKind::Linear));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = controller
            .invoke(StageId::Evaluation, &CancellationToken::new(), || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(rate_limited())
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result.unwrap_err() {
            RetryError::Exhausted {
                stage,
                attempts,
                last,
            } => {
                assert_eq!(stage, StageId::Evaluation);
                assert_eq!(attempts, 3);
                assert!(matches!(last, StageError::RateLimited { .. }));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_between_attempts() {
        let controller = RetryController::new(policy(3, BackoffKind::Linear));
        let start = tokio::time::Instant::now();

        let result: Result<(), _> = controller
            .invoke(StageId::LessonAuthoring, &CancellationToken::new(), || async {
                Err(StageError::Transient("reset".to_string()))
            })
            .await;

        assert!(result.is_err());
        // 15s after the first failure, 30s after the second, none after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failure() {
        let controller = RetryController::new(policy(3, BackoffKind::Linear));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let value = controller
            .invoke(StageId::ResourceLookup, &CancellationToken::new(), || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(StageError::Transient("502".to_string()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let controller = RetryController::new(policy(3, BackoffKind::Linear));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = controller
            .invoke(StageId::Remediation, &CancellationToken::new(), || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(StageError::Fatal("401 unauthorized".to_string()))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::Fatal { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expiry_counts_as_transient() {
        let controller = RetryController::new(policy(2, BackoffKind::Linear))
            .with_deadline(Duration::from_secs(5));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = controller
            .invoke(StageId::Evaluation, &CancellationToken::new(), || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match result.unwrap_err() {
            RetryError::Exhausted { last, .. } => {
                assert!(matches!(last, StageError::Timeout(d) if d == Duration::from_secs(5)));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_further_attempts() {
        let controller = RetryController::new(policy(5, BackoffKind::Linear));
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let trigger = cancel.clone();

        let result: Result<(), _> = controller
            .invoke(StageId::RoadmapPlanning, &cancel, || {
                let counter = counter.clone();
                let trigger = trigger.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    trigger.cancel();
                    Err(rate_limited())
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(RetryError::Cancelled { attempts: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_max_attempts_still_calls_once() {
        let controller = RetryController::new(policy(0, BackoffKind::Linear));
        let result = controller
            .invoke(StageId::Evaluation, &CancellationToken::new(), || async {
                Ok::<_, StageError>("done")
            })
            .await;
        assert_eq!(result.unwrap(), "done");
    }
}
