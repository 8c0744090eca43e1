//! Retry-with-backoff executor for a single generation call.
//!
//! ## Strategy
//!
//! 500 / 503 / 429 errors and empty replies from the model service are
//! transient. The executor waits `initial_delay * 2^(k-1) + jitter` before
//! attempt `k+1`, where jitter is uniform in `[0, max_jitter)`. With the
//! defaults (3 attempts, 1 s, 1 s jitter) the worst-case wait is under 5 s.
//! Jitter keeps concurrent clients from retrying in lock-step.
//!
//! The executor is a plain higher-order async function: the attempted
//! operation is a closure, so the same loop serves every feature.

use crate::error::TutorError;
use crate::generation::backend::GenerationBackend;
use crate::generation::request::{GenerationRequest, GenerationResponse};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Attempt budget and backoff base for [`execute_with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Always ≥ 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each round.
    pub initial_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to every delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: initial_delay.max(Duration::from_millis(1)),
            ..Default::default()
        }
    }

    /// Deterministic part of the wait before attempt `attempt + 1`
    /// (`attempt` is 1-based: the attempt that just failed).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }
}

/// Draw jitter uniformly from `[0, max)`.
pub fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

/// Run `operation` until it succeeds, fails terminally, or the attempt budget
/// is spent. The last error is returned unchanged.
pub async fn execute_with_retry<T, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, TutorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TutorError>>,
{
    let max_jitter = policy.max_jitter;
    execute_with_retry_using(policy, move || random_jitter(max_jitter), operation).await
}

/// [`execute_with_retry`] with a caller-supplied jitter source.
pub async fn execute_with_retry_using<T, F, Fut, J>(
    policy: &RetryPolicy,
    mut jitter: J,
    mut operation: F,
) -> Result<T, TutorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TutorError>>,
    J: FnMut() -> Duration,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let wait = policy.base_delay(attempt) + jitter();
                warn!(
                    "attempt {}/{} failed ({}); retrying in {}ms",
                    attempt,
                    max_attempts,
                    e,
                    wait.as_millis()
                );
                sleep(wait).await;
                attempt += 1;
            }
            Err(e) => {
                debug!("giving up after attempt {}/{}: {}", attempt, max_attempts, e);
                return Err(e);
            }
        }
    }
}

/// Call the backend once per attempt, treating text-less replies as
/// retryable [`TutorError::EmptyResponse`].
pub async fn generate_with_retry(
    backend: &dyn GenerationBackend,
    request: &GenerationRequest,
    policy: &RetryPolicy,
) -> Result<GenerationResponse, TutorError> {
    execute_with_retry(policy, move || async move {
        let response = backend.generate(request).await?;
        if response.is_empty() {
            return Err(TutorError::EmptyResponse);
        }
        Ok(response)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn unavailable() -> TutorError {
        TutorError::ServiceUnavailable {
            detail: "503".into(),
        }
    }

    #[test]
    fn base_delay_doubles() {
        let p = RetryPolicy::new(5, Duration::from_millis(500));
        assert_eq!(p.base_delay(1), Duration::from_millis(500));
        assert_eq!(p.base_delay(2), Duration::from_millis(1000));
        assert_eq!(p.base_delay(3), Duration::from_millis(2000));
    }

    #[test]
    fn policy_clamps_to_one_attempt() {
        let p = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(p.max_attempts, 1);
        assert!(p.initial_delay > Duration::ZERO);
    }

    #[test]
    fn jitter_is_bounded() {
        for _ in 0..200 {
            assert!(random_jitter(Duration::from_millis(1000)) < Duration::from_millis(1000));
        }
        assert_eq!(random_jitter(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(4, Duration::from_millis(10));
        let c = Arc::clone(&calls);
        let out = execute_with_retry(&policy, move || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(unavailable())
                } else {
                    Ok("done")
                }
            }
        })
        .await
        .expect("third attempt succeeds");
        assert_eq!(out, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_reply_is_retried() {
        struct Flaky(AtomicU32);
        impl GenerationBackend for Flaky {
            fn generate<'a>(
                &'a self,
                _request: &'a GenerationRequest,
            ) -> futures::future::BoxFuture<'a, Result<GenerationResponse, TutorError>> {
                Box::pin(async move {
                    if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                        Ok(GenerationResponse::text("   "))
                    } else {
                        Ok(GenerationResponse::text("hello"))
                    }
                })
            }
        }

        let backend = Flaky(AtomicU32::new(0));
        let req = GenerationRequest::prompt("hi");
        let res = generate_with_retry(&backend, &req, &RetryPolicy::new(2, Duration::from_millis(5)))
            .await
            .expect("second attempt has text");
        assert_eq!(res.text, "hello");
        assert_eq!(backend.0.load(Ordering::SeqCst), 2);
    }
}
