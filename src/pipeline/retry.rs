//! Bounded retry with exponential backoff around the extraction client.
//!
//! ## Retry Strategy
//!
//! Attempts run strictly one after another. After failed attempt `n`
//! (0-based) the loop waits `base_delay * 2^n` before the next one: with the
//! default 3 s base that is 3 s → 6 s → 12 s. There is no jitter and no cap,
//! and there is no wait after the last attempt. When every attempt fails the
//! caller receives the error from the last one, unchanged.
//!
//! Every error kind is retried the same way, including an invalid credential
//! that cannot possibly succeed on a later attempt. That matches how the
//! review tool has always behaved; it may well be unintended, so it is kept
//! rather than quietly changed. [`RetryPolicy::retry_if`] is the hook for a
//! kind-aware policy (see [`crate::error::ErrorKind::is_transient`]).

use crate::error::ReviewError;
use crate::observer::{NoopObserver, ReviewObserver, SharedObserver};
use crate::pipeline::extract::ExtractionClient;
use crate::schema::ReviewTable;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Decides whether a failed attempt may be retried.
pub type RetryPredicate = Arc<dyn Fn(&ReviewError) -> bool + Send + Sync>;

/// How many times to try, and how long to wait in between.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    retry_if: RetryPredicate,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(3))
    }
}

impl RetryPolicy {
    /// Retry every error. `max_attempts` below 1 is treated as 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            retry_if: Arc::new(|_| true),
        }
    }

    /// Only retry errors for which `predicate` returns `true`.
    pub fn retry_if(
        mut self,
        predicate: impl Fn(&ReviewError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.retry_if = Arc::new(predicate);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before the attempt following failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

/// Run `op` until it succeeds or the policy gives up.
///
/// `op` receives the 0-based attempt index.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    observer: &dyn ReviewObserver,
    mut op: F,
) -> Result<T, ReviewError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ReviewError>>,
{
    let max = policy.max_attempts;
    let mut attempt = 0u32;

    loop {
        info!("Attempt {}/{}", attempt + 1, max);
        observer.on_attempt_start(attempt + 1, max);

        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        warn!("Attempt {} failed: {}", attempt + 1, err);
        observer.on_attempt_failed(attempt + 1, max, &err);

        if attempt + 1 >= max {
            error!("All {} attempts failed", max);
            observer.on_review_failed(attempt + 1, &err);
            return Err(err);
        }
        if !(policy.retry_if)(&err) {
            error!("Attempt {} failed with a non-retryable error", attempt + 1);
            observer.on_review_failed(attempt + 1, &err);
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        info!("Retrying in {:?}...", delay);
        observer.on_retry_scheduled(attempt + 2, delay);
        sleep(delay).await;
        attempt += 1;
    }
}

/// Wraps an [`ExtractionClient`] with a [`RetryPolicy`].
#[derive(Clone)]
pub struct ReviewOrchestrator {
    client: ExtractionClient,
    policy: RetryPolicy,
    observer: SharedObserver,
}

impl ReviewOrchestrator {
    pub fn new(client: ExtractionClient, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Extract a review table from `paths`, retrying per the policy.
    ///
    /// Each attempt re-reads and re-converts the documents.
    pub async fn run(
        &self,
        paths: &[PathBuf],
        prompt_template: &str,
        credential: &str,
        model: &str,
    ) -> Result<ReviewTable, ReviewError> {
        self.observer.on_review_start(paths.len());
        let observer = self.observer.as_ref();
        let client = &self.client;
        let attempts = AtomicU32::new(0);
        let counter = &attempts;

        let table = run_with_retry(&self.policy, observer, move |n| {
            counter.store(n + 1, Ordering::Relaxed);
            client.extract_documents(paths, prompt_template, credential, model)
        })
        .await?;

        observer.on_review_complete(table.len(), attempts.load(Ordering::Relaxed));
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Paused-clock timers fire on millisecond ticks.
    fn assert_about(actual: Duration, expected: Duration) {
        let slack = Duration::from_millis(5);
        assert!(
            actual >= expected && actual <= expected + slack,
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ReviewObserver for Recorder {
        fn on_attempt_start(&self, attempt: u32, max: u32) {
            self.events.lock().unwrap().push(format!("start {attempt}/{max}"));
        }
        fn on_retry_scheduled(&self, next: u32, delay: Duration) {
            self.events
                .lock()
                .unwrap()
                .push(format!("wait {}s before {next}", delay.as_secs()));
        }
        fn on_review_failed(&self, attempts: u32, _error: &ReviewError) {
            self.events.lock().unwrap().push(format!("failed after {attempts}"));
        }
    }

    #[test]
    fn delays_double_from_base() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(0), Duration::from_secs(3));
        assert_eq!(p.delay_for(1), Duration::from_secs(6));
        assert_eq!(p.delay_for(2), Duration::from_secs(12));
        assert_eq!(p.delay_for(60), Duration::MAX);
    }

    #[test]
    fn zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_makes_exactly_max_attempts_with_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_secs(3));
        let recorder = Recorder::default();
        let start = Instant::now();
        let mut seen: Vec<(u32, Duration)> = Vec::new();

        let result: Result<(), _> = run_with_retry(&policy, &recorder, |n| {
            seen.push((n, start.elapsed()));
            async move {
                Err(ReviewError::Transport {
                    message: format!("failure #{}", n + 1),
                })
            }
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("failure #3"), "last error wins: {err}");
        let indices: Vec<u32> = seen.iter().map(|(n, _)| *n).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_about(seen[0].1, Duration::ZERO);
        assert_about(seen[1].1, Duration::from_secs(3));
        assert_about(seen[2].1, Duration::from_secs(9));
        // No wait after the final attempt.
        assert_about(start.elapsed(), Duration::from_secs(9));
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![
                "start 1/3",
                "wait 3s before 2",
                "start 2/3",
                "wait 6s before 3",
                "start 3/3",
                "failed after 3",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_second_attempt_stops_retrying() {
        let policy = RetryPolicy::new(3, Duration::from_secs(3));
        let mut calls = 0;
        let value = run_with_retry(&policy, &NoopObserver, |n| {
            calls += 1;
            async move {
                if n == 0 {
                    Err(ReviewError::transport("connection reset"))
                } else {
                    Ok("table")
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, "table");
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_credential_is_retried_by_default() {
        let policy = RetryPolicy::new(3, Duration::from_secs(3));
        let mut calls = 0;
        let err = run_with_retry(&policy, &NoopObserver, |_| {
            calls += 1;
            async { Err::<(), _>(ReviewError::InvalidCredential) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredential);
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn predicate_stops_on_terminal_errors() {
        let policy =
            RetryPolicy::new(5, Duration::from_secs(3)).retry_if(|e| e.kind().is_transient());
        let start = Instant::now();
        let mut calls = 0;
        let err = run_with_retry(&policy, &NoopObserver, |_| {
            calls += 1;
            async { Err::<(), _>(ReviewError::InvalidCredential) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidCredential));
        assert_eq!(calls, 1);
        assert_about(start.elapsed(), Duration::ZERO);
    }
}
