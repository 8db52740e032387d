//! # Resilient Caller
//!
//! Executes one logical external call against an ordered list of backend
//! candidates. Each candidate gets the retry budget of its [`RetryPolicy`];
//! every attempt runs on a dedicated blocking-pool thread under a hard
//! deadline, so an opaque `work` future that never yields, or that blocks its
//! thread outright, cannot stall the caller.
//!
//! ## Candidate loop
//!
//! 1. An open circuit skips the candidate, except for the last one, which gets
//!    a single attempt so a request never starves outright.
//! 2. Transient failures (unavailable, timeout) retry with jittered
//!    exponential backoff until the budget is spent, then mark the candidate's
//!    class as failed and fall through to the next candidate.
//! 3. Non-transient and parse failures return immediately: they consume no
//!    retry budget and never open the circuit.
//! 4. The first success closes the circuit for its class and wins.
//!
//! A timed-out attempt is abandoned, not undone. The remote side may still
//! complete the work, so callers must treat a timeout as an unknown outcome.

use crate::error::{CallError, ResilienceError};
use crate::logging::log_call_attempt;
use crate::resilience::{BackendId, CircuitBreaker, RetryPolicy};
use chrono::{DateTime, Utc};
use futures::future::{abortable, Aborted};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Internal bookkeeping for one attempt; never persisted
#[derive(Debug, Clone)]
pub struct CallAttempt {
    pub backend_id: String,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(&'static str),
}

#[derive(Debug, Clone)]
pub struct ResilientCaller {
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
}

impl ResilientCaller {
    pub fn new(breaker: Arc<CircuitBreaker>, policy: RetryPolicy) -> Self {
        Self { breaker, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Run `work` against `candidates` in order until one succeeds
    pub async fn call<T, F, Fut>(
        &self,
        candidates: &[BackendId],
        work: F,
    ) -> Result<T, ResilienceError>
    where
        F: Fn(BackendId) -> Fut,
        Fut: Future<Output = Result<T, CallError>> + Send + 'static,
        T: Send + 'static,
    {
        let mut attempts: Vec<CallAttempt> = Vec::new();
        let mut last_error: Option<ResilienceError> = None;

        for (index, candidate) in candidates.iter().enumerate() {
            let is_last = index + 1 == candidates.len();

            let budget = if self.breaker.allow(&candidate.class) {
                self.policy.max_attempts
            } else if is_last {
                warn!(
                    backend = %candidate.id,
                    backend_class = %candidate.class,
                    "Circuit open on last candidate, attempting once to avoid starvation"
                );
                1
            } else {
                self.breaker.record_rejection(&candidate.class);
                debug!(
                    backend = %candidate.id,
                    backend_class = %candidate.class,
                    "Circuit open, skipping candidate"
                );
                continue;
            };

            match self
                .try_candidate(candidate, budget, &work, &mut attempts)
                .await
            {
                Ok(value) => {
                    self.breaker.record_success(&candidate.class);
                    if attempts.len() > 1 {
                        info!(
                            backend = %candidate.id,
                            attempts = attempts.len(),
                            "Call succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(error) if error.is_transient() => {
                    self.breaker.record_failure(&candidate.class, true);
                    warn!(
                        backend = %candidate.id,
                        error = %error,
                        "Candidate exhausted, falling back"
                    );
                    last_error = Some(error);
                }
                Err(error) => {
                    if matches!(error, ResilienceError::NonTransient { .. }) {
                        self.breaker.record_failure(&candidate.class, false);
                    }
                    warn!(
                        backend = %candidate.id,
                        kind = error.kind(),
                        error = %error,
                        "Call failed without retry"
                    );
                    return Err(error);
                }
            }
        }

        match last_error {
            Some(last) => Err(ResilienceError::AllBackendsExhausted {
                attempts: attempts.len(),
                last: Box::new(last),
            }),
            None => Err(ResilienceError::NoCandidates),
        }
    }

    async fn try_candidate<T, F, Fut>(
        &self,
        candidate: &BackendId,
        budget: u32,
        work: &F,
        attempts: &mut Vec<CallAttempt>,
    ) -> Result<T, ResilienceError>
    where
        F: Fn(BackendId) -> Fut,
        Fut: Future<Output = Result<T, CallError>> + Send + 'static,
        T: Send + 'static,
    {
        let mut attempt_index: u32 = 0;

        loop {
            let started_at = Utc::now();
            let started = Instant::now();
            let result = self.run_with_deadline(work(candidate.clone())).await;

            match result {
                Ok(value) => {
                    attempts.push(CallAttempt {
                        backend_id: candidate.id.clone(),
                        attempt_number: attempt_index + 1,
                        started_at,
                        outcome: AttemptOutcome::Succeeded,
                    });
                    if let Some(attempt) = attempts.last() {
                        log_call_attempt(attempt);
                    }
                    return Ok(value);
                }
                Err(call_error) => {
                    let error = ResilienceError::from_call(&candidate.id, call_error);
                    attempts.push(CallAttempt {
                        backend_id: candidate.id.clone(),
                        attempt_number: attempt_index + 1,
                        started_at,
                        outcome: AttemptOutcome::Failed(error.kind()),
                    });
                    if let Some(attempt) = attempts.last() {
                        log_call_attempt(attempt);
                    }
                    debug!(
                        backend = %candidate.id,
                        budget = budget,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Attempt failed"
                    );

                    if !error.is_transient() {
                        return Err(error);
                    }

                    attempt_index += 1;
                    if attempt_index >= budget {
                        return Err(error);
                    }

                    let delay = self.policy.delay_for(attempt_index - 1);
                    debug!(
                        backend = %candidate.id,
                        delay_ms = delay.as_millis() as u64,
                        "Backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Run one attempt on a blocking-pool thread, abandoning it at the
    /// deadline. The attempt never shares a thread with the timer, so a
    /// `work` future that blocks instead of yielding still times out, even
    /// on a current-thread runtime.
    async fn run_with_deadline<T, Fut>(&self, attempt: Fut) -> Result<T, CallError>
    where
        Fut: Future<Output = Result<T, CallError>> + Send + 'static,
        T: Send + 'static,
    {
        let deadline = self.policy.per_call_timeout;
        let runtime = Handle::current();
        let (attempt, abort) = abortable(attempt);
        let mut handle = tokio::task::spawn_blocking(move || runtime.block_on(attempt));

        match tokio::time::timeout(deadline, &mut handle).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(Aborted))) => Err(CallError::Timeout(deadline)),
            Ok(Err(join_error)) => Err(CallError::Rejected(format!(
                "backend call did not complete: {join_error}"
            ))),
            Err(_) => {
                // Wakes the attempt so it is dropped at its next await point;
                // a thread stuck in blocking code finishes on its own
                abort.abort();
                Err(CallError::Timeout(deadline))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitBreakerConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            jitter_max: Duration::ZERO,
            per_call_timeout: Duration::from_millis(50),
        }
    }

    fn candidates_are_broken() -> bool {
        true
    }

    fn caller(max_attempts: u32) -> ResilientCaller {
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            enabled: true,
            base_cooldown: Duration::from_secs(5),
            max_cooldown: Duration::from_secs(30),
        }));
        ResilientCaller::new(breaker, fast_policy(max_attempts))
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let caller = caller(3);
        let candidates = vec![BackendId::new("a", "class-a"), BackendId::new("b", "class-b")];

        let result = caller
            .call(&candidates, |backend| async move { Ok::<_, CallError>(backend.id) })
            .await;

        assert_eq!(result.unwrap(), "a");
    }

    #[tokio::test]
    async fn test_transient_failures_retry_up_to_budget() {
        let caller = caller(3);
        let calls = Arc::new(AtomicUsize::new(0));
        let candidates = vec![BackendId::new("a", "class-a")];

        let counter = Arc::clone(&calls);
        let result: Result<(), _> = caller
            .call(&candidates, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(CallError::Unavailable("overloaded".into())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(ResilienceError::AllBackendsExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last.kind(), "TransientUnavailable");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert!(!caller.breaker().allow("class-a"));
    }

    #[tokio::test]
    async fn test_non_transient_is_not_retried() {
        let caller = caller(4);
        let calls = Arc::new(AtomicUsize::new(0));
        let candidates = vec![BackendId::new("a", "class-a"), BackendId::new("b", "class-b")];

        let counter = Arc::clone(&calls);
        let result: Result<(), _> = caller
            .call(&candidates, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(CallError::Rejected("invalid api key".into())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().kind(), "NonTransient");
        assert!(caller.breaker().allow("class-a"));
    }

    #[tokio::test]
    async fn test_parse_failure_surfaces_immediately() {
        let caller = caller(4);
        let candidates = vec![BackendId::new("a", "class-a")];

        let result: Result<(), _> = caller
            .call(&candidates, |_| async {
                Err(CallError::Parse("expected JSON array".into()))
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), "ParseFailure");
        assert_eq!(caller.breaker().snapshot("class-a").consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out() {
        let caller = caller(1);
        let candidates = vec![BackendId::new("a", "class-a")];

        let started = Instant::now();
        let result: Result<(), _> = caller
            .call(&candidates, |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(started.elapsed() < Duration::from_secs(1));
        match result {
            Err(ResilienceError::AllBackendsExhausted { last, .. }) => {
                assert_eq!(last.kind(), "Timeout")
            }
            other => panic!("expected timeout exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blocking_attempt_times_out_on_current_thread_runtime() {
        let caller = caller(1);
        let candidates = vec![BackendId::new("a", "class-a")];

        let started = Instant::now();
        let result: Result<(), _> = caller
            .call(&candidates, |_| async {
                std::thread::sleep(Duration::from_millis(600));
                Ok(())
            })
            .await;

        assert!(
            started.elapsed() < Duration::from_millis(400),
            "deadline must fire while the attempt blocks its thread"
        );
        match result {
            Err(ResilienceError::AllBackendsExhausted { last, .. }) => {
                assert_eq!(last.kind(), "Timeout")
            }
            other => panic!("expected timeout exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_every_candidate_open_only_last_is_tried() {
        let caller = caller(3);
        caller.breaker().record_failure("class-a", true);
        caller.breaker().record_failure("class-b", true);
        let a_calls = Arc::new(AtomicUsize::new(0));
        let b_calls = Arc::new(AtomicUsize::new(0));
        let candidates = vec![BackendId::new("a", "class-a"), BackendId::new("b", "class-b")];

        let (a_counter, b_counter) = (Arc::clone(&a_calls), Arc::clone(&b_calls));
        let result = caller
            .call(&candidates, move |backend| {
                if backend.id == "a" {
                    a_counter.fetch_add(1, Ordering::SeqCst);
                } else {
                    b_counter.fetch_add(1, Ordering::SeqCst);
                }
                async move { Ok::<_, CallError>(backend.id) }
            })
            .await;

        assert_eq!(result.unwrap(), "b");
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);

        let metrics = caller.breaker().metrics();
        assert_eq!(metrics.per_class["class-a"].rejections, 1);
        assert_eq!(metrics.per_class["class-b"].rejections, 0);
        assert!(caller.breaker().allow("class-b"));
        assert!(!caller.breaker().allow("class-a"));
    }

    #[tokio::test]
    async fn test_open_last_candidate_still_gets_one_attempt() {
        let caller = caller(3);
        caller.breaker().record_failure("class-a", true);
        let calls = Arc::new(AtomicUsize::new(0));
        let candidates = vec![BackendId::new("a", "class-a")];

        let counter = Arc::clone(&calls);
        let result = caller
            .call(&candidates, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, CallError>("recovered") }
            })
            .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(caller.breaker().allow("class-a"));
    }

    #[tokio::test]
    async fn test_empty_candidate_list() {
        let caller = caller(3);
        let result: Result<(), _> = caller
            .call(&[], |_| async { Ok(()) })
            .await;
        assert_eq!(result.unwrap_err(), ResilienceError::NoCandidates);
    }

    #[tokio::test]
    async fn test_panicking_work_is_not_retried() {
        let caller = caller(3);
        let candidates = vec![BackendId::new("a", "class-a")];

        let result: Result<(), _> = caller
            .call(&candidates, |_| async {
                if candidates_are_broken() {
                    panic!("backend client bug");
                }
                Ok(())
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), "NonTransient");
    }
}
