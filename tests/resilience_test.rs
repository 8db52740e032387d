//! Integration tests for the circuit breaker, retry policy, and resilient
//! caller working together against scripted backends.

use hurriaid_core::error::{CallError, ResilienceError};
use hurriaid_core::resilience::{
    BackendId, BackendRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    InferenceClient, ResilientCaller, RetryPolicy,
};
use hurriaid_core::test_helpers::{fast_policy, ScriptStep, ScriptedBackend};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, Level};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn two_backend_client(
    a: Arc<ScriptedBackend>,
    b: Arc<ScriptedBackend>,
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
) -> InferenceClient {
    let registry = Arc::new(BackendRegistry::new().with_backend(a).with_backend(b));
    InferenceClient::new(
        registry,
        ResilientCaller::new(breaker, policy),
        vec![
            BackendId::new("backend-a", "class-a"),
            BackendId::new("backend-b", "class-b"),
        ],
    )
    .expect("both candidates are registered")
}

#[tokio::test]
async fn test_breaker_skips_failing_backend_after_it_opens() {
    init_tracing();
    info!("🧪 Failing primary opens its breaker, then gets skipped");

    let a = Arc::new(ScriptedBackend::new("backend-a").always(ScriptStep::Unavailable));
    let b = Arc::new(ScriptedBackend::new("backend-b").always(ScriptStep::reply("ok from b")));
    let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
    let client = two_backend_client(a.clone(), b.clone(), breaker.clone(), fast_policy(3));

    let first = client.generate("status?").await.unwrap();
    assert_eq!(first, "ok from b");
    assert_eq!(a.calls(), 3);
    assert_eq!(b.calls(), 1);
    assert_eq!(breaker.state("class-a"), CircuitState::Open);
    assert_eq!(breaker.state("class-b"), CircuitState::Closed);

    let second = client.generate("status?").await.unwrap();
    assert_eq!(second, "ok from b");
    assert_eq!(a.calls(), 3, "open breaker must skip backend-a entirely");
    assert_eq!(b.calls(), 2);

    let metrics = breaker.metrics();
    assert_eq!(metrics.per_class["class-a"].rejections, 1);
    assert_eq!(metrics.open_classes, vec!["class-a".to_string()]);
}

#[tokio::test]
async fn test_all_backends_exhausted_opens_every_breaker() {
    init_tracing();

    let a = Arc::new(ScriptedBackend::new("backend-a").always(ScriptStep::Unavailable));
    let b = Arc::new(ScriptedBackend::new("backend-b").always(ScriptStep::Unavailable));
    let breaker = Arc::new(CircuitBreaker::default());
    let client = two_backend_client(a.clone(), b.clone(), breaker.clone(), fast_policy(2));

    let error = client.generate("status?").await.unwrap_err();

    match &error {
        ResilienceError::AllBackendsExhausted { attempts, last } => {
            assert_eq!(*attempts, 4);
            assert_eq!(last.kind(), "TransientUnavailable");
        }
        other => panic!("expected AllBackendsExhausted, got {other:?}"),
    }
    assert_eq!(error.kind(), "AllBackendsExhausted");
    assert_eq!(breaker.state("class-a"), CircuitState::Open);
    assert_eq!(breaker.state("class-b"), CircuitState::Open);
    assert!(!breaker.metrics().is_healthy());
}

#[test]
fn test_backoff_sequence_doubles_to_cap() {
    let policy = RetryPolicy {
        max_attempts: 4,
        base_delay: Duration::from_millis(800),
        max_delay: Duration::from_secs(6),
        jitter_max: Duration::from_millis(350),
        per_call_timeout: Duration::from_secs(25),
    };

    let expected = [800, 1600, 3200, 6000];
    for (index, expected_ms) in expected.iter().enumerate() {
        let base = policy.base_delay_for(index as u32);
        assert_eq!(base, Duration::from_millis(*expected_ms));

        let jittered = policy.delay_for(index as u32);
        assert!(jittered >= base);
        assert!(jittered <= base + Duration::from_millis(350));
    }
}

#[tokio::test]
async fn test_breaker_opens_then_recovers() {
    let breaker = CircuitBreaker::new(CircuitBreakerConfig {
        enabled: true,
        base_cooldown: Duration::from_millis(30),
        max_cooldown: Duration::from_millis(60),
    });

    for _ in 0..3 {
        breaker.record_failure("class-a", true);
    }
    assert!(!breaker.allow("class-a"));
    assert_eq!(breaker.snapshot("class-a").consecutive_failures, 3);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(breaker.allow("class-a"));

    breaker.record_success("class-a");
    let snapshot = breaker.snapshot("class-a");
    assert_eq!(snapshot.consecutive_failures, 0);
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert!(snapshot.remaining_cooldown.is_none());
}

#[tokio::test]
async fn test_non_transient_failure_skips_retry_and_breaker() {
    let breaker = Arc::new(CircuitBreaker::default());
    let policy = RetryPolicy {
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(1),
        ..fast_policy(3)
    };
    let caller = ResilientCaller::new(breaker.clone(), policy);
    let calls = Arc::new(AtomicUsize::new(0));

    let started = Instant::now();
    let counter = calls.clone();
    let error = caller
        .call(&[BackendId::new("backend-a", "class-a")], move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(CallError::Rejected("API key not valid".into()))
            }
        })
        .await
        .unwrap_err();

    assert_eq!(error.kind(), "NonTransient");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() < Duration::from_millis(400), "no backoff sleep expected");

    let snapshot = breaker.snapshot("class-a");
    assert_eq!(snapshot.consecutive_failures, 0);
    assert_eq!(snapshot.state, CircuitState::Closed);
}

#[tokio::test]
async fn test_slow_work_reports_timeout_at_deadline() {
    let breaker = Arc::new(CircuitBreaker::default());
    let policy = RetryPolicy {
        per_call_timeout: Duration::from_millis(100),
        ..fast_policy(1)
    };
    let caller = ResilientCaller::new(breaker, policy);

    let started = Instant::now();
    let error = caller
        .call(&[BackendId::new("backend-a", "class-a")], |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, CallError>("too late")
        })
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    match error {
        ResilienceError::AllBackendsExhausted { last, .. } => {
            assert_eq!(last.kind(), "Timeout");
        }
        other => panic!("expected exhausted timeout, got {other:?}"),
    }
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");
}
