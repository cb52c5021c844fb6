//! End-to-end scenarios for the breaker + retry composition

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use todos_resilience::{
    CircuitBreakerConfig, CircuitState, Dependency, ResilienceError, RetryPolicy, STORE,
};
use tokio::time::advance;

fn store_dependency() -> Dependency {
    Dependency::new(
        STORE,
        CircuitBreakerConfig {
            failure_threshold: 3,
            reset_timeout: Duration::from_millis(10_000),
            half_open_max_calls: 1,
        },
        RetryPolicy::new(3, Duration::from_millis(100), Duration::from_millis(2000)),
    )
}

async fn exhausted_call(dependency: &Dependency, invocations: &AtomicU32) -> ResilienceError<String> {
    dependency
        .call(|| {
            invocations.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("store unavailable".to_string()) }
        })
        .await
        .unwrap_err()
}

#[tokio::test(start_paused = true)]
async fn sustained_outage_opens_then_probes_after_reset_timeout() {
    let dependency = store_dependency();
    let invocations = AtomicU32::new(0);

    for _ in 0..3 {
        let error = exhausted_call(&dependency, &invocations).await;
        assert!(matches!(error, ResilienceError::RetryExhausted { attempts: 3, .. }));
    }
    assert_eq!(dependency.breaker().state(), CircuitState::Open);
    assert_eq!(invocations.load(Ordering::SeqCst), 9);

    // 5s after the third failure: rejected without invoking
    advance(Duration::from_millis(5_000)).await;
    let error = exhausted_call(&dependency, &invocations).await;
    assert!(error.is_circuit_open());
    assert_eq!(invocations.load(Ordering::SeqCst), 9);

    // 11s after the third failure: admitted as a half-open probe
    advance(Duration::from_millis(6_000)).await;
    let probe = dependency
        .call(|| {
            invocations.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>("recovered") }
        })
        .await;
    assert_eq!(probe.unwrap(), "recovered");
    assert_eq!(invocations.load(Ordering::SeqCst), 10);

    let snapshot = dependency.breaker().snapshot();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_probe_reopens_immediately() {
    let dependency = store_dependency();
    let invocations = AtomicU32::new(0);

    for _ in 0..3 {
        exhausted_call(&dependency, &invocations).await;
    }
    advance(Duration::from_millis(10_000)).await;

    let error = exhausted_call(&dependency, &invocations).await;
    assert!(matches!(error, ResilienceError::RetryExhausted { .. }));
    assert_eq!(dependency.breaker().state(), CircuitState::Open);

    let error = exhausted_call(&dependency, &invocations).await;
    assert!(error.is_circuit_open());
}

#[tokio::test(start_paused = true)]
async fn retried_blips_leave_failure_count_unchanged() {
    let dependency = store_dependency();
    let invocations = AtomicU32::new(0);

    // One real failure first so the count is non-zero
    exhausted_call(&dependency, &invocations).await;
    assert_eq!(dependency.breaker().snapshot().failure_count, 1);

    let attempt = AtomicU32::new(0);
    let result = dependency
        .call(|| {
            let n = attempt.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("blip".to_string())
                } else {
                    Ok(n)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 2);
    assert_eq!(attempt.load(Ordering::SeqCst), 3);
    // Net success of the sequence resets the consecutive count
    assert_eq!(dependency.breaker().snapshot().failure_count, 0);
    assert_eq!(dependency.breaker().snapshot().metrics.total_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_trial_slot() {
    let dependency = Arc::new(store_dependency());
    let invocations = AtomicU32::new(0);
    for _ in 0..3 {
        exhausted_call(&dependency, &invocations).await;
    }
    advance(Duration::from_millis(10_000)).await;

    let calls = Arc::new(AtomicU32::new(0));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let dependency = dependency.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            dependency
                .call(|| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, String>(())
                    }
                })
                .await
        }));
    }

    let results = futures::future::join_all(handles).await;
    let admitted = results
        .into_iter()
        .map(|joined| joined.unwrap())
        .filter(Result::is_ok)
        .count();

    assert_eq!(admitted, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(dependency.breaker().state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn concurrent_failures_open_exactly_once() {
    let dependency = Arc::new(Dependency::new(
        STORE,
        CircuitBreakerConfig::default(),
        RetryPolicy::no_retry(),
    ));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let dependency = dependency.clone();
        handles.push(tokio::spawn(async move {
            dependency
                .call(|| async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Err::<(), _>("down".to_string())
                })
                .await
        }));
    }
    futures::future::join_all(handles).await;

    let snapshot = dependency.breaker().snapshot();
    assert_eq!(snapshot.state, CircuitState::Open);
    assert_eq!(snapshot.failure_count, 3);
}
