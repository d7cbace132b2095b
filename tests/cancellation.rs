use secondwind::classify::{OperationError, ServiceCode};
use secondwind::{
    CancelSource, CancelToken, RecordingObserver, RetryCoordinator, RetryEvent, RetryPolicy,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn busy() -> OperationError {
    OperationError::service(ServiceCode::Unavailable, "busy")
}

#[tokio::test(start_paused = true)]
async fn cancel_during_delay_stops_further_attempts() {
    let source = CancelSource::new();
    let token = source.token();
    let calls = Arc::new(AtomicU32::new(0));
    let observer = RecordingObserver::new();
    let coordinator = RetryCoordinator::builder().observer(observer.clone()).build();

    let counter = calls.clone();
    let run = tokio::spawn(async move {
        coordinator
            .run_cancellable(&RetryPolicy::default(), &token, move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(busy())
                }
            })
            .await
    });

    // first delay is at least 800ms; cancel well inside it
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    source.cancel();

    let err = run.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.attempts(), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        observer.events().last(),
        Some(&RetryEvent::Cancelled { label: "operation".into(), attempts: 1 })
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_returns_without_waiting_out_the_delay() {
    let source = CancelSource::new();
    let token = source.token();
    let policy = RetryPolicy::builder()
        .initial_delay(Duration::from_secs(10))
        .max_delay(Duration::from_secs(10))
        .build()
        .unwrap();
    let coordinator = RetryCoordinator::new();

    let started = tokio::time::Instant::now();
    let run = tokio::spawn(async move {
        coordinator.run_cancellable(&policy, &token, || async { Err::<(), _>(busy()) }).await
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    source.cancel();

    let err = run.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(8));
}

#[tokio::test]
async fn in_flight_attempt_finishes_before_cancellation_applies() {
    let source = CancelSource::new();
    let token = source.token();
    let calls = AtomicU32::new(0);
    let coordinator = RetryCoordinator::new();

    let value = coordinator
        .run_cancellable(&RetryPolicy::default(), &token, || {
            calls.fetch_add(1, Ordering::SeqCst);
            source.cancel();
            async { Ok::<_, OperationError>("finished") }
        })
        .await
        .unwrap();

    assert_eq!(value, "finished");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn never_token_does_not_cancel() {
    let coordinator = RetryCoordinator::builder().sleeper(secondwind::InstantSleeper).build();
    let err = coordinator
        .run_cancellable(&RetryPolicy::default(), &CancelToken::never(), || async {
            Err::<(), _>(busy())
        })
        .await
        .unwrap_err();
    assert!(!err.is_cancelled());
    assert_eq!(err.attempts(), 3);
}
