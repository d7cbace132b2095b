use secondwind::classify::{OperationError, ServiceCode};
use secondwind::{
    CancelSource, CancelToken, InstantSleeper, RetryCoordinator, RetryOutcome, RetryPolicy,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};

#[tokio::test]
async fn callback_receives_success_once() {
    let coordinator = RetryCoordinator::builder().sleeper(InstantSleeper).build();
    let fired = Arc::new(AtomicU32::new(0));
    let calls = Arc::new(AtomicU32::new(0));
    let (tx, rx) = oneshot::channel();

    let counter = calls.clone();
    let fired_in_callback = fired.clone();
    let handle = coordinator.spawn_with_callback(
        &Handle::current(),
        RetryPolicy::default(),
        CancelToken::never(),
        move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(OperationError::service(ServiceCode::Aborted, "conflict"))
                } else {
                    Ok(99u32)
                }
            }
        },
        move |outcome: RetryOutcome<u32, OperationError>| {
            fired_in_callback.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(outcome);
        },
    );

    handle.await.unwrap();
    assert_eq!(rx.await.unwrap().unwrap(), 99);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn callback_receives_terminal_failure() {
    let coordinator = RetryCoordinator::builder().sleeper(InstantSleeper).build();
    let (tx, rx) = oneshot::channel();

    coordinator
        .spawn_with_callback(
            &Handle::current(),
            RetryPolicy::default(),
            CancelToken::never(),
            || async { Err::<(), _>(OperationError::service(ServiceCode::RetryLimitExceeded, "quota")) },
            move |outcome| {
                let _ = tx.send(outcome);
            },
        )
        .await
        .unwrap();

    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(err.attempts(), 1);
    assert!(!err.is_cancelled());
}

#[tokio::test]
async fn aborted_task_still_fires_callback_once() {
    let coordinator = RetryCoordinator::new();
    let started = Arc::new(Notify::new());
    let fired = Arc::new(AtomicU32::new(0));
    let (tx, rx) = oneshot::channel();

    let notify = started.clone();
    let fired_in_callback = fired.clone();
    let handle = coordinator.spawn_with_callback(
        &Handle::current(),
        RetryPolicy::default(),
        CancelToken::never(),
        move || {
            let notify = notify.clone();
            async move {
                notify.notify_one();
                std::future::pending::<Result<(), OperationError>>().await
            }
        },
        move |outcome| {
            fired_in_callback.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(outcome);
        },
    );

    started.notified().await;
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    let err = rx.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.attempts(), 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_delay_fires_callback_once() {
    let coordinator = RetryCoordinator::new();
    let source = CancelSource::new();
    let failed = Arc::new(Notify::new());
    let calls = Arc::new(AtomicU32::new(0));
    let fired = Arc::new(AtomicU32::new(0));
    let (tx, rx) = oneshot::channel();

    let notify = failed.clone();
    let counter = calls.clone();
    let fired_in_callback = fired.clone();
    let handle = coordinator.spawn_with_callback(
        &Handle::current(),
        RetryPolicy::default(),
        source.token(),
        move || {
            let notify = notify.clone();
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                notify.notify_one();
                Err::<(), _>(OperationError::service(ServiceCode::Unavailable, "busy"))
            }
        },
        move |outcome| {
            fired_in_callback.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(outcome);
        },
    );

    failed.notified().await;
    source.cancel();
    handle.await.unwrap();

    let err = rx.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.attempts(), 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn runtime_shutdown_fires_callback() {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
    let coordinator = RetryCoordinator::new();
    let fired = Arc::new(AtomicU32::new(0));
    let attempts = Arc::new(AtomicU32::new(u32::MAX));

    let fired_in_callback = fired.clone();
    let attempts_in_callback = attempts.clone();
    let _handle = coordinator.spawn_with_callback(
        runtime.handle(),
        RetryPolicy::default(),
        CancelToken::never(),
        || async { Ok::<_, OperationError>(()) },
        move |outcome| {
            fired_in_callback.fetch_add(1, Ordering::SeqCst);
            if let Err(err) = outcome {
                attempts_in_callback.store(err.attempts(), Ordering::SeqCst);
            }
        },
    );

    // never driven: the task is dropped with the runtime
    drop(runtime);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 0);
}
