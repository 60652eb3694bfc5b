use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::async_task::spawn_after;
use crate::async_task::spawn_detached_after;

#[tokio::test(start_paused = true)]
async fn test_spawn_after_runs_once_delay_elapses() {
    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();

    let handle = spawn_after("test_task", Duration::from_millis(100), CancellationToken::new(), async move {
        c.fetch_add(1, Ordering::SeqCst);
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    handle.await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_spawn_after_skips_task_when_cancelled() {
    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();
    let token = CancellationToken::new();

    let handle = spawn_after("test_task", Duration::from_millis(100), token.clone(), async move {
        c.fetch_add(1, Ordering::SeqCst);
    });
    token.cancel();

    handle.await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_spawn_detached_after() {
    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();

    spawn_detached_after(Duration::from_secs(2), async move {
        c.fetch_add(1, Ordering::SeqCst);
    })
    .await
    .unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
