//! Case 2: An older, slower response must not overwrite a newer one.
//!
//! Scenario:
//!
//! 1. Fetch F1 for `feed` starts and takes 100ms.
//! 2. 10ms later fetch F2 starts (no dedupe) and takes 10ms.
//!
//! Expected Result:
//!
//! - F2's value is committed at 20ms.
//! - F1 settles at 100ms and is discarded; its revalidation reports `false`.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use swr_engine::fetcher;
use swr_engine::Cache;
use swr_engine::ObserveOptions;
use swr_engine::RevalidateOptions;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_last_started_fetch_wins() {
    let cache = Cache::<String>::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let f = fetcher(move |_| {
        let (latency, body) = match c.fetch_add(1, Ordering::SeqCst) {
            0 => (100, "v1"),
            _ => (10, "v2"),
        };
        async move {
            sleep(Duration::from_millis(latency)).await;
            Ok(body.to_string())
        }
    });
    let o = cache.observe("feed", f, ObserveOptions::new());

    let first = tokio::spawn(o.revalidate(RevalidateOptions::default()));
    sleep(Duration::from_millis(10)).await;
    assert!(o.revalidate(RevalidateOptions::default()).await);
    assert_eq!(cache.data("feed"), Some("v2".to_string()));

    assert!(!first.await.unwrap());
    assert_eq!(cache.data("feed"), Some("v2".to_string()));
    assert_eq!(o.data(), Some("v2".to_string()));
}
