//! Case 1: Two observers attach to the same resource at the same time and both ask for a
//! deduplicated revalidation.
//!
//! Scenario:
//!
//! 1. Resource `user/1` is served by a fetcher answering `{id: 1, name: "A"}` after 10ms.
//! 2. Observers A and B attach and call `revalidate(dedupe)` concurrently.
//!
//! Expected Result:
//!
//! - The fetcher runs exactly once.
//! - Both observers see `{id: 1, name: "A"}`.
//! - The store holds the value and the error slot is undefined.

use std::time::Duration;

use swr_engine::Cache;
use swr_engine::ObserveOptions;
use swr_engine::RevalidateOptions;
use tracing_test::traced_test;

use crate::common::user;
use crate::common::CountingFetcher;
use crate::common::User;

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_concurrent_observers_share_one_fetch() {
    let cache = Cache::<User>::new();
    let remote = CountingFetcher::new(Duration::from_millis(10), Ok(user(1, "A")));

    let a = cache.observe("user/1", remote.fetcher.clone(), ObserveOptions::new());
    let b = cache.observe("user/1", remote.fetcher.clone(), ObserveOptions::new());

    let (ran_a, ran_b) = tokio::join!(
        a.revalidate(RevalidateOptions::deduped()),
        b.revalidate(RevalidateOptions::deduped())
    );
    assert!(ran_a && ran_b);

    assert_eq!(remote.calls(), 1);
    assert_eq!(a.data(), Some(user(1, "A")));
    assert_eq!(b.data(), Some(user(1, "A")));
    assert_eq!(cache.store().value("user/1"), Some(user(1, "A")));
    assert!(cache.store().get("err@user/1").is_some_and(|slot| slot.is_undefined()));
    assert!(cache.error("user/1").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_tasks_deduplicate_across_threads() {
    let cache = Cache::<User>::new();
    let remote = CountingFetcher::new(Duration::from_millis(50), Ok(user(1, "A")));

    let observers: Vec<_> = (0..16)
        .map(|_| cache.observe("user/1", remote.fetcher.clone(), ObserveOptions::new()))
        .collect();
    let tasks: Vec<_> = observers
        .iter()
        .map(|o| tokio::spawn(o.revalidate(RevalidateOptions::deduped())))
        .collect();
    for task in tasks {
        assert!(task.await.unwrap());
    }

    assert_eq!(remote.calls(), 1);
    for o in &observers {
        assert_eq!(o.data(), Some(user(1, "A")));
    }
}
