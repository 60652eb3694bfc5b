//! Case 1: A local mutation of an observed resource with no fetch in flight.
//!
//! Scenario:
//!
//! 1. An observer is attached to `user/1`; nothing has been fetched yet.
//! 2. `mutate("user/1", {id: 1, name: "B"}, should_revalidate = false)` is called.
//!
//! Expected Result:
//!
//! - The store holds `{id: 1, name: "B"}` as soon as `mutate` returns.
//! - The observer sees the new value.
//! - The fetcher is never invoked.

use std::time::Duration;

use swr_engine::Cache;
use swr_engine::ObserveOptions;
use swr_engine::RevalidateOptions;

use crate::common::user;
use crate::common::CountingFetcher;
use crate::common::User;

#[tokio::test(start_paused = true)]
async fn test_local_mutation_skips_fetcher() {
    let cache = Cache::<User>::new();
    let remote = CountingFetcher::new(Duration::from_millis(10), Ok(user(1, "A")));
    let o = cache.observe("user/1", remote.fetcher.clone(), ObserveOptions::new());

    let value = cache.mutate("user/1", Some(user(1, "B").into()), false).await.unwrap();

    assert_eq!(value, Some(user(1, "B")));
    assert_eq!(cache.store().value("user/1"), Some(user(1, "B")));
    assert_eq!(o.data(), Some(user(1, "B")));
    assert_eq!(remote.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_optimistic_mutation_then_server_confirmation() {
    let cache = Cache::<User>::new();
    let remote = CountingFetcher::new(Duration::from_millis(10), Ok(user(1, "server")));
    let a = cache.observe("user/1", remote.fetcher.clone(), ObserveOptions::new());
    let b = cache.observe("user/1", remote.fetcher.clone(), ObserveOptions::new());
    a.revalidate(RevalidateOptions::deduped()).await;

    let value = cache.mutate("user/1", Some(user(1, "local").into()), true).await.unwrap();

    // every observer converged on the server answer, fetched once more
    assert_eq!(value, Some(user(1, "server")));
    assert_eq!(remote.calls(), 2);
    assert_eq!(a.data(), Some(user(1, "server")));
    assert_eq!(b.data(), Some(user(1, "server")));
}
