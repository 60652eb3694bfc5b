//! Case 1: A permanently failing resource with `error_retry_count = 2`.
//!
//! Expected Result:
//!
//! - One initial fetch plus exactly two automatic retries.
//! - The cached error stays available and the observer keeps its last good value.

use std::time::Duration;

use swr_engine::Cache;
use swr_engine::CacheConfig;
use swr_engine::FetchError;
use swr_engine::ObserveOptions;
use swr_engine::RevalidateOptions;
use swr_engine::Stored;
use tokio::time::sleep;

use crate::common::CountingFetcher;

#[tokio::test(start_paused = true)]
async fn test_retries_stop_at_error_retry_count() {
    let mut config = CacheConfig::default();
    config.retry.error_retry_interval_ms = 100;
    config.retry.error_retry_count = Some(2);
    let cache = Cache::<u32>::with_config(config);
    cache.store().set("stats", Stored::Value(7));

    let remote = CountingFetcher::<u32>::new(Duration::from_millis(5), Err(FetchError::msg("503")));
    let o = cache.observe("stats", remote.fetcher.clone(), ObserveOptions::new());

    assert!(o.revalidate(RevalidateOptions::deduped()).await);
    sleep(Duration::from_secs(600)).await;

    assert_eq!(remote.calls(), 3);
    assert_eq!(o.data(), Some(7));
    assert_eq!(o.error().map(|e| e.to_string()), Some("503".to_string()));
    assert!(cache.error("stats").is_some());
}
