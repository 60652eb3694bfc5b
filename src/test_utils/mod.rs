//! Shared helpers for the unit tests of every module
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::fetcher;
use crate::CacheConfig;
use crate::FetchResult;
use crate::Fetcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct User {
    pub id: u64,
    pub name: String,
}

pub(crate) fn user(
    id: u64,
    name: &str,
) -> User {
    User {
        id,
        name: name.to_string(),
    }
}

/// Fetcher whose n-th invocation (0-based) settles with `script(n)` after the paired delay.
/// The returned counter tracks invocations.
pub(crate) fn scripted_fetcher<V, F>(script: F) -> (Fetcher<V>, Arc<AtomicUsize>)
where
    V: Send + 'static,
    F: Fn(usize) -> (Duration, FetchResult<V>) + Send + Sync + 'static,
{
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let f = fetcher(move |_args| {
        let (delay, result) = script(counter.fetch_add(1, Ordering::SeqCst));
        async move {
            tokio::time::sleep(delay).await;
            result
        }
    });
    (f, calls)
}

/// Fetcher that always settles with a clone of `result` after `delay`
pub(crate) fn fixed_fetcher<V>(
    delay: Duration,
    result: FetchResult<V>,
) -> (Fetcher<V>, Arc<AtomicUsize>)
where
    V: Clone + Send + Sync + 'static,
{
    scripted_fetcher(move |_| (delay, result.clone()))
}

pub(crate) fn calls(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Defaults with retries disabled, so failing fetchers settle deterministically
pub(crate) fn no_retry_config() -> CacheConfig {
    let mut config = CacheConfig::default();
    config.retry.should_retry_on_error = false;
    config
}

pub(crate) fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
