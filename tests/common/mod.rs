use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use swr_engine::fetcher;
use swr_engine::FetchResult;
use swr_engine::Fetcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub name: String,
}

pub fn user(
    id: u64,
    name: &str,
) -> User {
    User {
        id,
        name: name.to_string(),
    }
}

/// Fetcher answering `result` after `latency`, counting its invocations
pub struct CountingFetcher<V> {
    pub fetcher: Fetcher<V>,
    calls: Arc<AtomicUsize>,
}

impl<V> CountingFetcher<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(
        latency: Duration,
        result: FetchResult<V>,
    ) -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let fetcher = fetcher(move |_args| {
            counter.fetch_add(1, Ordering::SeqCst);
            let result = result.clone();
            async move {
                tokio::time::sleep(latency).await;
                result
            }
        });
        Self { fetcher, calls }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
