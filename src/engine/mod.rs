//! Revalidation and mutation engines.
//!
//! A [`Cache`] owns the shared state (store, in-flight registry, mutation ledger and the
//! subscriber registries). Consumers attach [`Observer`]s to resources; an observer binds a
//! fetcher to a key, keeps the consumer-visible [`ResourceState`], and runs the
//! revalidation algorithm:
//!
//! ```text
//! revalidate(dedupe)
//!   -> join in-flight fetch | start fetch (registered with its start timestamp)
//!   -> await result
//!   -> ignore if a newer fetch started or a mutation overlapped/followed the start
//!   -> commit to store, clear error slot, broadcast to the other observers
//!   (failure) -> cache error, broadcast, schedule retry
//! ```
//!
//! Mutations ([`Cache::mutate`]) write optimistic or server-confirmed values, open and close
//! a mutation window so overlapping fetches are discarded, and drive a synchronized
//! revalidation of every observer of the key.

mod cache;
mod mutation;
mod observer;
mod probe;
mod retry;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub use cache::*;
use futures::future::BoxFuture;
use futures::FutureExt;
pub use mutation::*;
pub use observer::*;
pub use probe::*;
pub use retry::*;

use crate::FetchArgs;
use crate::FetchError;
use crate::FetchResult;
use crate::SharedFetch;


/// Values a cache can hold. `PartialEq` backs the default structural comparison.
pub trait CacheValue: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

/// Retrieval function bound to a resource
pub type Fetcher<V> = Arc<dyn Fn(FetchArgs) -> BoxFuture<'static, FetchResult<V>> + Send + Sync>;

/// Box an async closure into a [`Fetcher`]
pub fn fetcher<V, F, Fut>(f: F) -> Fetcher<V>
where
    F: Fn(FetchArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FetchResult<V>> + Send + 'static,
{
    Arc::new(move |args| f(args).boxed())
}

/// Returns true when the current data (if any) and a new value are equivalent
pub type Compare<V> = Arc<dyn Fn(Option<&V>, &V) -> bool + Send + Sync>;

pub(crate) fn default_compare<V: CacheValue>() -> Compare<V> {
    Arc::new(|current, new| current == Some(new))
}

/// Payload delivered to cache-update subscribers
#[derive(Debug, Clone)]
pub struct BroadcastEvent<V> {
    /// Whether the subscriber should re-fetch after applying the payload
    pub should_revalidate: bool,
    /// Committed data, `None` when only the error changed
    pub data: Option<V>,
    /// Committed error slot
    pub error: Option<FetchError>,
    /// Whether a re-fetch should join an in-flight request instead of starting one
    pub is_deduped: bool,
}

pub(crate) type CacheCallback<V> = Arc<dyn Fn(BroadcastEvent<V>) -> BoxFuture<'static, bool> + Send + Sync>;

/// Cache-update registration. Only subscribers that can start a fetch are eligible to be
/// the non-deduped primary of a broadcast.
pub(crate) struct CacheRevalidator<V> {
    pub(crate) callback: CacheCallback<V>,
    pub(crate) fetches: bool,
}

impl<V> Clone for CacheRevalidator<V> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
            fetches: self.fetches,
        }
    }
}

pub(crate) type TriggerCallback = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Explicit state of a resource
pub enum Peek<V> {
    Ready(V),
    Errored(FetchError),
    /// No data yet; the fetch currently in flight
    Pending(SharedFetch<V>),
}

impl<V: fmt::Debug> fmt::Debug for Peek<V> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Peek::Ready(v) => f.debug_tuple("Ready").field(v).finish(),
            Peek::Errored(e) => f.debug_tuple("Errored").field(e).finish(),
            Peek::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}
