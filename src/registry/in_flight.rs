use std::fmt;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::future::Shared;
use tracing::trace;

use crate::time::Timestamp;
use crate::FetchError;

pub type FetchResult<V> = std::result::Result<V, FetchError>;

/// Fetch future that any number of callers can await
pub type SharedFetch<V> = Shared<BoxFuture<'static, FetchResult<V>>>;

/// The fetch currently executing for one key
pub struct InFlightRequest<V> {
    pub handle: SharedFetch<V>,
    pub started_at: Timestamp,
}

impl<V> Clone for InFlightRequest<V>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            started_at: self.started_at,
        }
    }
}

impl<V> fmt::Debug for InFlightRequest<V> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("InFlightRequest")
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

/// At most one in-flight request per canonical key
pub struct InFlightRegistry<V> {
    requests: DashMap<String, InFlightRequest<V>>,
}

impl<V> fmt::Debug for InFlightRegistry<V> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("InFlightRegistry")
            .field("requests", &self.requests.len())
            .finish()
    }
}

impl<V> Default for InFlightRegistry<V>
where
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> InFlightRegistry<V>
where
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            requests: DashMap::new(),
        }
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<InFlightRequest<V>> {
        self.requests.get(key).map(|r| r.value().clone())
    }

    pub fn started_at(
        &self,
        key: &str,
    ) -> Option<Timestamp> {
        self.requests.get(key).map(|r| r.started_at)
    }

    /// Join the request in flight for `key` when `dedupe` is set and one exists, otherwise
    /// register the request built by `start` in its place.
    ///
    /// The decision and the registration happen under the key's shard lock, so two deduping
    /// callers can never both start a fetch. `start` must not call back into this registry.
    ///
    /// Returns the request to await and whether it was joined.
    pub fn join_or_start<F>(
        &self,
        key: &str,
        dedupe: bool,
        start: F,
    ) -> (InFlightRequest<V>, bool)
    where
        F: FnOnce() -> InFlightRequest<V>,
    {
        match self.requests.entry(key.to_string()) {
            Entry::Occupied(existing) if dedupe => (existing.get().clone(), true),
            Entry::Occupied(mut existing) => {
                let request = start();
                trace!(key, started_at = request.started_at, "in-flight request replaced");
                existing.insert(request.clone());
                (request, false)
            }
            Entry::Vacant(slot) => {
                let request = start();
                trace!(key, started_at = request.started_at, "in-flight request registered");
                slot.insert(request.clone());
                (request, false)
            }
        }
    }

    /// Remove the request for `key` only if it is still the one started at `started_at`
    pub fn remove_if_started_at(
        &self,
        key: &str,
        started_at: Timestamp,
    ) -> bool {
        let removed = self.requests.remove_if(key, |_, r| r.started_at == started_at).is_some();
        if removed {
            trace!(key, started_at, "in-flight request removed");
        }
        removed
    }

    pub fn remove(
        &self,
        key: &str,
    ) {
        self.requests.remove(key);
    }

    pub fn contains(
        &self,
        key: &str,
    ) -> bool {
        self.requests.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
