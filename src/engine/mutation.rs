use std::fmt;
use std::future::Future;

use futures::future::join_all;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;
use tracing::trace;

use super::Cache;
use super::CacheValue;
use crate::Error;
use crate::FetchResult;
use crate::Key;
use crate::Result;
use crate::SerializedKey;

pub type Updater<V> = Box<dyn FnOnce(Option<V>) -> BoxFuture<'static, FetchResult<V>> + Send>;

/// Replacement supplied to [`Cache::mutate`]
pub enum MutationValue<V> {
    /// Use the value as is
    Value(V),
    /// Derive the new value from the current cached one
    Update(Updater<V>),
    /// Await a value (typically the server's answer)
    Future(BoxFuture<'static, FetchResult<V>>),
}

impl<V> MutationValue<V> {
    pub fn update<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Option<V>) -> Fut + Send + 'static,
        Fut: Future<Output = FetchResult<V>> + Send + 'static,
    {
        MutationValue::Update(Box::new(move |current| f(current).boxed()))
    }

    pub fn future<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = FetchResult<V>> + Send + 'static,
    {
        MutationValue::Future(fut.boxed())
    }

    async fn resolve(
        self,
        current: Option<V>,
    ) -> FetchResult<V> {
        match self {
            MutationValue::Value(v) => Ok(v),
            MutationValue::Update(f) => f(current).await,
            MutationValue::Future(fut) => fut.await,
        }
    }
}

impl<V> From<V> for MutationValue<V> {
    fn from(value: V) -> Self {
        MutationValue::Value(value)
    }
}

impl<V: fmt::Debug> fmt::Debug for MutationValue<V> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            MutationValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            MutationValue::Update(_) => f.write_str("Update(..)"),
            MutationValue::Future(_) => f.write_str("Future(..)"),
        }
    }
}

impl<V: CacheValue> Cache<V> {
    /// Write a new value for a resource and resynchronize its observers.
    ///
    /// Without `data` this is [`Cache::trigger`]. Otherwise a mutation window is opened, the
    /// value resolved, and (unless another mutation or fetch started meanwhile) committed and
    /// broadcast with `should_revalidate`. Returns the authoritative value after the broadcast,
    /// or the resolved value if the mutation was abandoned. A failed value producer is always
    /// re-raised as [`Error::Mutation`].
    pub async fn mutate(
        &self,
        key: impl Into<Key>,
        data: Option<MutationValue<V>>,
        should_revalidate: bool,
    ) -> Result<Option<V>> {
        let sk = self.serialize_key(&key.into());
        self.mutate_key(sk, data, should_revalidate).await
    }

    /// [`Cache::mutate`] on an already canonicalized key
    pub(crate) async fn mutate_key(
        &self,
        sk: SerializedKey,
        data: Option<MutationValue<V>>,
        should_revalidate: bool,
    ) -> Result<Option<V>> {
        if sk.is_empty() {
            return Ok(None);
        }
        let Some(data) = data else {
            return self.trigger_key(&sk, should_revalidate).await;
        };

        let key = sk.key.as_str();
        let inner = &self.inner;

        let started_at = inner.clock.now();
        inner.mutations.begin(key, started_at);
        let fetch_started_at = inner.in_flight.started_at(key);
        trace!(key, started_at, "mutation started");

        let resolved = data.resolve(inner.store.value(key)).await;

        let interleaved = inner.mutations.get(key).map(|w| w.started_at) != Some(started_at)
            || inner.in_flight.started_at(key) != fetch_started_at;
        if interleaved {
            debug!(key, started_at, "mutation abandoned, a newer mutation or fetch started");
            return resolved.map(Some).map_err(Error::Mutation);
        }

        let (value, error) = match &resolved {
            Ok(v) => (Some(v.clone()), None),
            Err(e) => (None, Some(e.clone())),
        };
        self.commit(&sk, value.as_ref(), error.as_ref());
        inner.mutations.end(key, started_at, inner.clock.now());
        debug!(key, started_at, failed = error.is_some(), "mutation committed");

        let pending = self.broadcast_state(key, value.clone(), error.clone(), should_revalidate, None);
        let notified = !pending.is_empty();
        join_all(pending).await;

        if let Some(e) = error {
            return Err(Error::Mutation(e));
        }
        if notified {
            return Ok(inner.store.value(key));
        }
        Ok(value)
    }

    /// Re-deliver the cached value and error of a resource to all of its observers, each
    /// deciding whether to re-fetch. Returns the cached value once they have finished.
    pub async fn trigger(
        &self,
        key: impl Into<Key>,
        should_revalidate: bool,
    ) -> Result<Option<V>> {
        let sk = self.serialize_key(&key.into());
        self.trigger_key(&sk, should_revalidate).await
    }

    pub(crate) async fn trigger_key(
        &self,
        sk: &SerializedKey,
        should_revalidate: bool,
    ) -> Result<Option<V>> {
        if sk.is_empty() {
            return Ok(None);
        }

        let data = self.inner.store.value(&sk.key);
        let error = self.cached_error(sk);
        trace!(key = %sk.key, should_revalidate, "trigger");

        join_all(self.broadcast_state(&sk.key, data, error, should_revalidate, None)).await;
        Ok(self.inner.store.value(&sk.key))
    }
}
