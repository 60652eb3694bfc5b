use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use futures::future::join_all;
use futures::future::BoxFuture;
use tracing::debug;

use super::AlwaysAvailable;
use super::BroadcastEvent;
use super::CacheRevalidator;
use super::CacheValue;
use super::EnvironmentProbe;
use super::ExponentialBackoff;
use super::Peek;
use super::RetryPolicy;
use super::TriggerCallback;
use crate::time::LogicalClock;
use crate::CacheConfig;
use crate::FetchError;
use crate::InFlightRegistry;
use crate::Key;
use crate::KeyCodec;
use crate::KeyHasher;
use crate::MutationLedger;
use crate::MutationWindow;
use crate::SerializedKey;
use crate::Store;
use crate::Stored;
use crate::SubscriberId;
use crate::SubscriberRegistry;
use crate::Subscription;

pub(crate) struct CacheInner<V> {
    pub(crate) store: Store<V>,
    pub(crate) in_flight: InFlightRegistry<V>,
    pub(crate) mutations: MutationLedger,
    pub(crate) cache_revalidators: SubscriberRegistry<CacheRevalidator<V>>,
    pub(crate) focus_revalidators: SubscriberRegistry<TriggerCallback>,
    pub(crate) reconnect_revalidators: SubscriberRegistry<TriggerCallback>,
    pub(crate) codec: KeyCodec,
    pub(crate) clock: LogicalClock,
    pub(crate) config: ArcSwap<CacheConfig>,
    pub(crate) probe: Arc<dyn EnvironmentProbe>,
    pub(crate) retry_policy: Arc<dyn RetryPolicy>,
}

/// Shared cache engine: store, registries and the operations coordinating them.
///
/// Cloning is cheap and every clone addresses the same state. Independent instances never
/// share anything, so tests can each build their own.
pub struct Cache<V> {
    pub(crate) inner: Arc<CacheInner<V>>,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> fmt::Debug for Cache<V> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Cache")
            .field("store", &self.inner.store)
            .field("in_flight", &self.inner.in_flight)
            .field("subscribers", &self.inner.cache_revalidators)
            .finish_non_exhaustive()
    }
}

impl<V: CacheValue> Default for Cache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Construction-time collaborators of a [`Cache`]
pub struct CacheBuilder<V> {
    config: CacheConfig,
    probe: Arc<dyn EnvironmentProbe>,
    retry_policy: Arc<dyn RetryPolicy>,
    codec: KeyCodec,
    store: Option<Store<V>>,
}

impl<V: CacheValue> CacheBuilder<V> {
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
            probe: Arc::new(AlwaysAvailable),
            retry_policy: Arc::new(ExponentialBackoff),
            codec: KeyCodec::default(),
            store: None,
        }
    }

    /// Ambient configuration shared by every observer of the cache (default: built-in values)
    pub fn config(
        mut self,
        config: CacheConfig,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn probe(
        mut self,
        probe: Arc<dyn EnvironmentProbe>,
    ) -> Self {
        self.probe = probe;
        self
    }

    pub fn retry_policy(
        mut self,
        policy: Arc<dyn RetryPolicy>,
    ) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Replace the hashing of composite keys
    pub fn key_hasher(
        mut self,
        hasher: Arc<dyn KeyHasher>,
    ) -> Self {
        self.codec = KeyCodec::new(hasher);
        self
    }

    /// Back the cache with an existing store (e.g. one pre-populated by the host)
    pub fn store(
        mut self,
        store: Store<V>,
    ) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Cache<V> {
        Cache {
            inner: Arc::new(CacheInner {
                store: self.store.unwrap_or_default(),
                in_flight: InFlightRegistry::new(),
                mutations: MutationLedger::new(),
                cache_revalidators: SubscriberRegistry::new(),
                focus_revalidators: SubscriberRegistry::new(),
                reconnect_revalidators: SubscriberRegistry::new(),
                codec: self.codec,
                clock: LogicalClock::new(),
                config: ArcSwap::from_pointee(self.config),
                probe: self.probe,
                retry_policy: self.retry_policy,
            }),
        }
    }
}

impl<V: CacheValue> Default for CacheBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: CacheValue> Cache<V> {
    pub fn new() -> Self {
        CacheBuilder::new().build()
    }

    pub fn builder() -> CacheBuilder<V> {
        CacheBuilder::new()
    }

    pub fn with_config(config: CacheConfig) -> Self {
        CacheBuilder::new().config(config).build()
    }

    pub fn store(&self) -> &Store<V> {
        &self.inner.store
    }

    /// Current ambient configuration
    pub fn config(&self) -> Arc<CacheConfig> {
        self.inner.config.load_full()
    }

    /// Swap the ambient configuration; observers attached afterwards pick it up
    pub fn set_config(
        &self,
        config: CacheConfig,
    ) {
        self.inner.config.store(Arc::new(config));
    }

    pub fn serialize_key(
        &self,
        key: &Key,
    ) -> SerializedKey {
        self.inner.codec.serialize(key)
    }

    /// Cached data of a resource
    pub fn data(
        &self,
        key: impl Into<Key>,
    ) -> Option<V> {
        let sk = self.serialize_key(&key.into());
        if sk.is_empty() {
            return None;
        }
        self.inner.store.value(&sk.key)
    }

    /// Last cached error of a resource
    pub fn error(
        &self,
        key: impl Into<Key>,
    ) -> Option<FetchError> {
        let sk = self.serialize_key(&key.into());
        if sk.is_empty() {
            return None;
        }
        self.cached_error(&sk)
    }

    /// Explicit state query, for consumers that block or suspend on a resource
    pub fn peek(
        &self,
        key: impl Into<Key>,
    ) -> Option<Peek<V>> {
        let sk = self.serialize_key(&key.into());
        if sk.is_empty() {
            return None;
        }
        if let Some(data) = self.inner.store.value(&sk.key) {
            return Some(Peek::Ready(data));
        }
        if let Some(request) = self.inner.in_flight.get(&sk.key) {
            return Some(Peek::Pending(request.handle));
        }
        self.cached_error(&sk).map(Peek::Errored)
    }

    /// Whether a fetch for the resource is registered in flight
    pub fn is_fetching(
        &self,
        key: impl Into<Key>,
    ) -> bool {
        let sk = self.serialize_key(&key.into());
        !sk.is_empty() && self.inner.in_flight.contains(&sk.key)
    }

    pub fn mutation_window(
        &self,
        key: impl Into<Key>,
    ) -> Option<MutationWindow> {
        let sk = self.serialize_key(&key.into());
        self.inner.mutations.get(&sk.key)
    }

    /// Register a cache-update callback for a resource.
    ///
    /// The callback receives every committed value or error of the resource and returns a
    /// future that resolves once any revalidation it chose to run has finished. It is treated
    /// as able to fetch, so it may be asked to revalidate without deduplication.
    pub fn subscribe<F>(
        &self,
        key: impl Into<Key>,
        callback: F,
    ) -> Option<Subscription>
    where
        F: Fn(BroadcastEvent<V>) -> BoxFuture<'static, bool> + Send + Sync + 'static,
    {
        let sk = self.serialize_key(&key.into());
        if sk.is_empty() {
            return None;
        }
        let revalidator = CacheRevalidator {
            callback: Arc::new(callback),
            fetches: true,
        };
        Some(self.inner.cache_revalidators.subscribe(&sk.key, revalidator))
    }

    /// Register a focus callback. Only the first callback of each key is ever invoked.
    pub fn subscribe_focus<F>(
        &self,
        key: impl Into<Key>,
        callback: F,
    ) -> Option<Subscription>
    where
        F: Fn() -> BoxFuture<'static, bool> + Send + Sync + 'static,
    {
        let sk = self.serialize_key(&key.into());
        if sk.is_empty() {
            return None;
        }
        Some(self.inner.focus_revalidators.subscribe(&sk.key, Arc::new(callback)))
    }

    /// Register a reconnect callback. Only the first callback of each key is ever invoked.
    pub fn subscribe_reconnect<F>(
        &self,
        key: impl Into<Key>,
        callback: F,
    ) -> Option<Subscription>
    where
        F: Fn() -> BoxFuture<'static, bool> + Send + Sync + 'static,
    {
        let sk = self.serialize_key(&key.into());
        if sk.is_empty() {
            return None;
        }
        Some(self.inner.reconnect_revalidators.subscribe(&sk.key, Arc::new(callback)))
    }

    pub fn subscriber_count(
        &self,
        key: impl Into<Key>,
    ) -> usize {
        let sk = self.serialize_key(&key.into());
        self.inner.cache_revalidators.count(&sk.key)
    }

    /// Host regained focus: revalidate every observed resource once.
    ///
    /// Returns how many resources ran a fetch attempt.
    pub async fn revalidate_on_focus(&self) -> usize {
        if !self.inner.probe.is_visible() || !self.inner.probe.is_online() {
            debug!("focus revalidation skipped: host not visible or offline");
            return 0;
        }
        Self::run_firsts(&self.inner.focus_revalidators).await
    }

    /// Host regained connectivity: revalidate every observed resource once.
    pub async fn revalidate_on_reconnect(&self) -> usize {
        if !self.inner.probe.is_visible() || !self.inner.probe.is_online() {
            debug!("reconnect revalidation skipped: host not visible or offline");
            return 0;
        }
        Self::run_firsts(&self.inner.reconnect_revalidators).await
    }

    async fn run_firsts(registry: &SubscriberRegistry<TriggerCallback>) -> usize {
        let pending: Vec<_> = registry.firsts().into_iter().map(|(_, callback)| callback()).collect();
        join_all(pending).await.into_iter().filter(|ran| *ran).count()
    }

    pub(crate) fn cached_error(
        &self,
        sk: &SerializedKey,
    ) -> Option<FetchError> {
        self.inner.store.get(&sk.error_key).and_then(|s| s.error().cloned())
    }

    /// Deliver a committed value and/or error to every cache-update subscriber of `key`.
    ///
    /// The first subscriber able to fetch is asked to revalidate without deduplication, the
    /// ones after it with it, so one fetch serves all of them. `skip` excludes the observer
    /// that produced the value.
    pub(crate) fn broadcast_state(
        &self,
        key: &str,
        data: Option<V>,
        error: Option<FetchError>,
        should_revalidate: bool,
        skip: Option<SubscriberId>,
    ) -> Vec<BoxFuture<'static, bool>> {
        let mut primary_taken = false;
        self.inner
            .cache_revalidators
            .broadcast(key, |_, id, subscriber| {
                if skip == Some(id) {
                    return None;
                }
                let is_deduped = primary_taken;
                primary_taken |= subscriber.fetches;
                Some((subscriber.callback)(BroadcastEvent {
                    should_revalidate,
                    data: data.clone(),
                    error: error.clone(),
                    is_deduped,
                }))
            })
            .into_iter()
            .flatten()
            .collect()
    }

    /// Write the committed data (if any) and the error slot of a resource
    pub(crate) fn commit(
        &self,
        sk: &SerializedKey,
        data: Option<&V>,
        error: Option<&FetchError>,
    ) {
        if let Some(data) = data {
            self.inner.store.set(&sk.key, Stored::Value(data.clone()));
        }
        let error_slot = match error {
            Some(e) => Stored::Error(e.clone()),
            None => Stored::Undefined,
        };
        self.inner.store.set(&sk.error_key, error_slot);
    }
}
