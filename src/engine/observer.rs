use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use futures::future::join_all;
use futures::future::ready;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::default_compare;
use super::BroadcastEvent;
use super::Cache;
use super::CacheRevalidator;
use super::CacheValue;
use super::Compare;
use super::Fetcher;
use super::MutationValue;
use crate::async_task::spawn_after;
use crate::async_task::spawn_detached_after;
use crate::constants::STATE_CHANGE_BUFFER_SIZE;
use crate::errors::same_error;
use crate::CacheConfig;
use crate::ConfigOverrides;
use crate::FetchError;
use crate::InFlightRequest;
use crate::Key;
use crate::Result;
use crate::SerializedKey;
use crate::SubscriberId;
use crate::Subscription;

/// What a consumer sees of a resource
#[derive(Debug, Clone)]
pub struct ResourceState<V> {
    pub data: Option<V>,
    pub error: Option<FetchError>,
    pub is_validating: bool,
}

impl<V> Default for ResourceState<V> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_validating: false,
        }
    }
}

/// Delta of a [`ResourceState`]; only fields that changed are set
#[derive(Debug, Clone)]
pub struct StateChange<V> {
    pub data: Option<V>,
    /// `Some(None)` clears the error
    pub error: Option<Option<FetchError>>,
    pub is_validating: Option<bool>,
}

impl<V> Default for StateChange<V> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_validating: None,
        }
    }
}

impl<V> StateChange<V> {
    fn validating(is_validating: bool) -> Self {
        Self {
            is_validating: Some(is_validating),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none() && self.error.is_none() && self.is_validating.is_none()
    }
}

/// Options of one revalidation call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevalidateOptions {
    /// Join a fetch already in flight for the key instead of starting a new one
    pub dedupe: bool,
    /// Retries already performed in the current failure streak
    pub retry_count: usize,
}

impl RevalidateOptions {
    pub fn deduped() -> Self {
        Self {
            dedupe: true,
            retry_count: 0,
        }
    }
}

pub type SuccessHook<V> = Arc<dyn Fn(&V, &str) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&FetchError, &str) + Send + Sync>;
pub type SlowHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Lifecycle callbacks of an observer
pub struct ResourceEvents<V> {
    pub on_success: Option<SuccessHook<V>>,
    pub on_error: Option<ErrorHook>,
    pub on_loading_slow: Option<SlowHook>,
}

impl<V> Default for ResourceEvents<V> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
            on_loading_slow: None,
        }
    }
}

impl<V> Clone for ResourceEvents<V> {
    fn clone(&self) -> Self {
        Self {
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            on_loading_slow: self.on_loading_slow.clone(),
        }
    }
}

/// Call-site options of [`Cache::observe`]
pub struct ObserveOptions<V> {
    pub overrides: ConfigOverrides,
    pub compare: Option<Compare<V>>,
    pub initial_data: Option<V>,
    pub events: ResourceEvents<V>,
}

impl<V> Default for ObserveOptions<V> {
    fn default() -> Self {
        Self {
            overrides: ConfigOverrides::default(),
            compare: None,
            initial_data: None,
            events: ResourceEvents::default(),
        }
    }
}

impl<V: CacheValue> ObserveOptions<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overrides(
        mut self,
        overrides: ConfigOverrides,
    ) -> Self {
        self.overrides = overrides;
        self
    }

    /// Equality used to suppress redundant data changes (default: `PartialEq`)
    pub fn compare<F>(
        mut self,
        compare: F,
    ) -> Self
    where
        F: Fn(Option<&V>, &V) -> bool + Send + Sync + 'static,
    {
        self.compare = Some(Arc::new(compare));
        self
    }

    /// Data shown until the cache holds a value for the key
    pub fn initial_data(
        mut self,
        data: V,
    ) -> Self {
        self.initial_data = Some(data);
        self
    }

    pub fn on_success<F>(
        mut self,
        f: F,
    ) -> Self
    where
        F: Fn(&V, &str) + Send + Sync + 'static,
    {
        self.events.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error<F>(
        mut self,
        f: F,
    ) -> Self
    where
        F: Fn(&FetchError, &str) + Send + Sync + 'static,
    {
        self.events.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_loading_slow<F>(
        mut self,
        f: F,
    ) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.events.on_loading_slow = Some(Arc::new(f));
        self
    }
}

pub(crate) struct ObserverInner<V> {
    cache: Cache<V>,
    key: SerializedKey,
    fetcher: Option<Fetcher<V>>,
    config: CacheConfig,
    compare: Compare<V>,
    events: ResourceEvents<V>,
    state: Mutex<ResourceState<V>>,
    changes: broadcast::Sender<StateChange<V>>,
    detached: AtomicBool,
    focus_pending: Arc<AtomicBool>,
    token: CancellationToken,
    cache_subscriber: Mutex<Option<SubscriberId>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl<V> Drop for ObserverInner<V> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// One consumer's binding to a resource.
///
/// Cheap to clone; the registries only hold weak references, so dropping the last handle
/// (or calling [`Observer::detach`]) unregisters it.
pub struct Observer<V> {
    inner: Arc<ObserverInner<V>>,
}

impl<V> Clone for Observer<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Observer<V> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Observer")
            .field("key", &self.inner.key.key)
            .field("state", &*self.inner.state.lock())
            .finish_non_exhaustive()
    }
}

impl<V: CacheValue> Cache<V> {
    /// Attach an observer binding `fetcher` to `key`
    pub fn observe(
        &self,
        key: impl Into<Key>,
        fetcher: Fetcher<V>,
        options: ObserveOptions<V>,
    ) -> Observer<V> {
        Observer::attach(self.clone(), key.into(), Some(fetcher), options)
    }

    /// Attach an observer that only follows the cache and never fetches by itself
    pub fn observe_cached(
        &self,
        key: impl Into<Key>,
        options: ObserveOptions<V>,
    ) -> Observer<V> {
        Observer::attach(self.clone(), key.into(), None, options)
    }
}

impl<V: CacheValue> Observer<V> {
    fn attach(
        cache: Cache<V>,
        key: Key,
        fetcher: Option<Fetcher<V>>,
        options: ObserveOptions<V>,
    ) -> Self {
        let sk = cache.serialize_key(&key);
        let config = cache.config().merge(&options.overrides);

        let initial = if sk.is_empty() {
            ResourceState::default()
        } else {
            ResourceState {
                data: cache.inner.store.value(&sk.key).or(options.initial_data),
                error: cache.cached_error(&sk),
                is_validating: false,
            }
        };

        let (changes, _) = broadcast::channel(STATE_CHANGE_BUFFER_SIZE);
        let inner = Arc::new(ObserverInner {
            cache,
            key: sk,
            fetcher,
            config,
            compare: options.compare.unwrap_or_else(default_compare),
            events: options.events,
            state: Mutex::new(initial),
            changes,
            detached: AtomicBool::new(false),
            focus_pending: Arc::new(AtomicBool::new(false)),
            token: CancellationToken::new(),
            cache_subscriber: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
        });

        if !inner.key.is_empty() {
            register_callbacks(&inner);
        }
        Self { inner }
    }

    /// Canonical key of the observed resource
    pub fn key(&self) -> &str {
        &self.inner.key.key
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ResourceState<V> {
        self.inner.state.lock().clone()
    }

    pub fn data(&self) -> Option<V> {
        self.inner.state.lock().data.clone()
    }

    pub fn error(&self) -> Option<FetchError> {
        self.inner.state.lock().error.clone()
    }

    pub fn is_validating(&self) -> bool {
        self.inner.state.lock().is_validating
    }

    /// Stream of state deltas, starting from the next change
    pub fn changes(&self) -> broadcast::Receiver<StateChange<V>> {
        self.inner.changes.subscribe()
    }

    /// Fetch the resource and reconcile the result with the cache.
    ///
    /// Resolves to `true` if a fetch attempt ran to completion (success or failure) and
    /// `false` if the call was a no-op or its result was discarded as stale.
    pub fn revalidate(
        &self,
        options: RevalidateOptions,
    ) -> BoxFuture<'static, bool> {
        self.inner.clone().run_revalidate(options).boxed()
    }

    /// Mutate this observer's resource, see [`Cache::mutate`]
    pub async fn mutate(
        &self,
        data: Option<MutationValue<V>>,
        should_revalidate: bool,
    ) -> Result<Option<V>> {
        self.inner
            .cache
            .mutate_key(self.inner.key.clone(), data, should_revalidate)
            .await
    }

    /// Tear down: later revalidations are no-ops, pending timers are cancelled and every
    /// registration is removed
    pub fn detach(&self) {
        if self.inner.detached.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.token.cancel();
        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.lock());
        drop(subscriptions);
        trace!(key = %self.inner.key.key, "observer detached");
    }

    pub fn is_detached(&self) -> bool {
        self.inner.detached.load(Ordering::SeqCst)
    }
}

fn register_callbacks<V: CacheValue>(inner: &Arc<ObserverInner<V>>) {
    let key = inner.key.key.clone();
    let registries = &inner.cache.inner;
    let fetches = inner.fetcher.is_some();

    let weak = Arc::downgrade(inner);
    let on_update = registries.cache_revalidators.subscribe(
        &key,
        CacheRevalidator {
            callback: Arc::new(move |event: BroadcastEvent<V>| match weak.upgrade() {
                Some(inner) => inner.on_cache_update(event),
                None => ready(false).boxed(),
            }),
            fetches,
        },
    );
    *inner.cache_subscriber.lock() = Some(on_update.id());
    let mut subscriptions = vec![on_update];

    // focus and reconnect run only the first callback per key, which must be able to fetch
    if fetches {
        let weak = Arc::downgrade(inner);
        subscriptions.push(registries.focus_revalidators.subscribe(
            &key,
            Arc::new(move || match weak.upgrade() {
                Some(inner) => inner.on_focus(),
                None => ready(false).boxed(),
            }),
        ));

        let weak: Weak<ObserverInner<V>> = Arc::downgrade(inner);
        subscriptions.push(registries.reconnect_revalidators.subscribe(
            &key,
            Arc::new(move || match weak.upgrade() {
                Some(inner) if inner.config.revalidation.revalidate_on_reconnect => {
                    inner.run_revalidate(RevalidateOptions::deduped()).boxed()
                }
                _ => ready(false).boxed(),
            }),
        ));
    }

    inner.subscriptions.lock().extend(subscriptions);
}

impl<V: CacheValue> ObserverInner<V> {
    fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    /// Apply a delta to the visible state and publish it
    fn dispatch(
        &self,
        change: StateChange<V>,
    ) {
        if change.is_empty() {
            return;
        }
        {
            let mut state = self.state.lock();
            if let Some(data) = &change.data {
                state.data = Some(data.clone());
            }
            if let Some(error) = &change.error {
                state.error = error.clone();
            }
            if let Some(v) = change.is_validating {
                state.is_validating = v;
            }
        }
        // no receiver is not an error
        let _ = self.changes.send(change);
    }

    async fn run_revalidate(
        self: Arc<Self>,
        options: RevalidateOptions,
    ) -> bool {
        let Some(fetcher) = self.fetcher.clone() else {
            return false;
        };
        if self.key.is_empty() || self.is_detached() {
            return false;
        }

        let cache = &self.cache;
        let key = self.key.key.as_str();

        self.dispatch(StateChange::validating(true));

        let (request, joined) = cache.inner.in_flight.join_or_start(key, options.dedupe, || {
            self.start_fetch(fetcher)
        });
        let start_at = request.started_at;

        let loading = Arc::new(AtomicBool::new(true));
        if !joined {
            debug!(key, start_at, "fetch started");
            self.arm_loading_slow(&loading);
        } else {
            trace!(key, start_at, "joined in-flight fetch");
        }

        let result = request.handle.await;
        loading.store(false, Ordering::SeqCst);

        match result {
            Ok(data) => {
                if !joined {
                    if let Some(on_success) = &self.events.on_success {
                        on_success(&data, key);
                    }
                }

                let newer_fetch = cache.inner.in_flight.started_at(key).is_some_and(|ts| ts > start_at);
                if newer_fetch || cache.inner.mutations.supersedes(key, start_at) {
                    debug!(key, start_at, newer_fetch, "stale fetch result ignored");
                    self.dispatch(StateChange::validating(false));
                    return false;
                }

                cache.commit(&self.key, Some(&data), None);

                let mut change = StateChange::validating(false);
                {
                    let state = self.state.lock();
                    if state.error.is_some() {
                        change.error = Some(None);
                    }
                    if !(self.compare)(state.data.as_ref(), &data) {
                        change.data = Some(data.clone());
                    }
                }
                self.dispatch(change);
                debug!(key, start_at, "fetch result committed");

                if !joined {
                    let skip = *self.cache_subscriber.lock();
                    join_all(cache.broadcast_state(key, Some(data), None, false, skip)).await;
                }
            }
            Err(err) => {
                warn!(key, start_at, retry_count = options.retry_count, "fetch failed: {}", err);
                cache.commit(&self.key, None, Some(&err));

                let changed = !same_error(self.state.lock().error.as_ref(), Some(&err));
                let mut change = StateChange::validating(false);
                if changed {
                    change.error = Some(Some(err.clone()));
                }
                self.dispatch(change);

                if changed && !joined {
                    let skip = *self.cache_subscriber.lock();
                    join_all(cache.broadcast_state(key, None, Some(err.clone()), false, skip)).await;
                }

                if let Some(on_error) = &self.events.on_error {
                    on_error(&err, key);
                }

                if self.config.retry.should_retry_on_error {
                    self.schedule_retry(options);
                }
            }
        }

        true
    }

    /// Build the request registered for a new fetch. Runs under the registry's shard lock:
    /// it only assembles the future and spawns its driver, user code runs on the driver.
    fn start_fetch(
        &self,
        fetcher: Fetcher<V>,
    ) -> InFlightRequest<V> {
        let cache = Arc::downgrade(&self.cache.inner);
        let key = self.key.key.clone();
        let args = self.key.fetch_args();
        let deduping_interval = self.config.revalidation.deduping_interval();
        let started_at = self.cache.inner.clock.now();

        let handle = async move {
            let result = fetcher(args).await;
            match &result {
                // stays joinable for the dedup window, then expires
                Ok(_) => {
                    spawn_detached_after(deduping_interval, async move {
                        if let Some(cache) = cache.upgrade() {
                            cache.in_flight.remove_if_started_at(&key, started_at);
                        }
                    });
                }
                Err(_) => {
                    if let Some(cache) = cache.upgrade() {
                        cache.in_flight.remove_if_started_at(&key, started_at);
                    }
                }
            }
            result
        }
        .boxed()
        .shared();

        // the fetch settles even if every awaiting caller goes away
        tokio::spawn(handle.clone().map(|_| ()));

        InFlightRequest { handle, started_at }
    }

    fn arm_loading_slow(
        &self,
        loading: &Arc<AtomicBool>,
    ) {
        let (Some(timeout), Some(on_loading_slow)) = (
            self.config.revalidation.loading_timeout(),
            self.events.on_loading_slow.clone(),
        ) else {
            return;
        };
        if self.cache.inner.store.value(&self.key.key).is_some() {
            return;
        }

        let loading = loading.clone();
        let key = self.key.key.clone();
        spawn_after("loading_slow", timeout, self.token.clone(), async move {
            if loading.load(Ordering::SeqCst) {
                debug!(key = %key, "loading is slow");
                on_loading_slow(&key);
            }
        });
    }

    fn schedule_retry(
        self: &Arc<Self>,
        options: RevalidateOptions,
    ) {
        let retry_count = options.retry_count + 1;
        let key = self.key.key.as_str();

        if !self.cache.inner.probe.is_visible() {
            trace!(key, "host not visible, retry skipped");
            return;
        }
        let Some(delay) = self.cache.inner.retry_policy.next_delay(retry_count, &self.config.retry) else {
            warn!(key, retry_count, "error retries exhausted");
            return;
        };

        debug!(key, retry_count, ?delay, "retry scheduled");
        let weak = Arc::downgrade(self);
        spawn_after("error_retry", delay, self.token.clone(), async move {
            if let Some(inner) = weak.upgrade() {
                Observer { inner }
                    .revalidate(RevalidateOptions {
                        dedupe: true,
                        retry_count,
                    })
                    .await;
            }
        });
    }

    /// Cache-update callback: adopt the broadcast payload, then optionally re-fetch
    fn on_cache_update(
        self: Arc<Self>,
        event: BroadcastEvent<V>,
    ) -> BoxFuture<'static, bool> {
        let mut change = StateChange::default();
        {
            let state = self.state.lock();
            if let Some(data) = &event.data {
                if !(self.compare)(state.data.as_ref(), data) {
                    change.data = Some(data.clone());
                }
            }
            if !same_error(state.error.as_ref(), event.error.as_ref()) {
                change.error = Some(event.error.clone());
            }
        }
        self.dispatch(change);

        if !event.should_revalidate {
            return ready(false).boxed();
        }
        self.run_revalidate(RevalidateOptions {
            dedupe: event.is_deduped,
            retry_count: 0,
        })
        .boxed()
    }

    /// Focus callback, throttled per observer
    fn on_focus(self: Arc<Self>) -> BoxFuture<'static, bool> {
        if !self.config.revalidation.revalidate_on_focus || self.focus_pending.swap(true, Ordering::SeqCst) {
            return ready(false).boxed();
        }

        let pending = self.focus_pending.clone();
        spawn_after(
            "focus_throttle",
            self.config.revalidation.focus_throttle_interval(),
            self.token.clone(),
            async move {
                pending.store(false, Ordering::SeqCst);
            },
        );
        self.run_revalidate(RevalidateOptions::deduped()).boxed()
    }
}
