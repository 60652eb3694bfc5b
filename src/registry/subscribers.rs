use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use dashmap::DashMap;
use tracing::trace;

pub type SubscriberId = u64;

struct RegistryInner<C> {
    subscribers: DashMap<String, KeyList<C>>,
    next_id: AtomicU64,
}

/// Callbacks of one key plus the position of each id in `entries`
struct KeyList<C> {
    entries: Vec<(SubscriberId, C)>,
    positions: HashMap<SubscriberId, usize>,
}

impl<C> Default for KeyList<C> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<C> KeyList<C> {
    fn push(
        &mut self,
        id: SubscriberId,
        callback: C,
    ) {
        self.positions.insert(id, self.entries.len());
        self.entries.push((id, callback));
    }

    fn remove(
        &mut self,
        id: SubscriberId,
    ) -> bool {
        let Some(pos) = self.positions.remove(&id) else {
            return false;
        };
        self.entries.swap_remove(pos);
        if let Some((moved, _)) = self.entries.get(pos) {
            self.positions.insert(*moved, pos);
        }
        true
    }

    fn first(&self) -> Option<&C> {
        self.entries.first().map(|(_, c)| c)
    }
}

/// Per-key ordered lists of observer callbacks.
///
/// Broadcast works on a snapshot of the list taken when it starts, so callbacks may
/// subscribe or unsubscribe (themselves or others) while being invoked. Removal swaps the
/// last callback into the vacated slot instead of shifting the tail; the slot is found
/// through a per-key id index.
pub struct SubscriberRegistry<C> {
    inner: Arc<RegistryInner<C>>,
}

impl<C> Clone for SubscriberRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C> fmt::Debug for SubscriberRegistry<C> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("keys", &self.inner.subscribers.len())
            .finish()
    }
}

impl<C> Default for SubscriberRegistry<C>
where
    C: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C> SubscriberRegistry<C>
where
    C: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Append `callback` to the list of `key`
    pub fn register(
        &self,
        key: &str,
        callback: C,
    ) -> SubscriberId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .entry(key.to_string())
            .or_default()
            .push(id, callback);
        trace!(key, subscriber_id = id, "subscriber registered");
        id
    }

    /// Remove a callback; the key's list is dropped once empty
    pub fn unregister(
        &self,
        key: &str,
        id: SubscriberId,
    ) -> bool {
        unregister(&self.inner, key, id)
    }

    /// Register and get a handle that unregisters on drop
    pub fn subscribe(
        &self,
        key: &str,
        callback: C,
    ) -> Subscription {
        let id = self.register(key, callback);
        let registry: Weak<RegistryInner<C>> = Arc::downgrade(&self.inner);
        let key = key.to_string();
        Subscription {
            id,
            unregister: Some(Box::new(move || {
                if let Some(inner) = registry.upgrade() {
                    unregister(&inner, &key, id);
                }
            })),
        }
    }

    /// Stable copy of the callbacks currently registered for `key`, in list order
    pub fn snapshot(
        &self,
        key: &str,
    ) -> Vec<(SubscriberId, C)> {
        self.inner
            .subscribers
            .get(key)
            .map(|list| list.entries.clone())
            .unwrap_or_default()
    }

    /// Invoke `f` for every callback of `key` with its position in the list.
    ///
    /// The list is snapshotted before the first invocation and no lock is held while
    /// `f` runs.
    pub fn broadcast<R, F>(
        &self,
        key: &str,
        mut f: F,
    ) -> Vec<R>
    where
        F: FnMut(usize, SubscriberId, &C) -> R,
    {
        self.snapshot(key)
            .iter()
            .enumerate()
            .map(|(index, (id, callback))| f(index, *id, callback))
            .collect()
    }

    /// First registered callback of `key`, for coarse signals where one subscriber
    /// revalidating is enough to resynchronize all others
    pub fn first(
        &self,
        key: &str,
    ) -> Option<C> {
        self.inner
            .subscribers
            .get(key)
            .and_then(|list| list.first().cloned())
    }

    /// First callback of every key
    pub fn firsts(&self) -> Vec<(String, C)> {
        self.inner
            .subscribers
            .iter()
            .filter_map(|e| e.value().first().map(|c| (e.key().clone(), c.clone())))
            .collect()
    }

    pub fn count(
        &self,
        key: &str,
    ) -> usize {
        self.inner.subscribers.get(key).map(|l| l.entries.len()).unwrap_or(0)
    }

    pub fn key_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

fn unregister<C>(
    inner: &RegistryInner<C>,
    key: &str,
    id: SubscriberId,
) -> bool {
    let mut found = false;
    // remove_if_mut keeps the emptiness check and the removal atomic
    inner.subscribers.remove_if_mut(key, |_, list| {
        found = list.remove(id);
        list.entries.is_empty()
    });
    if found {
        trace!(key, subscriber_id = id, "subscriber unregistered");
    }
    found
}

/// Registration handle; the callback is unregistered when this is dropped
pub struct Subscription {
    id: SubscriberId,
    unregister: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl fmt::Debug for Subscription {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn unsubscribe(mut self) {
        self.run_unregister();
    }

    fn run_unregister(&mut self) {
        if let Some(f) = self.unregister.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_unregister();
    }
}
