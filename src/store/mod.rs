//! Key-addressed cache store with coarse change notification.
//!
//! The store maps canonical keys to [`Stored`] slots. A resource's data and its last error live
//! in two separate slots (`key` and `err@key`), so they can coexist and alternate
//! independently. Absence of a slot (`get` returning `None`) means "unknown" and is distinct
//! from an explicit [`Stored::Undefined`] write.
//!
//! Every write notifies the change listeners registered through
//! [`Store::subscribe_to_changes`]. This is a coarser signal than the per-key subscriber
//! registries: listeners learn that *something* changed, along with the key.

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::trace;

use crate::FetchError;

#[cfg(test)]
mod store_test;

/// Content of one store slot
#[derive(Debug, Clone)]
pub enum Stored<V> {
    Value(V),
    Error(FetchError),
    /// Explicitly cleared slot
    Undefined,
}

impl<V> Stored<V> {
    pub fn value(&self) -> Option<&V> {
        match self {
            Stored::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Stored::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<V> {
        match self {
            Stored::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Stored::Undefined)
    }
}

/// What happened to a store slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange<'a> {
    Set(&'a str),
    Delete(&'a str),
    Clear,
}

type ChangeListener = Arc<dyn Fn(StoreChange<'_>) + Send + Sync>;

struct StoreInner<V> {
    entries: DashMap<String, Stored<V>>,
    listeners: RwLock<Vec<(u64, ChangeListener)>>,
    next_listener_id: AtomicU64,
}

/// Concurrent cache store, cheap to clone
pub struct Store<V> {
    inner: Arc<StoreInner<V>>,
}

impl<V> Clone for Store<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> fmt::Debug for Store<V> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Store")
            .field("entries", &self.inner.entries.len())
            .field("listeners", &self.inner.listeners.read().len())
            .finish()
    }
}

impl<V> Default for Store<V>
where
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Store<V>
where
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: DashMap::new(),
                listeners: RwLock::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
            }),
        }
    }

    /// Current slot content, `None` if the key was never written (or deleted)
    pub fn get(
        &self,
        key: &str,
    ) -> Option<Stored<V>> {
        self.inner.entries.get(key).map(|e| e.value().clone())
    }

    /// Shortcut for the data held by a slot
    pub fn value(
        &self,
        key: &str,
    ) -> Option<V> {
        self.get(key).and_then(Stored::into_value)
    }

    pub fn set(
        &self,
        key: &str,
        value: Stored<V>,
    ) {
        self.inner.entries.insert(key.to_string(), value);
        trace!(key, "store slot written");
        self.notify(StoreChange::Set(key));
    }

    pub fn delete(
        &self,
        key: &str,
    ) {
        self.inner.entries.remove(key);
        self.notify(StoreChange::Delete(key));
    }

    pub fn clear(&self) {
        self.inner.entries.clear();
        self.notify(StoreChange::Clear);
    }

    pub fn has(
        &self,
        key: &str,
    ) -> bool {
        self.inner.entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Register a listener invoked after every write.
    ///
    /// The listener stays registered until the returned handle is dropped or
    /// [`ChangeSubscription::unsubscribe`] is called.
    pub fn subscribe_to_changes<F>(
        &self,
        listener: F,
    ) -> ChangeSubscription<V>
    where
        F: Fn(StoreChange<'_>) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.write().push((id, Arc::new(listener)));
        ChangeSubscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    fn notify(
        &self,
        change: StoreChange<'_>,
    ) {
        // snapshot so listeners may (un)subscribe while being notified
        let listeners: Vec<ChangeListener> = self.inner.listeners.read().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(change);
        }
    }
}

/// Handle of a store change listener; unregisters on drop
pub struct ChangeSubscription<V> {
    id: u64,
    store: Weak<StoreInner<V>>,
}

impl<V> ChangeSubscription<V> {
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl<V> Drop for ChangeSubscription<V> {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            let mut listeners = inner.listeners.write();
            if let Some(pos) = listeners.iter().position(|(id, _)| *id == self.id) {
                listeners.swap_remove(pos);
            }
        }
    }
}
