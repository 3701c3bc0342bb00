//! Live listener registry and subscription handles
//!
//! Listeners run on the writer's thread, after the write has committed and
//! outside any store lock.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::trace;

use super::Document;
use crate::error::Result;

/// Shared listener callback
pub type Listener<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Handle for a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop delivery now
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

struct Registry<K, T> {
    next_id: u64,
    listeners: HashMap<K, Vec<(u64, Listener<T>)>>,
}

/// Listeners grouped by key
pub struct ListenerSet<K, T> {
    inner: Arc<Mutex<Registry<K, T>>>,
}

impl<K, T> ListenerSet<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: HashMap::new(),
            })),
        }
    }

    pub fn add(&self, key: K, listener: Listener<T>) -> Subscription {
        let id = {
            let mut registry = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let id = registry.next_id;
            registry.next_id += 1;
            registry
                .listeners
                .entry(key.clone())
                .or_default()
                .push((id, listener));
            id
        };

        let weak: Weak<Mutex<Registry<K, T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut registry = inner.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(list) = registry.listeners.get_mut(&key) {
                    list.retain(|(listener_id, _)| *listener_id != id);
                    if list.is_empty() {
                        registry.listeners.remove(&key);
                    }
                }
            }
        })
    }

    /// Deliver `value` to every listener registered under `key`
    pub fn emit(&self, key: &K, value: T) {
        let targets: Vec<Listener<T>> = {
            let registry = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            match registry.listeners.get(key) {
                Some(list) => list.iter().map(|(_, l)| l.clone()).collect(),
                None => return,
            }
        };

        for listener in targets {
            listener(value.clone());
        }
    }

    pub fn listener_count(&self, key: &K) -> usize {
        let registry = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        registry.listeners.get(key).map_or(0, Vec::len)
    }
}

impl<K, T> Default for ListenerSet<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Collection and document id
pub type DocKey = (String, String);

/// A document state stamped with the store revision that produced it
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub revision: u64,
    pub document: Option<Document>,
}

/// Per-document watchers that never deliver a state older than one
/// already delivered.
pub struct DocumentWatchers {
    listeners: ListenerSet<DocKey, Snapshot>,
}

impl DocumentWatchers {
    pub fn new() -> Self {
        Self {
            listeners: ListenerSet::new(),
        }
    }

    /// Register `listener`, then read the current state and hand it over.
    /// Registering first means a write racing the read is either seen by
    /// `read_current` or notified to the listener; the revision filter drops
    /// whichever copy is older.
    pub fn register<F>(
        &self,
        key: DocKey,
        listener: Box<dyn Fn(Option<Document>) + Send + Sync>,
        read_current: F,
    ) -> Result<Subscription>
    where
        F: FnOnce() -> Result<Snapshot>,
    {
        let delivered = AtomicU64::new(0);
        let wrapped: Listener<Snapshot> = Arc::new(move |snapshot: Snapshot| {
            let previous = delivered.fetch_max(snapshot.revision, Ordering::AcqRel);
            if previous < snapshot.revision {
                listener(snapshot.document);
            } else {
                trace!(revision = snapshot.revision, previous, "Dropping stale snapshot");
            }
        });

        let subscription = self.listeners.add(key, wrapped.clone());
        let current = read_current()?;
        wrapped(current);
        Ok(subscription)
    }

    pub fn notify(&self, key: &DocKey, snapshot: Snapshot) {
        self.listeners.emit(key, snapshot);
    }

    pub fn watcher_count(&self, key: &DocKey) -> usize {
        self.listeners.listener_count(key)
    }
}

impl Default for DocumentWatchers {
    fn default() -> Self {
        Self::new()
    }
}
