//! Backing-list contract and the reactive list implementation.
//!
//! The engine owns no knowledge of how change notifications are
//! produced; it only requires a [`ListSource`]: a snapshot plus an
//! optional subscription. [`ReactiveList`] is the shared-state
//! implementation (cheap to clone, safe across task boundaries); a
//! plain `Vec` works as a non-reactive snapshot source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Change-notification callback, invoked with the post-change snapshot.
pub type ChangeFn<T> = Arc<dyn Fn(&[Arc<T>]) + Send + Sync>;

/// A backing list the engine can observe.
pub trait ListSource<T>: Send + Sync {
    /// Current contents.
    fn snapshot(&self) -> Vec<Arc<T>>;

    /// Subscribe to change notifications.
    ///
    /// Non-reactive sources return `None`; the binding then renders the
    /// initial snapshot once and goes idle until refreshed.
    fn subscribe(&self, on_change: ChangeFn<T>) -> Option<Subscription>;
}

/// Active change subscription. Unsubscribes when dropped.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a detach action.
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Explicitly detach now instead of on drop.
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.detach.is_some())
            .finish()
    }
}

type SubscriberMap<T> = Arc<RwLock<HashMap<u64, ChangeFn<T>>>>;

/// Reactive ordered list of shared items.
///
/// Items are held behind `Arc` and compared by pointer identity
/// downstream; the list never clones or mutates them. Every mutator
/// notifies subscribers with the new snapshot after the change is
/// applied.
pub struct ReactiveList<T> {
    items: Arc<RwLock<Vec<Arc<T>>>>,
    subscribers: SubscriberMap<T>,
    next_subscriber: Arc<AtomicU64>,
}

impl<T> ReactiveList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::from_items(Vec::new())
    }

    /// Create a list with initial contents.
    pub fn from_items(items: Vec<Arc<T>>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items)),
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_subscriber: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// The item at `index`, if any.
    pub fn get(&self, index: usize) -> Option<Arc<T>> {
        self.read().get(index).cloned()
    }

    /// Replace the whole contents.
    pub fn set(&self, items: Vec<Arc<T>>) {
        *self.write() = items;
        self.notify();
    }

    /// Mutate the contents in place.
    pub fn update(&self, f: impl FnOnce(&mut Vec<Arc<T>>)) {
        f(&mut self.write());
        self.notify();
    }

    /// Append an item.
    pub fn push(&self, item: Arc<T>) {
        self.update(|items| items.push(item));
    }

    /// Insert an item at `index`.
    pub fn insert(&self, index: usize, item: Arc<T>) {
        self.update(|items| items.insert(index, item));
    }

    /// Remove and return the item at `index`.
    pub fn remove(&self, index: usize) -> Option<Arc<T>> {
        let mut removed = None;
        self.update(|items| {
            if index < items.len() {
                removed = Some(items.remove(index));
            }
        });
        removed
    }

    /// Swap two items.
    pub fn swap(&self, a: usize, b: usize) {
        self.update(|items| {
            if a < items.len() && b < items.len() {
                items.swap(a, b);
            }
        });
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.update(Vec::clear);
    }

    fn notify(&self) {
        let snapshot = self.read().clone();
        let subscribers: Vec<ChangeFn<T>> = self
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect();
        for subscriber in subscribers {
            subscriber(&snapshot);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<T>>> {
        self.items
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<T>>> {
        self.items
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> Clone for ReactiveList<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            subscribers: Arc::clone(&self.subscribers),
            next_subscriber: Arc::clone(&self.next_subscriber),
        }
    }
}

impl<T> Default for ReactiveList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ReactiveList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveList")
            .field("len", &self.len())
            .finish()
    }
}

impl<T: Send + Sync + 'static> ListSource<T> for ReactiveList<T> {
    fn snapshot(&self) -> Vec<Arc<T>> {
        self.read().clone()
    }

    fn subscribe(&self, on_change: ChangeFn<T>) -> Option<Subscription> {
        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, on_change);
        let subscribers = Arc::clone(&self.subscribers);
        Some(Subscription::new(move || {
            subscribers
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .remove(&id);
        }))
    }
}

/// A plain vector acts as a static snapshot: no notifications.
impl<T: Send + Sync> ListSource<T> for Vec<Arc<T>> {
    fn snapshot(&self) -> Vec<Arc<T>> {
        self.clone()
    }

    fn subscribe(&self, _on_change: ChangeFn<T>) -> Option<Subscription> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_mutators_notify_with_snapshot() {
        let list: ReactiveList<u32> = ReactiveList::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_cb = Arc::clone(&seen);
        let sub = list.subscribe(Arc::new(move |snapshot| {
            seen_in_cb.store(snapshot.len(), Ordering::SeqCst);
        }));
        assert!(sub.is_some());

        list.push(Arc::new(1));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        list.insert(0, Arc::new(2));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        list.remove(0);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let list: ReactiveList<u32> = ReactiveList::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_cb = Arc::clone(&calls);
        let sub = list.subscribe(Arc::new(move |_| {
            calls_in_cb.fetch_add(1, Ordering::SeqCst);
        }));
        list.push(Arc::new(1));
        drop(sub);
        list.push(Arc::new(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_vec_source_is_static() {
        let source: Vec<Arc<u32>> = vec![Arc::new(1), Arc::new(2)];
        assert_eq!(source.snapshot().len(), 2);
        assert!(ListSource::subscribe(&source, Arc::new(|_| {})).is_none());
    }
}
