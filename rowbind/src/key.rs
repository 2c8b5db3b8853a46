//! Slot identity used when diffing the rendered sequence against a
//! backing snapshot.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// The identity of one rendered slot.
///
/// Real items compare by `Arc` pointer identity; the engine never looks
/// inside them. A placeholder is its own identity, so a slot that is
/// still waiting for content can never be mistaken for a retained item.
#[derive(Debug)]
pub enum Key<T> {
    /// A real backing item.
    Item(Arc<T>),
    /// A reserved slot with no real content yet.
    Placeholder(u64),
}

// Not derived: the `Arc` clones regardless of whether `T` does.
impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        match self {
            Key::Item(value) => Key::Item(Arc::clone(value)),
            Key::Placeholder(n) => Key::Placeholder(*n),
        }
    }
}

impl<T> Key<T> {
    /// Key denoting `value`.
    pub fn item(value: &Arc<T>) -> Self {
        Key::Item(Arc::clone(value))
    }

    /// A fresh placeholder key, distinct from every other key.
    pub fn placeholder() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Key::Placeholder(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether this key is a placeholder.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Key::Placeholder(_))
    }

    /// Hashable identity for set and map membership.
    pub fn id(&self) -> KeyId {
        match self {
            Key::Item(value) => KeyId::Item(Arc::as_ptr(value) as usize),
            Key::Placeholder(n) => KeyId::Placeholder(*n),
        }
    }

    /// Whether two keys denote the same slot identity.
    pub fn same(&self, other: &Key<T>) -> bool {
        self.id() == other.id()
    }

    /// Whether this key denotes exactly `value`.
    pub fn is_item(&self, value: &Arc<T>) -> bool {
        match self {
            Key::Item(item) => Arc::ptr_eq(item, value),
            Key::Placeholder(_) => false,
        }
    }

    /// The backing item, when this key denotes one.
    pub fn as_item(&self) -> Option<&Arc<T>> {
        match self {
            Key::Item(item) => Some(item),
            Key::Placeholder(_) => None,
        }
    }
}

/// Plain-data identity of a [`Key`], usable in hash sets.
///
/// Item identities are raw pointer addresses; they are only meaningful
/// while the corresponding `Arc`s are alive, which the node store and
/// snapshots guarantee for the duration of a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyId {
    /// Address identity of a real item.
    Item(usize),
    /// Serial of a placeholder.
    Placeholder(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_keys_compare_by_pointer() {
        let a = Arc::new("a");
        let also_a = Arc::clone(&a);
        let other = Arc::new("a");
        assert!(Key::item(&a).same(&Key::item(&also_a)));
        assert!(!Key::item(&a).same(&Key::item(&other)));
    }

    #[test]
    fn test_placeholder_never_matches_item() {
        let a = Arc::new("a");
        let ph: Key<&str> = Key::placeholder();
        assert!(!ph.same(&Key::item(&a)));
        assert!(!ph.is_item(&a));
        assert!(ph.is_placeholder());
    }

    #[test]
    fn test_placeholders_are_distinct() {
        let p: Key<()> = Key::placeholder();
        let q: Key<()> = Key::placeholder();
        assert!(!p.same(&q));
    }
}
