//! The virtual node list: the authoritative record of what is rendered.

use std::sync::Arc;

use listdom::NodeId;

use crate::key::Key;

/// One rendered slot: a key paired with its rendered node, if any.
#[derive(Debug)]
pub struct VirtualNode<T> {
    /// Identity of the slot (real item or placeholder).
    pub key: Key<T>,
    /// Node in the host container. Blank placeholders have none.
    pub rendered: Option<NodeId>,
    /// Whether the slot is reserving space for deferred content.
    pub is_placeholder: bool,
}

impl<T> VirtualNode<T> {
    /// A live slot rendering `item` with `node`.
    pub fn live(item: &Arc<T>, node: NodeId) -> Self {
        Self {
            key: Key::item(item),
            rendered: Some(node),
            is_placeholder: false,
        }
    }

    /// A placeholder with no rendered node at all.
    pub fn blank_placeholder(key: Key<T>) -> Self {
        Self {
            key,
            rendered: None,
            is_placeholder: true,
        }
    }

    /// A placeholder that keeps an existing node on screen while the
    /// slot waits for its real content.
    pub fn reused_placeholder(key: Key<T>, node: NodeId) -> Self {
        Self {
            key,
            rendered: Some(node),
            is_placeholder: true,
        }
    }
}

/// Ordered record of rendered slots, parallel to the backing list.
#[derive(Debug)]
pub struct NodeStore<T> {
    slots: Vec<VirtualNode<T>>,
}

impl<T> NodeStore<T> {
    /// An empty store.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot at `index`.
    pub fn get(&self, index: usize) -> Option<&VirtualNode<T>> {
        self.slots.get(index)
    }

    /// Mutable slot at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut VirtualNode<T>> {
        self.slots.get_mut(index)
    }

    /// Discriminators of every slot, in order. This is what new
    /// snapshots are diffed against.
    pub fn keys(&self) -> Vec<Key<T>> {
        self.slots.iter().map(|slot| slot.key.clone()).collect()
    }

    /// Insert a slot, clamping `index` to the current length.
    pub fn insert(&mut self, index: usize, slot: VirtualNode<T>) {
        let index = index.min(self.slots.len());
        self.slots.insert(index, slot);
    }

    /// Remove and return the slot at `index`.
    pub fn remove(&mut self, index: usize) -> VirtualNode<T> {
        self.slots.remove(index)
    }

    /// Find the slot for `key`, preferring the position hint.
    ///
    /// Deferred queue entries can outlive index shifts; the hint is
    /// exact in the common case and the key scan recovers otherwise.
    pub fn locate(&self, hint: usize, key: &Key<T>) -> Option<usize> {
        if let Some(slot) = self.slots.get(hint) {
            if slot.key.same(key) {
                return Some(hint);
            }
        }
        self.slots.iter().position(|slot| slot.key.same(key))
    }

    /// Anchor for an insertion at `index`: the rendered node of the
    /// nearest preceding slot that has one, walking backward past
    /// node-less placeholders.
    pub fn anchor_before(&self, index: usize) -> Option<NodeId> {
        let end = index.min(self.slots.len());
        self.slots[..end].iter().rev().find_map(|slot| slot.rendered)
    }

    /// The real items currently rendered, in order. Placeholders are
    /// skipped.
    pub fn items(&self) -> Vec<Arc<T>> {
        self.slots
            .iter()
            .filter_map(|slot| slot.key.as_item().cloned())
            .collect()
    }

    /// Rendered nodes in slot order (slots without nodes skipped).
    pub fn rendered_nodes(&self) -> Vec<NodeId> {
        self.slots.iter().filter_map(|slot| slot.rendered).collect()
    }
}

impl<T> Default for NodeStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
