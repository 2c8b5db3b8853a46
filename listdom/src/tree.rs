use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

use crate::node::{NodeId, NodeKind};

/// Transient rejection of an attach operation by the host tree.
///
/// Hosts may refuse an attach for reasons of their own (mid-layout,
/// detached subtree, backpressure). Callers are expected to retry once
/// before treating the failure as fatal.
#[derive(Debug, Clone)]
pub struct AttachError {
    message: String,
}

impl AttachError {
    /// Create a new attach error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AttachError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AttachError {}

/// Mutation surface of a host UI tree.
///
/// The reconciliation engine drives a container's children exclusively
/// through this trait; it never assumes anything else about the host
/// technology.
pub trait NodeTree {
    /// Ordered children of `container`.
    fn children(&self, container: NodeId) -> Vec<NodeId>;

    /// Whether `node` is meaningful content (an element or
    /// non-whitespace text).
    fn is_content(&self, node: NodeId) -> bool;

    /// Deep-clone `template`, returning a detached copy.
    fn clone_node(&self, template: NodeId) -> NodeId;

    /// Attach `nodes`, in order, directly after `anchor` inside
    /// `container` (at the start when `anchor` is `None`).
    ///
    /// A node that is already attached somewhere is relocated, not
    /// duplicated. The whole run attaches as one operation; hosts may
    /// reject it transiently.
    fn attach_after(
        &self,
        container: NodeId,
        anchor: Option<NodeId>,
        nodes: &[NodeId],
    ) -> Result<(), AttachError>;

    /// Remove `node` from `container`. Removing a node that is not a
    /// child is a no-op.
    fn detach(&self, container: NodeId, node: NodeId);
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            parent: None,
        }
    }
}

/// In-memory [`NodeTree`] implementation.
///
/// Backs the engine's test suite and any host without a real UI tree.
/// Interior mutability makes it shareable behind an `Arc`, and
/// [`MemTree::fail_next_attaches`] injects transient attach rejections
/// for exercising retry paths.
#[derive(Debug, Default)]
pub struct MemTree {
    nodes: RwLock<HashMap<NodeId, NodeData>>,
    skip_attaches: AtomicUsize,
    fail_attaches: AtomicUsize,
    attach_calls: AtomicUsize,
}

impl MemTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached node of the given kind.
    pub fn create(&self, kind: NodeKind) -> NodeId {
        let id = NodeId::next();
        self.write().insert(id, NodeData::new(kind));
        id
    }

    /// Create a detached element node.
    pub fn element(&self) -> NodeId {
        self.create(NodeKind::Element)
    }

    /// Create a detached text node.
    pub fn text(&self, text: impl Into<String>) -> NodeId {
        self.create(NodeKind::Text(text.into()))
    }

    /// Create a detached blank node.
    pub fn blank(&self) -> NodeId {
        self.create(NodeKind::Blank)
    }

    /// Append `child` as the last child of `parent`.
    ///
    /// Host-side construction helper; the engine itself only attaches
    /// through [`NodeTree::attach_after`].
    pub fn append(&self, parent: NodeId, child: NodeId) {
        let mut nodes = self.write();
        detach_from_parent(&mut nodes, child);
        if let Some(data) = nodes.get_mut(&parent) {
            data.children.push(child);
        }
        if let Some(data) = nodes.get_mut(&child) {
            data.parent = Some(parent);
        }
    }

    /// Reject the next `n` attach operations with a transient error.
    pub fn fail_next_attaches(&self, n: usize) {
        self.fail_attaches_after(0, n);
    }

    /// Let the next `skip` attach operations through, then reject the
    /// `n` after them with transient errors.
    pub fn fail_attaches_after(&self, skip: usize, n: usize) {
        self.skip_attaches.store(skip, Ordering::SeqCst);
        self.fail_attaches.store(n, Ordering::SeqCst);
    }

    /// Total number of attach operations performed (successful or not).
    ///
    /// Lets tests assert that contiguous insertions were batched into a
    /// single operation.
    pub fn attach_call_count(&self) -> usize {
        self.attach_calls.load(Ordering::SeqCst)
    }

    /// Ordered child ids of `parent` (test inspection).
    pub fn child_ids(&self, parent: NodeId) -> Vec<NodeId> {
        self.children(parent)
    }

    /// Whether `node` is currently a child of `parent`.
    pub fn contains(&self, parent: NodeId, node: NodeId) -> bool {
        self.read()
            .get(&parent)
            .map(|d| d.children.contains(&node))
            .unwrap_or(false)
    }

    /// The kind of `node`, if it exists.
    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.read().get(&node).map(|d| d.kind.clone())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<NodeId, NodeData>> {
        self.nodes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<NodeId, NodeData>> {
        self.nodes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn detach_from_parent(nodes: &mut HashMap<NodeId, NodeData>, node: NodeId) {
    let parent = nodes.get(&node).and_then(|d| d.parent);
    if let Some(parent) = parent {
        if let Some(data) = nodes.get_mut(&parent) {
            data.children.retain(|c| *c != node);
        }
        if let Some(data) = nodes.get_mut(&node) {
            data.parent = None;
        }
    }
}

fn clone_subtree(nodes: &mut HashMap<NodeId, NodeData>, source: NodeId) -> NodeId {
    let (kind, children) = match nodes.get(&source) {
        Some(data) => (data.kind.clone(), data.children.clone()),
        None => (NodeKind::Blank, Vec::new()),
    };
    let copy = NodeId::next();
    let mut copied_children = Vec::with_capacity(children.len());
    for child in children {
        let child_copy = clone_subtree(nodes, child);
        if let Some(data) = nodes.get_mut(&child_copy) {
            data.parent = Some(copy);
        }
        copied_children.push(child_copy);
    }
    nodes.insert(
        copy,
        NodeData {
            kind,
            children: copied_children,
            parent: None,
        },
    );
    copy
}

impl NodeTree for MemTree {
    fn children(&self, container: NodeId) -> Vec<NodeId> {
        self.read()
            .get(&container)
            .map(|d| d.children.clone())
            .unwrap_or_default()
    }

    fn is_content(&self, node: NodeId) -> bool {
        self.read()
            .get(&node)
            .map(|d| d.kind.is_content())
            .unwrap_or(false)
    }

    fn clone_node(&self, template: NodeId) -> NodeId {
        clone_subtree(&mut self.write(), template)
    }

    fn attach_after(
        &self,
        container: NodeId,
        anchor: Option<NodeId>,
        nodes: &[NodeId],
    ) -> Result<(), AttachError> {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        if self.skip_attaches.load(Ordering::SeqCst) > 0 {
            self.skip_attaches.fetch_sub(1, Ordering::SeqCst);
        } else if self.fail_attaches.load(Ordering::SeqCst) > 0 {
            self.fail_attaches.fetch_sub(1, Ordering::SeqCst);
            debug!("injected attach failure in {container}");
            return Err(AttachError::new("attach rejected by host"));
        }

        let mut map = self.write();
        if !map.contains_key(&container) {
            return Err(AttachError::new(format!("unknown container {container}")));
        }
        for node in nodes {
            detach_from_parent(&mut map, *node);
        }
        let position = match anchor {
            Some(anchor) => {
                let children = &map
                    .get(&container)
                    .ok_or_else(|| AttachError::new("container vanished"))?
                    .children;
                match children.iter().position(|c| *c == anchor) {
                    Some(at) => at + 1,
                    None => {
                        return Err(AttachError::new(format!(
                            "anchor {anchor} is not a child of {container}"
                        )));
                    }
                }
            }
            None => 0,
        };
        if let Some(data) = map.get_mut(&container) {
            data.children.splice(position..position, nodes.iter().copied());
        }
        for node in nodes {
            if let Some(data) = map.get_mut(node) {
                data.parent = Some(container);
            }
        }
        Ok(())
    }

    fn detach(&self, container: NodeId, node: NodeId) {
        let mut map = self.write();
        if let Some(data) = map.get_mut(&container) {
            data.children.retain(|c| *c != node);
        }
        if let Some(data) = map.get_mut(&node) {
            if data.parent == Some(container) {
                data.parent = None;
            }
        }
    }
}
