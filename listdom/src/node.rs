use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Opaque handle to a single node in a host tree.
///
/// Handles are process-unique and copyable. They carry no behavior of
/// their own; all mutation goes through a [`crate::NodeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a fresh, process-unique handle.
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// What a node holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A structural node that can have children.
    Element,
    /// A run of text.
    Text(String),
    /// A node with no content at all.
    Blank,
}

impl NodeKind {
    /// Whether a node of this kind counts as meaningful content.
    ///
    /// Elements and non-whitespace text are content; blank nodes and
    /// whitespace-only text are not. Template discovery uses this to
    /// ignore formatting noise inside a container.
    pub fn is_content(&self) -> bool {
        match self {
            NodeKind::Element => true,
            NodeKind::Text(text) => !text.trim().is_empty(),
            NodeKind::Blank => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ids_are_unique() {
        let a = NodeId::next();
        let b = NodeId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_content_classification() {
        assert!(NodeKind::Element.is_content());
        assert!(NodeKind::Text("row".into()).is_content());
        assert!(!NodeKind::Text("  \n\t".into()).is_content());
        assert!(!NodeKind::Blank.is_content());
    }
}
