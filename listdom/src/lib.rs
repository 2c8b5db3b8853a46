//! Minimal node-tree abstraction for list-shaped UI content.
//!
//! A host UI technology (a browser DOM, a terminal cell tree, a test
//! harness) exposes its mutable tree of nodes through the [`NodeTree`]
//! trait: inspect a container's children, deep-clone a template node,
//! attach a run of nodes after an anchor, and detach a node. Everything
//! a node *is* stays on the host side; callers only ever hold opaque
//! [`NodeId`] handles.
//!
//! [`MemTree`] is the in-memory reference implementation used by tests
//! and by hosts that have no real UI tree of their own.

pub mod node;
pub mod tree;

pub use node::{NodeId, NodeKind};
pub use tree::{AttachError, MemTree, NodeTree};
