//! Reconciliation engine internals: the node store and the per-turn
//! cycle that drives it.

mod cycle;
mod store;

pub(crate) use cycle::Engine;
pub use store::{NodeStore, VirtualNode};
