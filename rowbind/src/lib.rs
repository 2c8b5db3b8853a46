//! Incremental list reconciliation with batched rendering.
//!
//! `rowbind` keeps a container's rendered children synchronized with a
//! mutable backing list without ever re-rendering the whole sequence.
//! Changes are diffed against the currently rendered slots, queued,
//! and applied over multiple scheduled turns; a per-turn cap on
//! permanent insertions keeps any single turn cheap, with placeholders
//! reserving the slots still waiting for content.
//!
//! The host UI technology stays behind the [`listdom::NodeTree`] trait;
//! the backing list stays behind [`source::ListSource`]; scheduling
//! stays behind [`schedule::Schedule`]. See [`binding::attach`] for the
//! entry point.

pub mod binding;
pub mod diff;
pub mod engine;
pub mod error;
pub mod key;
pub mod lifecycle;
pub mod schedule;
pub mod source;

pub use binding::{BindConfig, Controller, attach};
pub use error::{BindError, SyncError};

pub mod prelude {
    //! Everything a typical host needs.
    pub use crate::binding::{BindConfig, Controller, attach};
    pub use crate::error::{BindError, SyncError};
    pub use crate::lifecycle::LifecycleHooks;
    pub use crate::schedule::{ManualScheduler, Schedule, TickScheduler};
    pub use crate::source::{ListSource, ReactiveList, Subscription};

    pub use listdom::{MemTree, NodeId, NodeKind, NodeTree};
}
