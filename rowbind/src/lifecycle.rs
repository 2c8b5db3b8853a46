//! Lifecycle hooks and completion callbacks for a binding.
//!
//! Hooks are closure-based: the host view-model supplies whichever ones
//! it cares about and the engine calls them at drain boundaries.

use std::sync::Arc;

use listdom::NodeId;

/// A lifecycle hook closure.
pub type Hook = Box<dyn Fn() + Send + Sync>;

/// Invoked once per fully drained cycle with the post-flush snapshot.
pub type FlushFn<T> = Box<dyn Fn(&[Arc<T>]) + Send + Sync>;

/// Binds a freshly attached node against the item it represents. This
/// is the point at which the node becomes live.
pub type BindFn<T> = Box<dyn Fn(NodeId, &Arc<T>) + Send + Sync>;

/// Hook closures consumed from the bound view-model, if present.
#[derive(Default)]
pub struct LifecycleHooks {
    /// Called when a drain begins, before any node is touched.
    pub before_render_started: Option<Hook>,
    /// Called when a drain completes and the rendered sequence matches
    /// the backing list again.
    pub after_render_finished: Option<Hook>,
}

impl LifecycleHooks {
    /// Create empty hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call the drain-start hook if present.
    pub fn call_before_render_started(&self) {
        if let Some(hook) = &self.before_render_started {
            hook();
        }
    }

    /// Call the drain-finished hook if present.
    pub fn call_after_render_finished(&self) {
        if let Some(hook) = &self.after_render_finished {
            hook();
        }
    }
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("before_render_started", &self.before_render_started.is_some())
            .field("after_render_finished", &self.after_render_finished.is_some())
            .finish()
    }
}
