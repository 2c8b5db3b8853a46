//! Binding entry point: wire a backing list to a container.

use std::sync::Arc;

use listdom::{NodeId, NodeTree};
use log::debug;

use crate::engine::Engine;
use crate::error::{BindError, SyncError};
use crate::lifecycle::{BindFn, FlushFn, Hook, LifecycleHooks};
use crate::schedule::{Schedule, TickScheduler};
use crate::source::ListSource;

/// Configuration for [`attach`].
///
/// Built fluently; only the data source is required.
pub struct BindConfig<T> {
    data: Arc<dyn ListSource<T>>,
    batch_size_for_add: usize,
    debug_checks: bool,
    hooks: LifecycleHooks,
    after_queue_flush: Option<FlushFn<T>>,
    bind_item: Option<BindFn<T>>,
    scheduler: Option<Arc<dyn Schedule>>,
}

impl<T> BindConfig<T> {
    /// Create a config observing `data`, with defaults: at most 3
    /// permanent insertions per turn, consistency checks off, default
    /// scheduler.
    pub fn new(data: impl ListSource<T> + 'static) -> Self {
        Self {
            data: Arc::new(data),
            batch_size_for_add: 3,
            debug_checks: false,
            hooks: LifecycleHooks::new(),
            after_queue_flush: None,
            bind_item: None,
            scheduler: None,
        }
    }

    /// Cap on permanent insertions per turn. `0` means unlimited.
    pub fn batch_size_for_add(mut self, cap: usize) -> Self {
        self.batch_size_for_add = cap;
        self
    }

    /// Enable the post-turn consistency check.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug_checks = enabled;
        self
    }

    /// Hook fired when a drain starts.
    pub fn on_before_render(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.before_render_started = Some(Box::new(hook) as Hook);
        self
    }

    /// Hook fired when a drain finishes.
    pub fn on_after_render(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.after_render_finished = Some(Box::new(hook) as Hook);
        self
    }

    /// Callback invoked once per fully drained cycle with the
    /// post-flush snapshot.
    pub fn after_queue_flush(mut self, flush: impl Fn(&[Arc<T>]) + Send + Sync + 'static) -> Self {
        self.after_queue_flush = Some(Box::new(flush));
        self
    }

    /// Callback that binds a freshly attached node to its item.
    pub fn bind_item(mut self, bind: impl Fn(NodeId, &Arc<T>) + Send + Sync + 'static) -> Self {
        self.bind_item = Some(Box::new(bind));
        self
    }

    /// Inject a scheduling strategy (deterministic tests, host frame
    /// loops). Defaults to [`TickScheduler`].
    pub fn scheduler(mut self, scheduler: Arc<dyn Schedule>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}

/// Bind `config.data` to `container`'s children.
///
/// The container must hold exactly one content node at bind time; it
/// becomes the row template and is taken out of the container (clones
/// of it take its place, one per item). The initial snapshot is queued
/// immediately; rendering happens over the following scheduled turns.
pub fn attach<T, Tr>(
    tree: Arc<Tr>,
    container: NodeId,
    config: BindConfig<T>,
) -> Result<Controller<T, Tr>, BindError>
where
    T: Send + Sync + 'static,
    Tr: NodeTree + Send + Sync + 'static,
{
    let content: Vec<NodeId> = tree
        .children(container)
        .into_iter()
        .filter(|node| tree.is_content(*node))
        .collect();
    let template = match content.as_slice() {
        [] => return Err(BindError::NoTemplate),
        [template] => *template,
        _ => {
            return Err(BindError::AmbiguousTemplate {
                count: content.len(),
            });
        }
    };
    tree.detach(container, template);
    debug!("bound container {container} with template {template}");

    let scheduler = config
        .scheduler
        .unwrap_or_else(|| Arc::new(TickScheduler::new()));
    let engine = Arc::new(Engine::new(
        Arc::clone(&tree),
        container,
        template,
        config.batch_size_for_add,
        config.debug_checks,
        config.hooks,
        config.after_queue_flush,
        config.bind_item,
        scheduler,
    ));

    // The subscription holds a weak reference so a disposed-and-dropped
    // binding cannot be kept alive by its own data source.
    let weak = Arc::downgrade(&engine);
    let subscription = config.data.subscribe(Arc::new(move |snapshot| {
        if let Some(engine) = weak.upgrade() {
            engine.apply_snapshot(snapshot.to_vec());
        }
    }));
    engine.set_subscription(subscription);

    let snapshot = config.data.snapshot();
    engine.apply_snapshot(snapshot);

    Ok(Controller {
        engine,
        source: config.data,
    })
}

/// Handle to an active binding.
///
/// Dropping the controller disposes the binding.
pub struct Controller<T, Tr: NodeTree> {
    engine: Arc<Engine<T, Tr>>,
    source: Arc<dyn ListSource<T>>,
}

impl<T, Tr: NodeTree> Controller<T, Tr> {
    /// Stop observing the backing list and cancel any scheduled turn.
    /// Idempotent; a turn that was already scheduled becomes a no-op.
    pub fn dispose(&self) {
        self.engine.dispose();
    }

    /// Whether the binding has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.engine.is_disposed()
    }

    /// Number of rendered slots (placeholders included mid-drain).
    pub fn len(&self) -> usize {
        self.engine.len()
    }

    /// Whether no slots are rendered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the binding has fully caught up with the backing list.
    pub fn is_idle(&self) -> bool {
        self.engine.is_idle()
    }

    /// The real items currently rendered, in order.
    pub fn rendered_items(&self) -> Vec<Arc<T>> {
        self.engine.items()
    }

    /// The rendered nodes, in slot order.
    pub fn rendered_nodes(&self) -> Vec<NodeId> {
        self.engine.rendered_nodes()
    }

    /// The error that abandoned the last drain, if any.
    pub fn last_error(&self) -> Option<SyncError> {
        self.engine.last_error()
    }
}

impl<T, Tr> Controller<T, Tr>
where
    T: Send + Sync + 'static,
    Tr: NodeTree + Send + Sync + 'static,
{
    /// Force a resync from the source's current snapshot. Useful for
    /// non-reactive sources, and clears a previous fatal error.
    pub fn refresh(&self) {
        self.engine.apply_snapshot(self.source.snapshot());
    }
}

impl<T, Tr: NodeTree> Drop for Controller<T, Tr> {
    fn drop(&mut self) {
        self.engine.dispose();
    }
}
