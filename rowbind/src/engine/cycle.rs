//! The reconciliation cycle: consumes the change queue one bounded
//! slice per scheduled turn, keeping the node store and the host
//! container in sync with the backing list without ever re-rendering
//! the whole sequence.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use listdom::{NodeId, NodeTree};
use log::{debug, error, trace, warn};

use crate::diff::{ChangeItem, ChangeStatus, diff, is_trivial, normalize};
use crate::error::SyncError;
use crate::key::{Key, KeyId};
use crate::lifecycle::{BindFn, FlushFn, LifecycleHooks};
use crate::schedule::{Schedule, TurnHandle};
use crate::source::Subscription;

use super::store::{NodeStore, VirtualNode};

/// Per-turn transient bookkeeping, discarded at turn end.
struct ProcessInfo<T> {
    deletions: Vec<Deletion<T>>,
    inserted_count: usize,
    moved_indexes: HashSet<usize>,
    used: HashSet<KeyId>,
    pending_adds: Vec<PendingAdd<T>>,
}

impl<T> ProcessInfo<T> {
    fn new() -> Self {
        Self {
            deletions: Vec::new(),
            inserted_count: 0,
            moved_indexes: HashSet::new(),
            used: HashSet::new(),
            pending_adds: Vec::new(),
        }
    }
}

struct Deletion<T> {
    index: usize,
    key: Key<T>,
    /// The slot's node is being relocated by a move; remove the slot
    /// but do not detach the node.
    moved: bool,
}

/// One attach action still to be applied this turn.
struct PendingAdd<T> {
    index: usize,
    key: Key<T>,
    node: Option<NodeId>,
    is_move: bool,
    is_placeholder: bool,
}

/// What a turn hands back to the caller once the store lock is
/// released.
///
/// Bindings are delivered even when the turn failed partway: nodes
/// from runs that attached before the failure are live and must still
/// be bound.
struct TurnEffects<T> {
    bindings: Vec<(NodeId, Arc<T>)>,
    more_work: bool,
    failure: Option<SyncError>,
}

struct EngineInner<T> {
    store: NodeStore<T>,
    queue: Vec<ChangeItem<T>>,
    /// Length of the most recent backing snapshot; the store must match
    /// it at every turn boundary.
    target_len: usize,
    drain_active: bool,
    before_fired: bool,
    scheduled: bool,
    pending_turn: Option<TurnHandle>,
    subscription: Option<Subscription>,
    failed: Option<SyncError>,
}

/// The reconciliation engine for one bound container.
pub(crate) struct Engine<T, Tr: NodeTree> {
    tree: Arc<Tr>,
    container: NodeId,
    template: NodeId,
    batch_size_for_add: usize,
    debug_checks: bool,
    hooks: LifecycleHooks,
    after_queue_flush: Option<FlushFn<T>>,
    bind_item: Option<BindFn<T>>,
    scheduler: Arc<dyn Schedule>,
    disposed: AtomicBool,
    inner: Mutex<EngineInner<T>>,
}

impl<T, Tr: NodeTree> Engine<T, Tr> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        tree: Arc<Tr>,
        container: NodeId,
        template: NodeId,
        batch_size_for_add: usize,
        debug_checks: bool,
        hooks: LifecycleHooks,
        after_queue_flush: Option<FlushFn<T>>,
        bind_item: Option<BindFn<T>>,
        scheduler: Arc<dyn Schedule>,
    ) -> Self {
        Self {
            tree,
            container,
            template,
            batch_size_for_add,
            debug_checks,
            hooks,
            after_queue_flush,
            bind_item,
            scheduler,
            disposed: AtomicBool::new(false),
            inner: Mutex::new(EngineInner {
                store: NodeStore::new(),
                queue: Vec::new(),
                target_len: 0,
                drain_active: false,
                before_fired: false,
                scheduled: false,
                pending_turn: None,
                subscription: None,
                failed: None,
            }),
        }
    }

    pub(crate) fn set_subscription(&self, subscription: Option<Subscription>) {
        self.lock().subscription = subscription;
    }
}

// Scheduling crosses task boundaries, so everything reachable from a
// queued turn needs the Send + Sync bounds.
impl<T, Tr> Engine<T, Tr>
where
    T: Send + Sync + 'static,
    Tr: NodeTree + Send + Sync + 'static,
{
    /// Diff `snapshot` against the currently rendered discriminators
    /// and queue the result.
    ///
    /// Called for the initial render, on every change notification, and
    /// on explicit refresh. Mid-drain calls replace the remaining queue
    /// wholesale: the store's discriminators already reflect
    /// partially-applied work, so the fresh script captures exactly
    /// what is left to do.
    pub(crate) fn apply_snapshot(self: &Arc<Self>, snapshot: Vec<Arc<T>>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let mut inner = self.lock();
        inner.failed = None;
        let old_keys = inner.store.keys();
        let mut script = diff(&old_keys, &snapshot);
        normalize(&mut script);
        inner.target_len = snapshot.len();
        if is_trivial(&script) && !inner.drain_active {
            trace!("snapshot produced no changes");
            return;
        }
        debug!(
            "queued {} change(s) against {} rendered slot(s)",
            script.len(),
            old_keys.len()
        );
        inner.queue = script;
        inner.drain_active = true;
        self.arm(inner);
    }

    /// Schedule the next turn unless one is already in flight.
    ///
    /// Takes the guard by value: the scheduler may call straight back
    /// into the engine (a frame hook notifying the backing list, for
    /// instance), so no lock may be held across it.
    fn arm(self: &Arc<Self>, mut inner: MutexGuard<'_, EngineInner<T>>) {
        if inner.scheduled || self.disposed.load(Ordering::SeqCst) {
            return;
        }
        inner.scheduled = true;
        drop(inner);

        let engine = Arc::clone(self);
        let handle = self.scheduler.schedule(Box::new(move || engine.turn()));
        if self.disposed.load(Ordering::SeqCst) {
            handle.cancel();
            return;
        }
        self.lock().pending_turn = Some(handle);
    }

    /// One scheduled turn: a bounded slice of reconciliation work.
    pub(crate) fn turn(self: &Arc<Self>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        // The first turn of a drain fires the start hook before any
        // node is touched. No lock is held across user callbacks.
        let fire_before = {
            let mut inner = self.lock();
            inner.scheduled = false;
            inner.pending_turn = None;
            if !inner.drain_active {
                return;
            }
            !std::mem::replace(&mut inner.before_fired, true)
        };
        if fire_before {
            trace!("drain starting");
            self.hooks.call_before_render_started();
        }

        let effects = {
            let mut inner = self.lock();
            self.run_turn(&mut inner)
        };

        // Nodes attached before a mid-turn failure are live; bind them
        // regardless of how the turn ended.
        if let Some(bind) = &self.bind_item {
            for (node, item) in &effects.bindings {
                bind(*node, item);
            }
        }

        match effects.failure {
            Some(err) => {
                error!("reconciliation turn failed: {err}");
                let mut inner = self.lock();
                inner.queue.clear();
                inner.drain_active = false;
                inner.before_fired = false;
                inner.failed = Some(err);
            }
            None => {
                if effects.more_work {
                    self.arm(self.lock());
                } else {
                    let snapshot = {
                        let mut inner = self.lock();
                        inner.drain_active = false;
                        inner.before_fired = false;
                        inner.store.items()
                    };
                    trace!("drain complete with {} slot(s)", snapshot.len());
                    self.hooks.call_after_render_finished();
                    if let Some(flush) = &self.after_queue_flush {
                        flush(&snapshot);
                    }
                }
            }
        }
    }
}

impl<T, Tr: NodeTree> Engine<T, Tr> {
    fn run_turn(&self, inner: &mut EngineInner<T>) -> TurnEffects<T> {
        let mut info = ProcessInfo::new();

        self.resolve_queue(inner, &mut info);
        self.walk_queue(inner, &mut info);
        self.flush_deletions(inner, &info);
        let (bindings, mut failure) = self.flush_insertions(inner, &mut info);

        if failure.is_none() && self.debug_checks && inner.store.len() != inner.target_len {
            failure = Some(SyncError::StoreDesync {
                rendered: inner.store.len(),
                expected: inner.target_len,
            });
        }
        if failure.is_none() {
            debug!(
                "turn done: {} insertion(s), {} deletion(s), {} change(s) still queued",
                info.inserted_count,
                info.deletions.len(),
                inner.queue.len()
            );
        }
        TurnEffects {
            more_work: failure.is_none() && !inner.queue.is_empty(),
            bindings,
            failure,
        }
    }

    /// Resolution pass: strip retained entries and resolve moves.
    ///
    /// Runs at the start of every turn and is idempotent; after it, the
    /// queue holds only plain additions and deletions. A move claims
    /// the existing slot's node, and the bookkeeping deletion for its
    /// vacated slot is marked so the node is not detached. A second
    /// deletion at an already-claimed index folds back into a plain
    /// deletion.
    fn resolve_queue(&self, inner: &mut EngineInner<T>, info: &mut ProcessInfo<T>) {
        // Items claimed by retention or a move may not be cannibalized
        // for placeholder reuse later in the turn.
        for change in &inner.queue {
            let claimed = change.status == ChangeStatus::Retained
                || (change.status == ChangeStatus::Added && change.moved_from.is_some());
            if claimed {
                info.used.insert(change.key.id());
            }
        }

        let queue = std::mem::take(&mut inner.queue);
        let mut remaining = Vec::with_capacity(queue.len());
        for change in queue {
            match change.status {
                ChangeStatus::Retained => {
                    // Already in place; no further processing.
                }
                ChangeStatus::Added => match change.moved_from {
                    Some(from) => {
                        let position = inner
                            .store
                            .locate(from, &change.key)
                            .filter(|_| !info.moved_indexes.contains(&from));
                        match position {
                            Some(position) => {
                                // Relocate the existing slot's node;
                                // nothing is destroyed or recreated.
                                info.moved_indexes.insert(from);
                                let node =
                                    inner.store.get(position).and_then(|slot| slot.rendered);
                                info.pending_adds.push(PendingAdd {
                                    index: change.index,
                                    key: change.key.clone(),
                                    node,
                                    is_move: true,
                                    is_placeholder: false,
                                });
                            }
                            None => {
                                warn!("move source {from} unavailable; inserting fresh node");
                                remaining.push(ChangeItem {
                                    moved_from: None,
                                    ..change
                                });
                            }
                        }
                    }
                    None => remaining.push(change),
                },
                ChangeStatus::Deleted => remaining.push(change),
            }
        }
        inner.queue = remaining;
    }

    /// Walk the remaining queue in order, classifying work for this
    /// turn. Additions beyond the per-turn cap reserve their slot with
    /// a placeholder and stay queued for a later turn.
    fn walk_queue(&self, inner: &mut EngineInner<T>, info: &mut ProcessInfo<T>) {
        let queue = std::mem::take(&mut inner.queue);
        let mut remaining = Vec::with_capacity(queue.len());
        let mut idx = 0;
        while idx < queue.len() {
            let change = &queue[idx];
            match change.status {
                ChangeStatus::Deleted => {
                    let moved = info.moved_indexes.remove(&change.index);
                    info.deletions.push(Deletion {
                        index: change.index,
                        key: change.key.clone(),
                        moved,
                    });
                    idx += 1;
                }
                ChangeStatus::Added => {
                    let under_cap = self.batch_size_for_add == 0
                        || info.inserted_count < self.batch_size_for_add;
                    if under_cap {
                        let node = self.tree.clone_node(self.template);
                        info.inserted_count += 1;
                        info.pending_adds.push(PendingAdd {
                            index: change.index,
                            key: change.key.clone(),
                            node: Some(node),
                            is_move: false,
                            is_placeholder: false,
                        });
                        idx += 1;
                    } else {
                        idx = self.reserve_slot(inner, info, &queue, idx, &mut remaining);
                    }
                }
                ChangeStatus::Retained => {
                    // Stripped by the resolution pass; nothing to do.
                    idx += 1;
                }
            }
        }
        inner.queue = remaining;
    }

    /// The insertion cap has been reached for an addition at
    /// `queue[idx]`. Reserve its slot with a placeholder so later turns
    /// can finish the work. Returns the next queue position to process.
    fn reserve_slot(
        &self,
        inner: &mut EngineInner<T>,
        info: &mut ProcessInfo<T>,
        queue: &[ChangeItem<T>],
        idx: usize,
        remaining: &mut Vec<ChangeItem<T>>,
    ) -> usize {
        let change = &queue[idx];

        // A synthesized placeholder deletion queues directly after its
        // addition; the slot was already reserved on an earlier turn,
        // so both stay queued until the cap resets.
        if let Some(deletion) = queue
            .get(idx + 1)
            .filter(|next| next.status == ChangeStatus::Deleted && next.index == change.index)
        {
            remaining.push(change.clone());
            remaining.push(deletion.clone());
            return idx + 2;
        }

        if !self.reuse_outgoing_slot(inner, info, change, remaining) {
            self.reserve_blank(info, change, remaining);
        }
        idx + 1
    }

    /// Replacement case: the slot at `change`'s index was scheduled for
    /// deletion earlier this turn. When the outgoing item is not
    /// claimed by a retention or move, its node stays on screen as the
    /// placeholder instead of leaving a blank slot for a turn; the
    /// deletion is deferred, rewritten against the placeholder key.
    /// Returns `false` when no reusable outgoing slot exists.
    fn reuse_outgoing_slot(
        &self,
        inner: &mut EngineInner<T>,
        info: &mut ProcessInfo<T>,
        change: &ChangeItem<T>,
        remaining: &mut Vec<ChangeItem<T>>,
    ) -> bool {
        let Some(at) = info
            .deletions
            .iter()
            .position(|d| d.index == change.index && !d.moved)
        else {
            return false;
        };
        let Some(position) = inner
            .store
            .locate(info.deletions[at].index, &info.deletions[at].key)
        else {
            return false;
        };
        let (occupant_key, occupant_node, already_placeholder) = match inner.store.get(position) {
            Some(slot) => (slot.key.id(), slot.rendered, slot.is_placeholder),
            None => return false,
        };
        // Two live slots must never share one node handle.
        if already_placeholder || info.used.contains(&occupant_key) {
            return false;
        }

        info.deletions.remove(at);
        let placeholder = Key::placeholder();
        if let Some(slot) = inner.store.get_mut(position) {
            *slot = match occupant_node {
                Some(node) => VirtualNode::reused_placeholder(placeholder.clone(), node),
                None => VirtualNode::blank_placeholder(placeholder.clone()),
            };
        }
        remaining.push(change.clone());
        remaining.push(ChangeItem {
            status: ChangeStatus::Deleted,
            index: change.index,
            key: placeholder,
            moved_from: None,
        });
        true
    }

    /// Reserve `change`'s slot with a node-less placeholder and queue a
    /// synthesized deletion right after it, so the placeholder is
    /// removed on the next turn once the cap resets.
    fn reserve_blank(
        &self,
        info: &mut ProcessInfo<T>,
        change: &ChangeItem<T>,
        remaining: &mut Vec<ChangeItem<T>>,
    ) {
        let placeholder = Key::placeholder();
        info.pending_adds.push(PendingAdd {
            index: change.index,
            key: placeholder.clone(),
            node: None,
            is_move: false,
            is_placeholder: true,
        });
        remaining.push(change.clone());
        remaining.push(ChangeItem {
            status: ChangeStatus::Deleted,
            index: change.index,
            key: placeholder,
            moved_from: None,
        });
    }

    /// Apply deletions in descending position order so earlier removals
    /// never invalidate later positions. Moved slots lose their store
    /// entry but keep their node; it is being relocated.
    fn flush_deletions(&self, inner: &mut EngineInner<T>, info: &ProcessInfo<T>) {
        let mut targets: Vec<(usize, bool)> = Vec::new();
        for deletion in &info.deletions {
            match inner.store.locate(deletion.index, &deletion.key) {
                Some(position) => targets.push((position, deletion.moved)),
                None => warn!("deletion target at {} not found", deletion.index),
            }
        }
        targets.sort_by(|a, b| b.0.cmp(&a.0));
        targets.dedup_by_key(|t| t.0);
        for (position, moved) in targets {
            let slot = inner.store.remove(position);
            if moved {
                continue;
            }
            if let Some(node) = slot.rendered {
                self.tree.detach(self.container, node);
            }
        }
    }

    /// Apply pending insertions: splice every slot into the store, then
    /// attach maximal runs of contiguous node-carrying targets with one
    /// host operation each. Returns the bind actions for nodes that
    /// became live; on a fatal attach failure those from runs that
    /// attached before it are still returned alongside the error.
    fn flush_insertions(
        &self,
        inner: &mut EngineInner<T>,
        info: &mut ProcessInfo<T>,
    ) -> (Vec<(NodeId, Arc<T>)>, Option<SyncError>) {
        info.pending_adds.sort_by_key(|add| add.index);

        // Materialize every slot first so targets line up with final
        // store positions.
        for add in &info.pending_adds {
            inner.store.insert(
                add.index,
                VirtualNode {
                    key: add.key.clone(),
                    rendered: add.node,
                    is_placeholder: add.is_placeholder,
                },
            );
        }

        let mut bindings = Vec::new();
        let adds = &info.pending_adds;
        let mut start = 0;
        while start < adds.len() {
            if adds[start].node.is_none() {
                start += 1;
                continue;
            }
            let mut end = start + 1;
            while end < adds.len()
                && adds[end].node.is_some()
                && adds[end].index == adds[end - 1].index + 1
            {
                end += 1;
            }
            let run = &adds[start..end];
            let nodes: Vec<NodeId> = run.iter().filter_map(|add| add.node).collect();
            let anchor = inner.store.anchor_before(run[0].index);
            trace!(
                "attaching run of {} node(s) at {} (anchor: {:?})",
                nodes.len(),
                run[0].index,
                anchor
            );
            if let Err(err) = self.attach_with_retry(anchor, &nodes) {
                // Roll back every slot that never made it into the
                // container, so the store keeps matching what is
                // actually rendered and a refresh can recover.
                for add in adds[start..].iter().rev() {
                    if let Some(position) = inner.store.locate(add.index, &add.key) {
                        inner.store.remove(position);
                    }
                }
                return (bindings, Some(err));
            }
            for add in run {
                if !add.is_move && !add.is_placeholder {
                    if let (Some(node), Some(item)) = (add.node, add.key.as_item()) {
                        bindings.push((node, Arc::clone(item)));
                    }
                }
            }
            start = end;
        }
        (bindings, None)
    }

    /// Hosts may reject an attach transiently; retry exactly once
    /// before treating the failure as fatal.
    fn attach_with_retry(&self, anchor: Option<NodeId>, nodes: &[NodeId]) -> Result<(), SyncError> {
        if let Err(first) = self.tree.attach_after(self.container, anchor, nodes) {
            warn!("attach rejected ({first}); retrying once");
            self.tree
                .attach_after(self.container, anchor, nodes)
                .map_err(|second| SyncError::AttachRejected(second.to_string()))?;
        }
        Ok(())
    }

    /// Stop observing the backing list and cancel any scheduled turn.
    /// Safe to call repeatedly and with no turn in flight.
    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut inner = self.lock();
        inner.subscription.take();
        if let Some(handle) = inner.pending_turn.take() {
            handle.cancel();
        }
        inner.queue.clear();
        inner.scheduled = false;
        inner.drain_active = false;
        inner.before_fired = false;
        debug!("binding disposed");
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().store.len()
    }

    pub(crate) fn is_idle(&self) -> bool {
        let inner = self.lock();
        !inner.drain_active && !inner.scheduled
    }

    pub(crate) fn items(&self) -> Vec<Arc<T>> {
        self.lock().store.items()
    }

    pub(crate) fn rendered_nodes(&self) -> Vec<NodeId> {
        self.lock().store.rendered_nodes()
    }

    pub(crate) fn last_error(&self) -> Option<SyncError> {
        self.lock().failed.clone()
    }

    fn lock(&self) -> MutexGuard<'_, EngineInner<T>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
