//! Pluggable "run this on the next opportunity" primitive.
//!
//! Each binding keeps at most one turn in flight: it never calls
//! [`Schedule::schedule`] again before the previously scheduled turn
//! has fired. Scheduling strategy is injected per binding, never held
//! in process-wide mutable state, so concurrent bindings cannot
//! interfere with each other's substitution during tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::trace;
use tokio::time::Duration;

/// One reconciliation turn, boxed for the scheduler.
pub type Turn = Box<dyn FnOnce() + Send + 'static>;

/// Handle to one scheduled turn.
#[derive(Debug, Clone, Default)]
pub struct TurnHandle {
    cancelled: Arc<AtomicBool>,
}

impl TurnHandle {
    /// Create a live handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the turn; it becomes a no-op if it has not fired yet.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the turn was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Scheduling strategy.
///
/// Implementations must run the turn on a *later* opportunity, never
/// re-entrantly inside `schedule` itself.
pub trait Schedule: Send + Sync {
    /// Queue `turn` to run on the next opportunity.
    fn schedule(&self, turn: Turn) -> TurnHandle;
}

/// Host-provided frame callback: the host invokes the boxed turn on its
/// next frame.
pub type FrameHook = Arc<dyn Fn(Turn) + Send + Sync>;

/// Default scheduler.
///
/// Uses the host's frame hook when one is installed; otherwise falls
/// back to a fixed-delay timer of one frame at 60 Hz (~16 ms). The
/// timer path spawns onto the ambient tokio runtime, so a
/// `TickScheduler` without a frame hook must be used inside one.
pub struct TickScheduler {
    frame: Option<FrameHook>,
    tick: Duration,
}

impl TickScheduler {
    /// Timer-backed scheduler with the default ~16 ms tick.
    pub fn new() -> Self {
        Self {
            frame: None,
            tick: Duration::from_millis(16),
        }
    }

    /// Scheduler driven by the host's frame callback.
    pub fn with_frame_hook(frame: FrameHook) -> Self {
        Self {
            frame: Some(frame),
            tick: Duration::from_millis(16),
        }
    }

    /// Override the fallback tick interval.
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Schedule for TickScheduler {
    fn schedule(&self, turn: Turn) -> TurnHandle {
        let handle = TurnHandle::new();
        let guard = handle.clone();
        let wrapped: Turn = Box::new(move || {
            if !guard.is_cancelled() {
                turn();
            }
        });
        match &self.frame {
            Some(frame) => frame(wrapped),
            None => {
                let tick = self.tick;
                tokio::spawn(async move {
                    tokio::time::sleep(tick).await;
                    wrapped();
                });
            }
        }
        handle
    }
}

/// Deterministic scheduler for tests.
///
/// Turns queue up and fire only when the test says so, making
/// multi-turn drains fully reproducible.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<VecDeque<(Turn, TurnHandle)>>,
}

impl ManualScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of turns waiting to fire.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Fire the oldest queued turn. Returns `false` when nothing is
    /// queued.
    pub fn fire_next(&self) -> bool {
        // The lock is released before the turn runs; turns reschedule
        // themselves through `schedule`.
        let entry = self.lock().pop_front();
        match entry {
            Some((turn, handle)) => {
                if !handle.is_cancelled() {
                    turn();
                }
                true
            }
            None => false,
        }
    }

    /// Fire turns until the queue stays empty, up to `limit`. Returns
    /// how many turns fired.
    pub fn run_to_idle(&self, limit: usize) -> usize {
        let mut fired = 0;
        while fired < limit && self.fire_next() {
            fired += 1;
        }
        fired
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<(Turn, TurnHandle)>> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Schedule for ManualScheduler {
    fn schedule(&self, turn: Turn) -> TurnHandle {
        let handle = TurnHandle::new();
        trace!("turn queued on manual scheduler");
        self.lock().push_back((turn, handle.clone()));
        handle
    }
}
