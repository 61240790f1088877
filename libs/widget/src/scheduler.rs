//! Deferred callbacks for the close animation.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use tokio::{runtime::Handle, task::AbortHandle};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    /// Runs `task` once after `delay` unless the returned handle is
    /// cancelled first.
    fn schedule(&self, delay: Duration, task: Task) -> ScheduledTask;
}

pub type SharedScheduler = Arc<dyn Scheduler>;

/// Handle to a pending callback. Dropping it does not cancel.
#[derive(Debug)]
pub struct ScheduledTask {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl ScheduledTask {
    fn new(cancelled: Arc<AtomicBool>, abort: Option<AbortHandle>) -> Self {
        Self { cancelled, abort }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Runs callbacks on a tokio runtime timer.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Binds to the runtime of the calling context, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> ScheduledTask {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::SeqCst) {
                task();
            }
        });
        ScheduledTask::new(cancelled, Some(join.abort_handle()))
    }
}

struct Pending {
    due: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    task: Task,
}

#[derive(Default)]
struct Clock {
    now: Duration,
    next_seq: u64,
    pending: Vec<Pending>,
}

/// Virtual clock advanced by hand; for tests and hosts that drive their own
/// frame loop.
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<Clock>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Live (not cancelled) callbacks still waiting.
    pub fn pending_count(&self) -> usize {
        self.lock()
            .pending
            .iter()
            .filter(|p| !p.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Moves the clock forward, running every callback that falls due in
    /// order. Callbacks run without the clock locked and may schedule more
    /// work; anything due within the window also runs.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now.saturating_add(by);
        loop {
            let next = {
                let mut clock = self.lock();
                clock.pending.retain(|p| !p.cancelled.load(Ordering::SeqCst));
                let earliest = clock
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(index, _)| index);
                earliest.map(|index| {
                    let pending = clock.pending.swap_remove(index);
                    clock.now = clock.now.max(pending.due);
                    pending
                })
            };
            match next {
                Some(pending) => (pending.task)(),
                None => break,
            }
        }
        let mut clock = self.lock();
        clock.now = clock.now.max(target);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> ScheduledTask {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut clock = self.lock();
        let seq = clock.next_seq;
        clock.next_seq += 1;
        let due = clock.now.saturating_add(delay);
        clock.pending.push(Pending {
            due,
            seq,
            cancelled: cancelled.clone(),
            task,
        });
        ScheduledTask::new(cancelled, None)
    }
}
